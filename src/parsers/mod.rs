pub mod html;
pub mod markdown;

pub use html::{ExtractedPage, PageSelectors, extract_page};
pub use markdown::{Converter, MarkdownConverter, build_document};
