use chrono::Utc;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Characters dropped from titles before they become path segments
const REMOVED_CHARS: &[char] = &[
    '*', '+', '~', '.', '(', ')', '\'', '"', '!', ':', '@', '<', '>', '/', '\\', '|', '?',
];

/// Allocates numbered names inside the output tree and writes into it
#[derive(Debug)]
pub struct PathAllocator {
    root: PathBuf,
    untitled: AtomicUsize,
    /// Artifacts written during this run
    written: Mutex<HashSet<PathBuf>>,
}

impl PathAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            untitled: AtomicUsize::new(0),
            written: Mutex::new(HashSet::new()),
        }
    }

    /// `NN-slug.md` for a content page
    pub fn file_name(&self, order: usize, title: &str) -> String {
        format!("{}.md", self.numbered(order, title, "untitled"))
    }

    /// `NN-slug` for a catalog directory
    pub fn dir_name(&self, order: usize, title: &str) -> String {
        self.numbered(order, title, "untitled-dir")
    }

    fn numbered(&self, order: usize, title: &str, placeholder: &str) -> String {
        let mut slug = slugify(title);
        if slug.is_empty() {
            slug = self.placeholder(placeholder);
        }
        format!("{:02}-{}", order, slug)
    }

    /// Timestamped stand-in name, unique even when two blank titles land in the same millisecond
    fn placeholder(&self, prefix: &str) -> String {
        let seq = self.untitled.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), seq)
    }

    /// Full path of `name` under the directories of `path_stack`
    pub fn resolve(&self, path_stack: &[String], name: &str) -> PathBuf {
        let mut path = self.dir_path(path_stack);
        path.push(name);
        path
    }

    pub fn dir_path(&self, path_stack: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(path_stack);
        path
    }

    /// Create the directory for `path_stack`; existing directories are fine
    pub async fn ensure_dir(&self, path_stack: &[String]) -> io::Result<PathBuf> {
        let path = self.dir_path(path_stack);
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Write one artifact, creating any missing parent directories first.
    ///
    /// A name already written during this run gets a `-2`, `-3`, ... suffix instead of
    /// being overwritten. Files left over from earlier runs are replaced.
    pub async fn write_artifact(
        &self,
        path_stack: &[String],
        name: &str,
        contents: &str,
    ) -> io::Result<PathBuf> {
        let path = self.claim(path_stack, name).await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    async fn claim(&self, path_stack: &[String], name: &str) -> PathBuf {
        let mut written = self.written.lock().await;
        let mut path = self.resolve(path_stack, name);
        let mut n = 1;
        while !written.insert(path.clone()) {
            n += 1;
            path = self.resolve(path_stack, &with_suffix(name, n));
        }
        if n > 1 {
            ::log::warn!(
                "{} was already written in this run, saving as {}",
                self.resolve(path_stack, name).display(),
                path.display()
            );
        }
        path
    }
}

/// `01-Page.md` -> `01-Page-2.md`
fn with_suffix(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", name, n),
    }
}

/// Turn a page title into a path segment.
///
/// Punctuation and path separators are removed, whitespace runs become a single
/// `-`, Latin diacritics are folded to ASCII, and case plus non-Latin scripts are
/// kept as they are.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());

    for c in title.chars() {
        if REMOVED_CHARS.contains(&c) || (c.is_control() && !c.is_whitespace()) {
            continue;
        }
        if c.is_whitespace() || c == '-' {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
            continue;
        }
        match fold_latin(c) {
            Some(folded) => slug.push_str(folded),
            None => slug.push(c),
        }
    }

    slug.trim_end_matches('-').to_string()
}

fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' => "A",
        'ç' | 'ć' | 'č' => "c",
        'Ç' | 'Ć' | 'Č' => "C",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ę' | 'Ě' => "E",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' => "I",
        'ñ' | 'ń' | 'ň' => "n",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' => "O",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'ś' | 'š' => "s",
        'Ś' | 'Š' => "S",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ł' => "l",
        'Ł' => "L",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        _ => return None,
    };
    Some(folded)
}
