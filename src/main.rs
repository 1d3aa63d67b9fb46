use clap::Parser;
use doc_mirror::results::CrawlSummary;
use doc_mirror::{Crawler, WebDriverRenderer};
use std::process::ExitCode;
use std::sync::Arc;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging; RUST_LOG still wins when set
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Note: rendering requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL or --webdriver-url if not using {}",
        config.webdriver_url
    );

    let renderer = match WebDriverRenderer::new(&config) {
        Ok(renderer) => renderer,
        Err(e) => {
            ::log::error!("Invalid site profile: {}", e);
            return ExitCode::FAILURE;
        }
    };

    ::log::info!("Starting mirror of {}", config.start_url);
    let crawler = Crawler::new(config, Arc::new(renderer));

    // First Ctrl-C drains in-flight tasks and checkpoints; a second one exits at once
    let shutdown = crawler.shutdown_handle();
    tokio::spawn(async move {
        let mut interrupts = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts += 1;
            if interrupts == 1 {
                ::log::warn!(
                    "Interrupt received, finishing in-flight pages before exit (Ctrl-C again to force)"
                );
                shutdown.trigger();
            } else {
                ::log::error!("Second interrupt received, exiting without final checkpoint");
                std::process::exit(130);
            }
        }
    });

    match crawler.run().await {
        Ok(summary) => {
            print_summary(&summary);
            if summary.is_partial() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            ::log::error!("Failed to start crawler: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_summary(summary: &CrawlSummary) {
    println!();
    println!("Crawl complete in {:.2} seconds", summary.elapsed.as_secs_f64());
    println!("  processed: {}", summary.processed);
    println!("  errors:    {}", summary.errors);
    println!("  retries:   {}", summary.retries);
    println!("  visited:   {}", summary.visited);
    if summary.pending > 0 {
        println!("  pending:   {} (rerun with --resume)", summary.pending);
    }
    for failure in &summary.failures {
        println!("  failed: {} ({})", failure.url, failure.message);
    }
}
