use catalog_crawl::pipeline::load_product_links;
use catalog_crawl::{Crawl, CrawlConfig, LINKS_FILE};
use clap::Parser;
use std::process::ExitCode;

mod args;
use args::{Args, Command};

fn load_config(args: &Args) -> Result<CrawlConfig, catalog_crawl::error::ConfigError> {
    let mut config = match &args.config {
        Some(path) => CrawlConfig::from_file(path)?,
        None => CrawlConfig::default(),
    };
    config.apply_env();
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    ::log::info!(
        "Using WebDriver at {} with {} concurrent sessions",
        config.browser.webdriver_url,
        config.concurrency
    );

    let start_time = std::time::Instant::now();
    let output_dir = config.output_dir.clone();

    let result = match args.command {
        Command::Links { start_urls } => {
            let crawl = Crawl::webdriver(config).with_start_urls(start_urls);
            crawl.run_links().await.map(|summary| {
                ::log::info!(
                    "Discovered {} product links on {} listing pages ({} errors)",
                    summary.product_links.len(),
                    summary.stats.received,
                    summary.stats.errors
                );
            })
        }
        Command::Products { input } => {
            let input = input.unwrap_or_else(|| output_dir.join(LINKS_FILE));
            match load_product_links(&input) {
                Ok(urls) => {
                    let crawl = Crawl::webdriver(config);
                    crawl.run_products(urls).await.map(|stats| {
                        ::log::info!(
                            "Scraped {} product pages ({} errors)",
                            stats.received,
                            stats.errors
                        );
                    })
                }
                Err(e) => Err(e),
            }
        }
        Command::Crawl { start_urls } => {
            let crawl = Crawl::webdriver(config).with_start_urls(start_urls);
            match crawl.run_links().await {
                Ok(summary) => {
                    ::log::info!(
                        "Discovered {} product links, starting product pass",
                        summary.product_links.len()
                    );
                    crawl.run_products(summary.product_links).await.map(|stats| {
                        ::log::info!(
                            "Scraped {} product pages ({} errors)",
                            stats.received,
                            stats.errors
                        );
                    })
                }
                Err(e) => Err(e),
            }
        }
    };

    let duration = start_time.elapsed();
    match result {
        Ok(()) => {
            ::log::info!(
                "Crawling complete in {:.2} seconds, output in {}",
                duration.as_secs_f64(),
                output_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Crawl failed after {:.2} seconds: {}", duration.as_secs_f64(), e);
            ExitCode::FAILURE
        }
    }
}
