pub mod config;
pub mod crawlers;
pub mod driver;
pub mod error;
pub mod filter;
pub mod middleware;
pub mod parsers;
pub mod pipeline;
pub mod readiness;
pub mod results;
pub mod scroll;
pub mod seen;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::CrawlConfig;
pub use driver::{DriverFactory, PageDriver};
pub use results::{LinkPageRecord, ProductRecord};
pub use seen::SeenUrls;

use crawlers::{ListingSpider, ProductSpider, runner};
use driver::webdriver::WebDriverFactory;
use error::ExportError;
use middleware::RequestPacer;
use pipeline::{DuplicatesStage, JsonExporter, Pipeline, PipelineStats, ValidationStage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const LINKS_FILE: &str = "product_links.json";
pub const PRODUCTS_FILE: &str = "products.json";

/// Outcome of a finished discovery pass
#[derive(Debug, Clone)]
pub struct LinkPassSummary {
    pub stats: PipelineStats,
    /// Every product link accepted during the run, in first-seen order
    pub product_links: Vec<String>,
}

/// Main builder for both crawl passes
pub struct Crawl<F: DriverFactory> {
    config: CrawlConfig,
    factory: Arc<F>,
    seen: SeenUrls,
}

impl Crawl<WebDriverFactory> {
    /// Crawl through a real browser reached over WebDriver
    pub fn webdriver(config: CrawlConfig) -> Self {
        let factory = WebDriverFactory::new(config.browser.clone());
        Self::new(config, factory)
    }
}

impl<F: DriverFactory> Crawl<F> {
    /// Creates a crawl over pages handed out by `factory`.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated crawl configuration
    /// * `factory` - Opens one fresh page per URL; shared by both passes
    pub fn new(config: CrawlConfig, factory: F) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            seen: SeenUrls::new(),
        }
    }

    /// Set the maximum number of concurrent browser sessions
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.concurrency = max_concurrency;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = output_dir.into();
        self
    }

    /// Replace the configured listing pages; an empty list keeps them
    pub fn with_start_urls(mut self, start_urls: Vec<String>) -> Self {
        if !start_urls.is_empty() {
            self.config.listing.start_urls = start_urls;
        }
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Product links accepted so far in this run
    pub fn seen(&self) -> &SeenUrls {
        &self.seen
    }

    fn pacer(&self) -> RequestPacer {
        RequestPacer::from_config(&self.config.pacing)
    }

    /// Start the discovery pass and get a receiver for its records
    pub async fn links(&self) -> mpsc::Receiver<LinkPageRecord> {
        let spider = Arc::new(ListingSpider::new(&self.config, self.seen.clone()));
        runner::start(
            spider,
            Arc::clone(&self.factory),
            self.config.listing.start_urls.clone(),
            self.config.concurrency,
            self.pacer(),
        )
        .await
    }

    /// Start the detail pass over `urls` and get a receiver for its records
    pub async fn products(&self, urls: Vec<String>) -> mpsc::Receiver<ProductRecord> {
        let spider = Arc::new(ProductSpider::new(&self.config));
        runner::start(
            spider,
            Arc::clone(&self.factory),
            urls,
            self.config.concurrency,
            self.pacer(),
        )
        .await
    }

    /// Run the discovery pass to completion and export its records
    pub async fn run_links(&self) -> Result<LinkPassSummary, ExportError> {
        let rx = self.links().await;
        // Page records are deduplicated by page URL; product links were merged by the spider
        let stats = Pipeline::new()
            .with_stage(ValidationStage::new())
            .with_stage(DuplicatesStage::new(SeenUrls::new()))
            .with_stage(JsonExporter::new(
                &self.config.output_dir,
                LINKS_FILE,
                self.config.write_csv,
            ))
            .drain(rx)
            .await?;

        Ok(LinkPassSummary {
            stats,
            product_links: self.seen.snapshot().await,
        })
    }

    /// Run the detail pass to completion and export its records.
    ///
    /// # Arguments
    ///
    /// * `urls` - Product pages to visit, usually the `product_links` of a [`LinkPassSummary`]
    ///   or the output of [`pipeline::load_product_links`]
    pub async fn run_products(&self, urls: Vec<String>) -> Result<PipelineStats, ExportError> {
        let rx = self.products(urls).await;
        Pipeline::new()
            .with_stage(ValidationStage::new())
            .with_stage(DuplicatesStage::new(SeenUrls::new()))
            .with_stage(JsonExporter::new(
                &self.config.output_dir,
                PRODUCTS_FILE,
                self.config.write_csv,
            ))
            .drain(rx)
            .await
    }
}
