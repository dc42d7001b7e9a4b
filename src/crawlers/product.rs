//! Detail pass: render each discovered product page and pull its fields.

use crate::config::{CrawlConfig, ProductConfig};
use crate::crawlers::spider::{Spider, close_page};
use crate::driver::PageDriver;
use crate::error::DriverError;
use crate::middleware::{ResponseValidator, RetryPolicy};
use crate::parsers::product::parse_product;
use crate::readiness::wait_for_ready_with;
use crate::results::ProductRecord;
use async_trait::async_trait;
use tokio::time::timeout;

pub struct ProductSpider {
    config: ProductConfig,
    retry: RetryPolicy,
    validator: ResponseValidator,
}

impl ProductSpider {
    /// Creates a spider for product detail pages.
    ///
    /// # Arguments
    ///
    /// * `config` - Crawl configuration; the product, pacing and validation sections are used
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            config: config.product.clone(),
            retry: RetryPolicy::from_config(&config.pacing),
            validator: ResponseValidator::from_config(&config.validation),
        }
    }

    async fn render(&self, driver: &mut dyn PageDriver, url: &str) -> Result<String, DriverError> {
        // Navigate with retries
        self.retry
            .navigate(
                driver,
                url,
                self.config.wait_until,
                self.config.navigation_timeout(),
            )
            .await?;

        // Missing title container is caught by the parser, not here
        wait_for_ready_with(driver, &self.config.readiness).await;
        driver.content().await
    }

    /// Process one product page. Always closes `driver` exactly once
    pub async fn process_page(&self, driver: &mut dyn PageDriver, url: &str) -> ProductRecord {
        ::log::info!("Processing product page: {}", url);

        let deadline = self.config.page_deadline();
        let rendered = timeout(deadline, self.render(driver, url)).await;
        close_page(driver, url).await;

        let rendered = rendered.unwrap_or(Err(DriverError::Timeout {
            operation: "page processing",
            timeout: deadline,
        }));
        let html = match rendered {
            Ok(html) => html,
            Err(e) => {
                ::log::error!("Failed to render {}: {}", url, e);
                return ProductRecord::error(url, e.to_string());
            }
        };

        // Suspicious pages are only logged
        self.validator.inspect(url, &html);

        match parse_product(&html, url, &self.config.selectors) {
            Ok(item) => {
                ::log::info!("Parsed product {}: {}", url, item.title);
                ProductRecord::Success(item)
            }
            Err(e) => {
                ::log::error!("Failed to parse product {}: {}", url, e);
                ProductRecord::error(url, format!("product parsing failed: {}", e))
            }
        }
    }
}

#[async_trait]
impl Spider for ProductSpider {
    type Output = ProductRecord;

    fn name(&self) -> &'static str {
        "products"
    }

    async fn process(&self, driver: &mut dyn PageDriver, url: &str) -> ProductRecord {
        self.process_page(driver, url).await
    }

    fn session_failed(&self, url: &str, error: &DriverError) -> ProductRecord {
        ProductRecord::error(url, error.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crawlers::listing::tests::test_config;
    use crate::driver::mock::{Probe, ScriptedPage};
    use std::sync::Arc;

    pub(crate) const PRODUCT_HTML: &str = r#"<html><body>
        <h1 data-testid="product_title">Air Zoom Pegasus</h1>
        <span data-testid="currentPrice-container">$130</span>
    </body></html>"#;

    fn product_config() -> CrawlConfig {
        let mut config = test_config();
        config.product.readiness.selectors = vec!["#title-container".to_string()];
        config.product.readiness.per_selector_timeout_ms = 1_000;
        config.product.readiness.settle_delay_ms = 0;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_product_success() {
        let probe = Arc::new(Probe::default());
        let spider = ProductSpider::new(&product_config());
        let mut page = ScriptedPage::new(probe.clone()).with_html(PRODUCT_HTML);

        let record = spider.process_page(&mut page, "https://example.test/t/pegasus").await;

        match record {
            ProductRecord::Success(item) => {
                assert_eq!(item.title, "Air Zoom Pegasus");
                assert_eq!(item.price.as_deref(), Some("$130"));
                assert_eq!(item.url, "https://example.test/t/pegasus");
            }
            ProductRecord::Error(e) => panic!("unexpected error record: {}", e.error),
        }
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_title_yields_error_record() {
        let probe = Arc::new(Probe::default());
        let spider = ProductSpider::new(&product_config());
        let mut page = ScriptedPage::new(probe.clone()).with_html("<html><body>Sold out</body></html>");

        let record = spider.process_page(&mut page, "https://example.test/t/gone").await;

        match record {
            ProductRecord::Error(detail) => assert!(detail.error.contains("title")),
            ProductRecord::Success(_) => panic!("expected an error record"),
        }
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_page_times_out_and_closes() {
        let probe = Arc::new(Probe::default());
        let mut config = product_config();
        config.product.page_deadline_ms = 2_000;
        config.product.navigation_timeout_ms = 30_000;
        let spider = ProductSpider::new(&config);
        let mut page = ScriptedPage::new(probe.clone()).with_html(PRODUCT_HTML);
        page.hang_navigation = true;

        let record = spider.process_page(&mut page, "https://example.test/t/slow").await;

        match record {
            ProductRecord::Error(detail) => {
                assert_eq!(detail.error, "page processing timed out after 2s")
            }
            ProductRecord::Success(_) => panic!("expected an error record"),
        }
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_navigation_failure() {
        let probe = Arc::new(Probe::default());
        let mut config = product_config();
        config.pacing.retry_times = 2;
        config.pacing.retry_backoff_ms = 10;
        let spider = ProductSpider::new(&config);
        let mut page = ScriptedPage::new(probe.clone()).with_html(PRODUCT_HTML);
        page.navigation_failures.push_back(DriverError::Navigation {
            url: "https://example.test/t/pegasus".to_string(),
            reason: "net::ERR_CONNECTION_RESET".to_string(),
        });

        let record = spider.process_page(&mut page, "https://example.test/t/pegasus").await;

        assert!(matches!(record, ProductRecord::Success(_)));
        assert_eq!(probe.navigations(), 2);
        assert_eq!(probe.closes(), 1);
    }
}
