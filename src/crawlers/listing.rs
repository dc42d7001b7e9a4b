//! Link-discovery pass: render a listing page, scroll it out, collect product URLs.

use crate::config::{CrawlConfig, ListingConfig};
use crate::crawlers::spider::{Spider, close_page};
use crate::driver::PageDriver;
use crate::error::DriverError;
use crate::middleware::{ResponseValidator, RetryPolicy};
use crate::parsers::listing::{LinkExtraction, extract_product_links};
use crate::readiness::wait_for_ready_with;
use crate::results::LinkPageRecord;
use crate::scroll::{ScrollOptions, scroll_until_stable_by};
use crate::seen::SeenUrls;
use async_trait::async_trait;
use tokio::time::{Instant, timeout, timeout_at};

pub struct ListingSpider {
    config: ListingConfig,
    scroll: ScrollOptions,
    retry: RetryPolicy,
    validator: ResponseValidator,
    seen: SeenUrls,
}

impl ListingSpider {
    /// Creates a spider for the listing pages of `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Crawl configuration; only the listing, pacing and validation sections are used
    /// * `seen` - Run-scoped set that collects every product link accepted during this run
    pub fn new(config: &CrawlConfig, seen: SeenUrls) -> Self {
        Self {
            scroll: ScrollOptions::from(&config.listing.scroll),
            config: config.listing.clone(),
            retry: RetryPolicy::from_config(&config.pacing),
            validator: ResponseValidator::from_config(&config.validation),
            seen,
        }
    }

    /// Navigation (with retries) followed by the readiness check
    async fn load(&self, driver: &mut dyn PageDriver, url: &str) -> Result<(), DriverError> {
        self.retry
            .navigate(
                driver,
                url,
                self.config.wait_until,
                self.config.navigation_timeout(),
            )
            .await?;

        // A page that never shows its grid is still scrolled and parsed
        wait_for_ready_with(driver, &self.config.readiness).await;
        Ok(())
    }

    /// Loads, scrolls and captures one page without closing it
    async fn render(
        &self,
        driver: &mut dyn PageDriver,
        url: &str,
        deadline: Instant,
    ) -> Result<String, DriverError> {
        // Loading is all-or-nothing: running out of time here fails the page
        match timeout_at(deadline, self.load(driver, url)).await {
            Ok(loaded) => loaded?,
            Err(_) => {
                return Err(DriverError::Timeout {
                    operation: "page load",
                    timeout: self.config.page_deadline(),
                });
            }
        }

        // Scrolling stops at the deadline and keeps whatever has rendered
        scroll_until_stable_by(driver, &self.scroll, Some(deadline)).await;

        // Capture the final DOM
        let limit = self.config.navigation_timeout();
        match timeout(limit, driver.content()).await {
            Ok(content) => content,
            Err(_) => Err(DriverError::Timeout {
                operation: "reading page content",
                timeout: limit,
            }),
        }
    }

    /// Processes one listing page and always closes `driver` exactly once.
    ///
    /// # Arguments
    ///
    /// * `driver` - A freshly opened page owned by this call
    /// * `url` - The listing page, also used as the base URL for relative links
    pub async fn process_page(&self, driver: &mut dyn PageDriver, url: &str) -> LinkPageRecord {
        ::log::info!("Processing listing page: {}", url);

        let deadline = Instant::now() + self.config.page_deadline();
        let rendered = self.render(driver, url, deadline).await;

        // Release the session before any parsing, whatever happened above
        close_page(driver, url).await;

        let html = match rendered {
            Ok(html) => html,
            Err(e) => {
                ::log::error!("Failed to render {}: {}", url, e);
                return LinkPageRecord::error(url, e.to_string());
            }
        };

        // Suspicious pages are only logged
        self.validator.inspect(url, &html);

        let extract = &self.config.extract;
        let extraction = match extract_product_links(
            &html,
            url,
            &extract.container_selectors,
            &extract.allow_patterns,
            &extract.deny_patterns,
        ) {
            Ok(extraction) => extraction,
            Err(e) => {
                ::log::error!("Failed to parse links on {}: {}", url, e);
                return LinkPageRecord::error(url, format!("link parsing failed: {}", e));
            }
        };

        match extraction {
            LinkExtraction::Found {
                links,
                total_links_found,
            } => {
                // Record the links for cross-page dedup; the page record keeps its own list
                let fresh = self.seen.merge(links.iter()).await;
                ::log::info!(
                    "Extracted {} product links from {} ({} new in this run)",
                    links.len(),
                    url,
                    fresh.len()
                );
                LinkPageRecord::success(url, links, total_links_found)
            }
            LinkExtraction::Empty {
                total_links_found: 0,
            } => {
                ::log::warn!("No links found on {}", url);
                LinkPageRecord::error(url, "no product links found")
            }
            LinkExtraction::Empty { total_links_found } => {
                ::log::warn!(
                    "None of the {} links on {} looked like product links",
                    total_links_found,
                    url
                );
                LinkPageRecord::success(url, Vec::new(), total_links_found)
            }
        }
    }
}

#[async_trait]
impl Spider for ListingSpider {
    type Output = LinkPageRecord;

    fn name(&self) -> &'static str {
        "product_links"
    }

    async fn process(&self, driver: &mut dyn PageDriver, url: &str) -> LinkPageRecord {
        self.process_page(driver, url).await
    }

    fn session_failed(&self, url: &str, error: &DriverError) -> LinkPageRecord {
        LinkPageRecord::error(url, error.to_string())
    }
}
