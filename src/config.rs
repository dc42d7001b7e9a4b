use crate::error::ConfigError;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// How far a navigation must get before it is considered complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// The `load` event has fired
    Load,
    /// The DOM has been parsed; subresources may still be loading
    #[default]
    DomContentLoaded,
}

/// Top-level configuration for both crawl passes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    /// Maximum number of concurrent browser sessions
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory that receives the JSON/CSV output files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Also write a CSV next to every JSON output
    #[serde(default = "default_true")]
    pub write_csv: bool,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default)]
    pub product: ProductConfig,
}

/// Browser session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Alternative WebDriver URLs tried when the primary one refuses
    #[serde(default = "default_fallback_webdriver_urls")]
    pub fallback_webdriver_urls: Vec<String>,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// User agents rotated across sessions
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

/// Request pacing and navigation retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Base delay before each navigation
    #[serde(default = "default_download_delay_ms")]
    pub download_delay_ms: u64,

    /// Scale the delay by a random factor in [0.5, 1.5]
    #[serde(default = "default_true")]
    pub randomize_delay: bool,

    /// Extra navigation attempts after a transient failure
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Sanity checks applied to rendered pages (warnings only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_body_len")]
    pub min_body_len: usize,

    /// Case-insensitive substring every genuine page is expected to contain
    #[serde(default = "default_expected_marker")]
    pub expected_marker: Option<String>,
}

/// Page-load readiness probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Candidate selectors, tried in order
    pub selectors: Vec<String>,

    #[serde(default = "default_per_selector_timeout_ms")]
    pub per_selector_timeout_ms: u64,

    /// Fixed pause after the probe, whatever its outcome
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Infinite-scroll convergence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Consecutive unchanged iterations that count as converged
    #[serde(default = "default_no_change_threshold")]
    pub no_change_threshold: usize,

    /// Pause right after issuing the scroll
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_wait_per_iteration_ms")]
    pub max_wait_per_iteration_ms: u64,

    /// Distance from the bottom, in pixels, that still counts as "at the bottom"
    #[serde(default = "default_bottom_tolerance_px")]
    pub bottom_tolerance_px: u32,

    /// The bottom check is ignored until this much of the poll window has passed
    #[serde(default = "default_bottom_min_wait_ms")]
    pub bottom_min_wait_ms: u64,

    /// Selectors used to count product links; first non-zero count wins
    #[serde(default = "default_count_selectors")]
    pub count_selectors: Vec<String>,
}

/// Link extraction settings for listing pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Product grid containers in priority order
    #[serde(default = "default_container_selectors")]
    pub container_selectors: Vec<String>,

    /// A link is kept only if it contains one of these (case-insensitive)
    #[serde(default = "default_allow_patterns")]
    pub allow_patterns: Vec<String>,

    /// A link is dropped if it contains any of these (case-insensitive)
    #[serde(default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
}

/// Configuration for the link-discovery pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_start_urls")]
    pub start_urls: Vec<String>,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default)]
    pub wait_until: WaitUntil,

    /// Overall budget for one listing page after navigation
    #[serde(default = "default_listing_deadline_ms")]
    pub page_deadline_ms: u64,

    #[serde(default = "default_listing_readiness")]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

/// CSS selectors for the fields of a product page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSelectors {
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_subtitle_selector")]
    pub subtitle: String,
    #[serde(default = "default_price_selector")]
    pub price: String,
    #[serde(default = "default_color_selector")]
    pub color: String,
    #[serde(default = "default_sku_selector")]
    pub sku: String,
    #[serde(default = "default_size_selector")]
    pub size: String,
    #[serde(default = "default_details_selector")]
    pub details: String,
    #[serde(default = "default_image_selector")]
    pub images: String,
}

/// Configuration for the product-detail pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default)]
    pub wait_until: WaitUntil,

    #[serde(default = "default_product_deadline_ms")]
    pub page_deadline_ms: u64,

    #[serde(default = "default_product_readiness")]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub selectors: ProductSelectors,
}

fn default_true() -> bool {
    true
}

/// Default value for concurrency
fn default_concurrency() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_fallback_webdriver_urls() -> Vec<String> {
    vec![
        "http://localhost:9515".to_string(), // ChromeDriver default
        "http://127.0.0.1:4444".to_string(),
    ]
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_download_delay_ms() -> u64 {
    2000
}

fn default_retry_times() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_min_body_len() -> usize {
    1000
}

fn default_expected_marker() -> Option<String> {
    Some("nike".to_string())
}

fn default_per_selector_timeout_ms() -> u64 {
    15_000
}

fn default_settle_delay_ms() -> u64 {
    3000
}

fn default_max_iterations() -> usize {
    5
}

fn default_no_change_threshold() -> usize {
    2
}

fn default_scroll_settle_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_wait_per_iteration_ms() -> u64 {
    10_000
}

fn default_bottom_tolerance_px() -> u32 {
    100
}

fn default_bottom_min_wait_ms() -> u64 {
    3000
}

fn default_count_selectors() -> Vec<String> {
    strings(&[
        r#"div[id="skip-to-products"] a[href]"#,
        r#"[data-testid="product-grid"] a[href]"#,
        ".product-card a[href]",
        r#"a[href*="/product/"]"#,
    ])
}

fn default_container_selectors() -> Vec<String> {
    strings(&[
        r#"div[id="skip-to-products"]"#,
        r#"[data-testid="product-grid"]"#,
        ".product-grid",
    ])
}

fn default_allow_patterns() -> Vec<String> {
    strings(&[
        "/product/",
        "/shoes/",
        "/clothing/",
        "/accessories/",
        "/gear/",
        "/kids/",
        "/men/",
        "/women/",
    ])
}

fn default_deny_patterns() -> Vec<String> {
    strings(&["help", "size-guide", "reviews", "wishlist"])
}

fn default_start_urls() -> Vec<String> {
    strings(&["https://www.nike.com.cn/w/"])
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_listing_deadline_ms() -> u64 {
    180_000
}

fn default_product_deadline_ms() -> u64 {
    90_000
}

fn default_listing_readiness() -> ReadinessConfig {
    ReadinessConfig {
        selectors: strings(&[
            r#"div[id="skip-to-products"]"#,
            r#"[data-testid="product-grid"]"#,
            ".product-card",
            ".grid-item",
            "main",
        ]),
        per_selector_timeout_ms: default_per_selector_timeout_ms(),
        settle_delay_ms: default_settle_delay_ms(),
    }
}

fn default_product_readiness() -> ReadinessConfig {
    ReadinessConfig {
        selectors: strings(&[
            r#"h1[data-testid="product_title"]"#,
            "#title-container",
            "main",
        ]),
        per_selector_timeout_ms: 10_000,
        settle_delay_ms: 1000,
    }
}

fn default_title_selector() -> String {
    r#"h1[data-testid="product_title"]"#.to_string()
}

fn default_subtitle_selector() -> String {
    r#"h2[data-testid="product_subtitle"]"#.to_string()
}

fn default_price_selector() -> String {
    r#"span[data-testid="currentPrice-container"]"#.to_string()
}

fn default_color_selector() -> String {
    r#"li[data-testid="product-description-color-description"]"#.to_string()
}

fn default_sku_selector() -> String {
    r#"li[data-testid="product-description-style-color"]"#.to_string()
}

fn default_size_selector() -> String {
    r#"input[name="grid-selector-input"]"#.to_string()
}

fn default_details_selector() -> String {
    "#product-description-container p".to_string()
}

fn default_image_selector() -> String {
    r#"img[data-testid="HeroImg"]"#.to_string()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            pacing: PacingConfig::default(),
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            write_csv: true,
            validation: ValidationConfig::default(),
            listing: ListingConfig::default(),
            product: ProductConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            fallback_webdriver_urls: default_fallback_webdriver_urls(),
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agents: default_user_agents(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            download_delay_ms: default_download_delay_ms(),
            randomize_delay: true,
            retry_times: default_retry_times(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_body_len: default_min_body_len(),
            expected_marker: default_expected_marker(),
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            no_change_threshold: default_no_change_threshold(),
            scroll_settle_ms: default_scroll_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_per_iteration_ms: default_max_wait_per_iteration_ms(),
            bottom_tolerance_px: default_bottom_tolerance_px(),
            bottom_min_wait_ms: default_bottom_min_wait_ms(),
            count_selectors: default_count_selectors(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            container_selectors: default_container_selectors(),
            allow_patterns: default_allow_patterns(),
            deny_patterns: default_deny_patterns(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            start_urls: default_start_urls(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            wait_until: WaitUntil::default(),
            page_deadline_ms: default_listing_deadline_ms(),
            readiness: default_listing_readiness(),
            scroll: ScrollConfig::default(),
            extract: ExtractConfig::default(),
        }
    }
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self {
            title: default_title_selector(),
            subtitle: default_subtitle_selector(),
            price: default_price_selector(),
            color: default_color_selector(),
            sku: default_sku_selector(),
            size: default_size_selector(),
            details: default_details_selector(),
            images: default_image_selector(),
        }
    }
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            wait_until: WaitUntil::default(),
            page_deadline_ms: default_product_deadline_ms(),
            readiness: default_product_readiness(),
            selectors: ProductSelectors::default(),
        }
    }
}

impl CrawlConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Apply the `WEBDRIVER_URL` environment override, if set
    pub fn apply_env(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.browser.webdriver_url = webdriver_url;
            }
        }
    }

    /// Reject settings the crawler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.browser.user_agents.is_empty() {
            return Err(ConfigError::Invalid("user_agents must not be empty".into()));
        }

        for url in &self.listing.start_urls {
            Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
                url: url.clone(),
                source,
            })?;
        }

        let scroll = &self.listing.scroll;
        if scroll.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be at least 1".into()));
        }
        if scroll.no_change_threshold == 0 {
            return Err(ConfigError::Invalid(
                "no_change_threshold must be at least 1".into(),
            ));
        }
        if scroll.poll_interval_ms == 0 && scroll.max_wait_per_iteration_ms > 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.listing.extract.allow_patterns.is_empty() {
            return Err(ConfigError::Invalid("allow_patterns must not be empty".into()));
        }

        let selectors = self
            .listing
            .readiness
            .selectors
            .iter()
            .chain(&self.listing.extract.container_selectors)
            .chain(&scroll.count_selectors)
            .chain(&self.product.readiness.selectors);
        for selector in selectors {
            check_selector(selector)?;
        }

        let fields = &self.product.selectors;
        for selector in [
            &fields.title,
            &fields.subtitle,
            &fields.price,
            &fields.color,
            &fields.sku,
            &fields.size,
            &fields.details,
            &fields.images,
        ] {
            check_selector(selector)?;
        }

        Ok(())
    }
}

fn check_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidSelector(selector.to_string()))
}

impl ReadinessConfig {
    pub fn per_selector_timeout(&self) -> Duration {
        Duration::from_millis(self.per_selector_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ListingConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn page_deadline(&self) -> Duration {
        Duration::from_millis(self.page_deadline_ms)
    }
}

impl ProductConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn page_deadline(&self) -> Duration {
        Duration::from_millis(self.page_deadline_ms)
    }
}
