use crate::utils::timestamp;
use serde::{Deserialize, Serialize};

/// Product links discovered on one listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLinks {
    pub page_url: String,
    /// In document order; distinct hrefs to the same URL are not merged
    pub product_links: Vec<String>,
    pub link_count: usize,
    /// Anchors seen in the chosen container before dedup and filtering
    pub total_links_found: usize,
    pub timestamp: String,
}

/// Why a page produced no usable result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub page_url: String,
    pub error: String,
    pub timestamp: String,
}

/// Structured attributes of one product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub url: String,
    pub title: String,
    pub price: Option<String>,
    pub color: Option<String>,
    pub size: Vec<String>,
    pub sku: Option<String>,
    pub details: Option<String>,
    pub img_urls: Vec<String>,
    pub timestamp: String,
}

/// Result of the link-discovery pass for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LinkPageRecord {
    Success(ProductLinks),
    Error(ErrorDetail),
}

/// Result of the detail pass for one product URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProductRecord {
    Success(ProductItem),
    Error(ErrorDetail),
}

impl ErrorDetail {
    pub fn new(page_url: &str, error: impl Into<String>) -> Self {
        Self {
            page_url: page_url.to_string(),
            error: error.into(),
            timestamp: timestamp(),
        }
    }
}

impl LinkPageRecord {
    pub fn success(page_url: &str, links: Vec<String>, total_links_found: usize) -> Self {
        LinkPageRecord::Success(ProductLinks {
            page_url: page_url.to_string(),
            link_count: links.len(),
            product_links: links,
            total_links_found,
            timestamp: timestamp(),
        })
    }

    pub fn error(page_url: &str, error: impl Into<String>) -> Self {
        LinkPageRecord::Error(ErrorDetail::new(page_url, error))
    }

    /// Links of a success record; empty for errors
    pub fn product_links(&self) -> &[String] {
        match self {
            LinkPageRecord::Success(links) => links.product_links.as_slice(),
            LinkPageRecord::Error(_) => &[],
        }
    }
}

impl ProductRecord {
    pub fn error(url: &str, error: impl Into<String>) -> Self {
        ProductRecord::Error(ErrorDetail::new(url, error))
    }
}

/// Common view of records used by the item pipeline
pub trait CrawlRecord: Serialize + Send + 'static {
    /// The page this record describes
    fn url(&self) -> &str;

    /// Error message for error records
    fn error(&self) -> Option<&str>;

    /// Fields a downstream consumer expects but that are empty here
    fn missing_fields(&self) -> Vec<&'static str>;
}

impl CrawlRecord for LinkPageRecord {
    fn url(&self) -> &str {
        match self {
            LinkPageRecord::Success(links) => &links.page_url,
            LinkPageRecord::Error(detail) => &detail.page_url,
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            LinkPageRecord::Success(_) => None,
            LinkPageRecord::Error(detail) => Some(&detail.error),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            LinkPageRecord::Success(links) if links.product_links.is_empty() => {
                vec!["product_links"]
            }
            _ => Vec::new(),
        }
    }
}

impl CrawlRecord for ProductRecord {
    fn url(&self) -> &str {
        match self {
            ProductRecord::Success(item) => &item.url,
            ProductRecord::Error(detail) => &detail.page_url,
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            ProductRecord::Success(_) => None,
            ProductRecord::Error(detail) => Some(&detail.error),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if let ProductRecord::Success(item) = self {
            if item.url.is_empty() {
                missing.push("url");
            }
            if item.title.is_empty() {
                missing.push("title");
            }
        }
        missing
    }
}
