pub mod listing;
pub mod product;

use crate::error::ExtractError;
use scraper::{ElementRef, Selector};

/// Compile a CSS selector, keeping the source text in the error
pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::InvalidSelector(selector.to_string()))
}

/// Collapse every run of whitespace into a single space and trim the ends
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized text content of an element
pub fn element_text(element: &ElementRef<'_>) -> String {
    normalize_space(&element.text().collect::<Vec<_>>().join(" "))
}
