//! Field extraction for a rendered product detail page.

use crate::config::ProductSelectors;
use crate::error::ExtractError;
use crate::parsers::{element_text, parse_selector};
use crate::results::ProductItem;
use crate::utils::timestamp;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

// "颜色：黑/白" or "Style: DD1391-100" -> value after the label
static LABELLED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[：:]\s*(.+)$").expect("static regex"));

fn first_text(doc: &Html, selector: &str) -> Result<Option<String>, ExtractError> {
    let selector = parse_selector(selector)?;
    Ok(doc
        .select(&selector)
        .map(|e| element_text(&e))
        .find(|text| !text.is_empty()))
}

fn all_attrs(doc: &Html, selector: &str, attr: &str) -> Result<Vec<String>, ExtractError> {
    let selector = parse_selector(selector)?;
    Ok(doc
        .select(&selector)
        .filter_map(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

/// Strip a leading "Label：" from a description list entry
pub fn labelled_value(text: &str) -> String {
    match LABELLED_VALUE.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Extract a [`ProductItem`] from the rendered HTML of `url`.
///
/// Only the title is required; every other field is optional.
pub fn parse_product(
    html: &str,
    url: &str,
    selectors: &ProductSelectors,
) -> Result<ProductItem, ExtractError> {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, &selectors.title)?.ok_or(ExtractError::MissingField("title"))?;
    let title = match first_text(&doc, &selectors.subtitle)? {
        Some(subtitle) => format!("{} | {}", title, subtitle),
        None => title,
    };

    Ok(ProductItem {
        url: url.to_string(),
        title,
        price: first_text(&doc, &selectors.price)?,
        color: first_text(&doc, &selectors.color)?.map(|t| labelled_value(&t)),
        size: all_attrs(&doc, &selectors.size, "value")?,
        sku: first_text(&doc, &selectors.sku)?.map(|t| labelled_value(&t)),
        details: first_text(&doc, &selectors.details)?,
        img_urls: all_attrs(&doc, &selectors.images, "src")?,
        timestamp: timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div id="title-container">
            <h1 data-testid="product_title"> Nike Air Max 90 </h1>
            <h2 data-testid="product_subtitle">Men's Shoes</h2>
        </div>
        <div id="price-container">
            <span data-testid="currentPrice-container">￥899</span>
        </div>
        <div id="product-description-container">
            <p>  Nothing as fly,
                 nothing as comfortable.  </p>
            <ul>
                <li data-testid="product-description-color-description">显示颜色：白色/黑色</li>
                <li data-testid="product-description-style-color">款式：DZ3522-100</li>
            </ul>
        </div>
        <fieldset>
            <input name="grid-selector-input" value="40">
            <input name="grid-selector-input" value="41">
            <input name="grid-selector-input" value="42.5">
        </fieldset>
        <img data-testid="HeroImg" src="https://static.example.test/a.png">
        <img data-testid="HeroImg" src="https://static.example.test/b.png">
    </body></html>"#;

    #[test]
    fn test_parse_full_product() {
        let item = parse_product(PAGE, "https://example.test/t/air-max-90", &ProductSelectors::default())
            .unwrap();

        assert_eq!(item.url, "https://example.test/t/air-max-90");
        assert_eq!(item.title, "Nike Air Max 90 | Men's Shoes");
        assert_eq!(item.price.as_deref(), Some("￥899"));
        assert_eq!(item.color.as_deref(), Some("白色/黑色"));
        assert_eq!(item.sku.as_deref(), Some("DZ3522-100"));
        assert_eq!(
            item.details.as_deref(),
            Some("Nothing as fly, nothing as comfortable.")
        );
        assert_eq!(item.size, vec!["40", "41", "42.5"]);
        assert_eq!(item.img_urls.len(), 2);
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let result = parse_product(
            "<html><body><p>Blocked</p></body></html>",
            "https://example.test/t/x",
            &ProductSelectors::default(),
        );
        assert!(matches!(result, Err(ExtractError::MissingField("title"))));
    }

    #[test]
    fn test_optional_fields_absent() {
        let html = r#"<h1 data-testid="product_title">Club Cap</h1>"#;
        let item = parse_product(html, "https://example.test/t/cap", &ProductSelectors::default())
            .unwrap();

        assert_eq!(item.title, "Club Cap");
        assert!(item.price.is_none());
        assert!(item.size.is_empty());
        assert!(item.img_urls.is_empty());
    }

    #[test]
    fn test_labelled_value() {
        assert_eq!(labelled_value("Style: DD1391-100"), "DD1391-100");
        assert_eq!(labelled_value("款式：FQ8080-133"), "FQ8080-133");
        assert_eq!(labelled_value("no label"), "no label");
    }
}
