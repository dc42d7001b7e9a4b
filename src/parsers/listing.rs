//! Product link extraction from a rendered listing page.

use crate::error::ExtractError;
use crate::filter::LinkFilter;
use crate::parsers::parse_selector;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Ordered set of resolved URLs; iteration order is first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `url` unless an identical string is already present
    pub fn insert(&mut self, url: String) -> bool {
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.urls.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }
}

impl From<Vec<String>> for LinkSet {
    fn from(urls: Vec<String>) -> Self {
        let mut set = LinkSet::new();
        for url in urls {
            set.insert(url);
        }
        set
    }
}

impl From<LinkSet> for Vec<String> {
    fn from(set: LinkSet) -> Self {
        set.urls
    }
}

/// An anchor href and what it resolves to against the page URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub raw_href: String,
    pub resolved_url: String,
}

/// Outcome of running the extractor over one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkExtraction {
    /// At least one link survived filtering
    Found {
        /// Resolved URLs in document order, one per distinct raw href
        links: Vec<String>,
        total_links_found: usize,
    },
    /// The page was searched but no link survived
    Empty { total_links_found: usize },
}

impl LinkExtraction {
    pub fn total_links_found(&self) -> usize {
        match self {
            LinkExtraction::Found {
                total_links_found, ..
            }
            | LinkExtraction::Empty { total_links_found } => *total_links_found,
        }
    }

    pub fn into_links(self) -> Vec<String> {
        match self {
            LinkExtraction::Found { links, .. } => links,
            LinkExtraction::Empty { .. } => Vec::new(),
        }
    }
}

/// Extract product links from rendered HTML.
///
/// The first of `container_selectors` that matches anything supplies the
/// anchors (no union across selectors); with no match the whole document is
/// used. Raw hrefs are deduplicated before resolution against `base_url`, and
/// resolved URLs must pass the allow/deny substring filter. Distinct hrefs
/// that resolve to the same URL each keep their entry.
pub fn extract_product_links(
    html: &str,
    base_url: &str,
    container_selectors: &[String],
    allow_patterns: &[String],
    deny_patterns: &[String],
) -> Result<LinkExtraction, ExtractError> {
    let base = Url::parse(base_url).map_err(|_| ExtractError::InvalidBaseUrl(base_url.to_string()))?;
    let filter = LinkFilter::new(allow_patterns, deny_patterns);
    let doc = Html::parse_document(html);

    let hrefs = container_hrefs(&doc, container_selectors);
    let total_links_found = hrefs.len();

    let mut links = Vec::new();
    for candidate in resolve_candidates(&hrefs, &base) {
        if filter.accepts(&candidate.resolved_url) {
            links.push(candidate.resolved_url);
        } else {
            ::log::trace!("Filtered out link: {}", candidate.resolved_url);
        }
    }

    ::log::debug!(
        "Extracted {} product links from {} anchors",
        links.len(),
        total_links_found
    );

    if links.is_empty() {
        Ok(LinkExtraction::Empty { total_links_found })
    } else {
        Ok(LinkExtraction::Found {
            links,
            total_links_found,
        })
    }
}

/// Anchor hrefs of the first matching container, in document order
fn container_hrefs<'a>(doc: &'a Html, container_selectors: &[String]) -> Vec<&'a str> {
    for selector in container_selectors {
        let selector = match parse_selector(selector) {
            Ok(selector) => selector,
            Err(e) => {
                ::log::debug!("{}", e);
                continue;
            }
        };

        let containers: Vec<ElementRef<'a>> = doc.select(&selector).collect();
        if containers.is_empty() {
            continue;
        }
        ::log::debug!(
            "Container selector matched {} element(s)",
            containers.len()
        );
        return containers
            .iter()
            .flat_map(|container| container.select(&ANCHOR))
            .filter_map(|a| a.value().attr("href"))
            .collect();
    }

    ::log::debug!("No container selector matched, using the whole document");
    doc.select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .collect()
}

/// Drop empty and repeated raw hrefs, then resolve the rest against `base`
pub fn resolve_candidates(hrefs: &[&str], base: &Url) -> Vec<CandidateLink> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for href in hrefs {
        if href.trim().is_empty() || !seen.insert(*href) {
            continue;
        }
        match base.join(href) {
            Ok(resolved) => candidates.push(CandidateLink {
                raw_href: href.to_string(),
                resolved_url: resolved.to_string(),
            }),
            Err(e) => ::log::debug!("Skipping unresolvable href {}: {}", href, e),
        }
    }

    candidates
}

/// JavaScript expression counting product links in the live page.
///
/// Each selector is tried in order and the first non-zero count wins; if
/// none matches, every anchor with an href is counted. A selector that
/// throws counts as no match.
pub fn link_count_expression(count_selectors: &[String]) -> String {
    let selectors = serde_json::to_string(count_selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
            for (const selector of {selectors}) {{
                try {{
                    const n = document.querySelectorAll(selector).length;
                    if (n > 0) {{ return n; }}
                }} catch (e) {{}}
            }}
            return document.querySelectorAll("a[href]").length;
        }})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn links(extraction: LinkExtraction) -> Vec<String> {
        extraction.into_links()
    }

    #[test]
    fn test_end_to_end_dedup_and_deny() {
        let html = r#"<html><body>
            <nav><a href="/w/men/nav">Men</a></nav>
            <div id="skip-to-products">
                <a href="/w/shoes/1">Shoe</a>
                <a href="/w/shoes/1">Shoe again</a>
                <a href="/help/size-guide">Size guide</a>
            </div>
        </body></html>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/w/",
            &strings(&["#skip-to-products"]),
            &strings(&["/shoes/"]),
            &strings(&["size-guide"]),
        )
        .unwrap();

        assert_eq!(extraction.total_links_found(), 3);
        assert_eq!(links(extraction), vec!["https://example.test/w/shoes/1"]);
    }

    #[test]
    fn test_fallback_takes_first_matching_container_only() {
        let html = r#"<html><body>
            <div class="featured"><a href="/product/featured">Featured</a></div>
            <section data-testid="product-grid">
                <a href="/product/a">A</a>
                <a href="/product/b">B</a>
                <a href="/product/c">C</a>
            </section>
        </body></html>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/",
            &strings(&["#skip-to-products", r#"[data-testid="product-grid"]"#, ".featured"]),
            &strings(&["/product/"]),
            &[],
        )
        .unwrap();

        assert_eq!(
            links(extraction),
            vec![
                "https://example.test/product/a",
                "https://example.test/product/b",
                "https://example.test/product/c",
            ]
        );
    }

    #[test]
    fn test_no_container_falls_back_to_document() {
        let html = r#"<a href="/product/x">X</a><a href="/about">About</a>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/",
            &strings(&[".product-grid"]),
            &strings(&["/product/"]),
            &[],
        )
        .unwrap();

        assert_eq!(extraction.total_links_found(), 2);
        assert_eq!(links(extraction), vec!["https://example.test/product/x"]);
    }

    #[test]
    fn test_invalid_container_selector_is_skipped() {
        let html = r#"<div class="grid"><a href="/product/1">1</a></div><a href="/product/2">2</a>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/",
            &strings(&["div[[", ".grid"]),
            &strings(&["/product/"]),
            &[],
        )
        .unwrap();

        assert_eq!(links(extraction), vec!["https://example.test/product/1"]);
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let html = r#"<a href="/product/1">1</a><a href="/product/1/reviews">Reviews</a>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/",
            &[],
            &strings(&["/product/"]),
            &strings(&["reviews"]),
        )
        .unwrap();

        assert_eq!(links(extraction), vec!["https://example.test/product/1"]);
    }

    #[test]
    fn test_everything_filtered_is_empty_not_error() {
        let html = r#"<a href="/help">Help</a><a href="">blank</a>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/",
            &[],
            &strings(&["/product/"]),
            &[],
        )
        .unwrap();

        assert_eq!(extraction, LinkExtraction::Empty { total_links_found: 2 });
    }

    #[test]
    fn test_absolute_links_are_kept_as_is() {
        let html = r#"<a href="https://cdn.example.test/product/9?color=red">9</a>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/w/",
            &[],
            &strings(&["/product/"]),
            &[],
        )
        .unwrap();

        assert_eq!(
            links(extraction),
            vec!["https://cdn.example.test/product/9?color=red"]
        );
    }

    #[test]
    fn test_distinct_hrefs_with_same_target_are_both_kept() {
        let html = r#"<div class="grid">
            <a href="shoes/1">Relative</a>
            <a href="/w/shoes/1">Rooted</a>
        </div>"#;

        let extraction = extract_product_links(
            html,
            "https://example.test/w/",
            &strings(&[".grid"]),
            &strings(&["/shoes/"]),
            &[],
        )
        .unwrap();

        assert_eq!(extraction.total_links_found(), 2);
        assert_eq!(
            links(extraction),
            vec!["https://example.test/w/shoes/1", "https://example.test/w/shoes/1"]
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = extract_product_links("<a href='/x'>x</a>", "not a url", &[], &[], &[]);
        assert!(matches!(result, Err(ExtractError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_resolve_candidates_dedups_raw_hrefs() {
        let base = Url::parse("https://example.test/w/").unwrap();
        let candidates = resolve_candidates(&["shoes/1", "", "shoes/1", "/w/shoes/2"], &base);

        assert_eq!(
            candidates,
            vec![
                CandidateLink {
                    raw_href: "shoes/1".to_string(),
                    resolved_url: "https://example.test/w/shoes/1".to_string(),
                },
                CandidateLink {
                    raw_href: "/w/shoes/2".to_string(),
                    resolved_url: "https://example.test/w/shoes/2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_link_set_keeps_first_seen_order() {
        let mut set = LinkSet::new();
        assert!(set.insert("b".to_string()));
        assert!(set.insert("a".to_string()));
        assert!(!set.insert("b".to_string()));
        assert_eq!(set.as_slice(), ["b".to_string(), "a".to_string()]);
        assert_eq!(Vec::from(set), vec!["b", "a"]);
    }
}
