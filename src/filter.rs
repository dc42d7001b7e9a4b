/// Case-insensitive allow/deny filter over resolved URLs
#[derive(Debug, Clone)]
pub struct LinkFilter {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl LinkFilter {
    /// Create a new link filter; patterns are lowercased once up front
    pub fn new(allow: &[String], deny: &[String]) -> Self {
        let lower = |patterns: &[String]| -> Vec<String> {
            patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect()
        };
        Self {
            allow: lower(allow),
            deny: lower(deny),
        }
    }

    /// Whether `url` should be kept
    pub fn accepts(&self, url: &str) -> bool {
        let url = url.to_lowercase();

        if self.deny.iter().any(|pattern| url.contains(pattern)) {
            return false;
        }

        self.allow.iter().any(|pattern| url.contains(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(allow: &[&str], deny: &[&str]) -> LinkFilter {
        let allow: Vec<String> = allow.iter().map(|s| s.to_string()).collect();
        let deny: Vec<String> = deny.iter().map(|s| s.to_string()).collect();
        LinkFilter::new(&allow, &deny)
    }

    #[test]
    fn test_allow_and_deny() {
        let filter = filter(&["/product/"], &["reviews"]);

        assert!(filter.accepts("https://example.test/product/air-max-90"));
        assert!(!filter.accepts("https://example.test/product/air-max-90/reviews"));
        assert!(!filter.accepts("https://example.test/help/returns"));
    }

    #[test]
    fn test_case_insensitive() {
        let filter = filter(&["/Shoes/"], &["SIZE-GUIDE"]);

        assert!(filter.accepts("https://example.test/w/SHOES/1"));
        assert!(!filter.accepts("https://example.test/w/shoes/size-guide"));
    }

    #[test]
    fn test_empty_allow_list_rejects_everything() {
        let filter = filter(&[], &[]);
        assert!(!filter.accepts("https://example.test/product/1"));
    }

    #[test]
    fn test_empty_patterns_are_ignored() {
        let filter = filter(&["", "/gear/"], &[""]);
        assert!(filter.accepts("https://example.test/gear/bag"));
        assert!(!filter.accepts("https://example.test/men/"));
    }
}
