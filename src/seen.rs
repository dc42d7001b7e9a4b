use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// URLs already accepted during one crawl run, shared by all page tasks.
///
/// Every check-then-insert happens under one lock, so two pages processed
/// concurrently can never both accept the same URL as new.
#[derive(Debug, Clone, Default)]
pub struct SeenUrls {
    inner: Arc<Mutex<SeenInner>>,
}

#[derive(Debug, Default)]
struct SeenInner {
    set: HashSet<String>,
    order: Vec<String>,
}

impl SeenUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `url`, returning `true` if it had not been seen before
    pub async fn insert_if_new(&self, url: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.set.contains(url) {
            return false;
        }
        inner.set.insert(url.to_string());
        inner.order.push(url.to_string());
        true
    }

    /// Merge `urls`, returning the ones that were new, in input order
    pub async fn merge<'a, I>(&self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut inner = self.inner.lock().await;
        let mut fresh = Vec::new();
        for url in urls {
            if inner.set.insert(url.clone()) {
                inner.order.push(url.clone());
                fresh.push(url.clone());
            }
        }
        fresh
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.set.len()
    }

    /// Everything accepted so far, in first-seen order
    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.lock().await.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_if_new() {
        let seen = SeenUrls::new();
        assert!(seen.insert_if_new("https://example.test/a").await);
        assert!(!seen.insert_if_new("https://example.test/a").await);
        assert_eq!(seen.len().await, 1);
    }

    #[tokio::test]
    async fn test_merge_reports_only_new_urls() {
        let seen = SeenUrls::new();
        seen.insert_if_new("b").await;

        let urls = vec!["a".to_string(), "b".to_string(), "c".to_string(), "a".to_string()];
        let fresh = seen.merge(&urls).await;

        assert_eq!(fresh, vec!["a", "c"]);
        assert_eq!(seen.snapshot().await, vec!["b", "a", "c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_accept_once() {
        let seen = SeenUrls::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let seen = seen.clone();
            handles.push(tokio::spawn(async move {
                seen.insert_if_new("https://example.test/same").await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }
}
