//! Scripted in-memory page for exercising the crawl logic without a browser.

use crate::config::WaitUntil;
use crate::driver::{DriverFactory, PageDriver};
use crate::error::DriverError;
use crate::scroll::PageFingerprint;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Call counters shared between a test and the pages it hands out
#[derive(Debug, Default)]
pub struct Probe {
    pub closes: AtomicUsize,
    pub navigations: AtomicUsize,
    pub samples: AtomicUsize,
    pub scrolls: AtomicUsize,
}

impl Probe {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

/// What a fingerprint sample returns
pub enum Sample {
    Ok(PageFingerprint),
    Fail,
}

pub struct ScriptedPage {
    pub probe: Arc<Probe>,
    /// Selectors that resolve immediately; all others time out
    pub present: HashSet<String>,
    /// Selectors whose wait errors out instead of timing out
    pub broken: HashSet<String>,
    /// Consumed one per sample; the last entry repeats once exhausted
    pub samples: VecDeque<Sample>,
    last_sample: PageFingerprint,
    pub at_bottom: bool,
    pub fail_scroll: bool,
    /// Navigation errors returned before navigation starts succeeding
    pub navigation_failures: VecDeque<DriverError>,
    /// Navigation never completes (simulates a hung load)
    pub hang_navigation: bool,
    /// Closing never completes
    pub hang_close: bool,
    pub html: String,
}

impl ScriptedPage {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            present: HashSet::new(),
            broken: HashSet::new(),
            samples: VecDeque::new(),
            last_sample: PageFingerprint::default(),
            at_bottom: false,
            fail_scroll: false,
            navigation_failures: VecDeque::new(),
            hang_navigation: false,
            hang_close: false,
            html: String::new(),
        }
    }

    pub fn with_present(mut self, selectors: &[&str]) -> Self {
        self.present = selectors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_heights(mut self, heights: &[u64]) -> Self {
        self.samples = heights
            .iter()
            .map(|&h| {
                Sample::Ok(PageFingerprint {
                    scroll_height: h,
                    link_count: 0,
                })
            })
            .collect();
        self
    }

    pub fn with_samples(mut self, samples: Vec<Sample>) -> Self {
        self.samples = samples.into();
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    fn next_sample(&mut self) -> Result<Value, DriverError> {
        self.probe.samples.fetch_add(1, Ordering::SeqCst);
        let sample = if self.samples.len() > 1 {
            self.samples.pop_front()
        } else {
            self.samples.front().map(|s| match s {
                Sample::Ok(fp) => Sample::Ok(*fp),
                Sample::Fail => Sample::Fail,
            })
        };
        match sample.unwrap_or(Sample::Ok(self.last_sample)) {
            Sample::Ok(fp) => {
                self.last_sample = fp;
                Ok(json!({ "scrollHeight": fp.scroll_height, "linkCount": fp.link_count }))
            }
            Sample::Fail => Err(DriverError::Script("scripted failure".to_string())),
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(
        &mut self,
        url: &str,
        _wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.probe.navigations.fetch_add(1, Ordering::SeqCst);
        if self.hang_navigation {
            tokio::time::sleep(timeout).await;
            return Err(DriverError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            });
        }
        match self.navigation_failures.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn evaluate_script(&mut self, script: &str) -> Result<Value, DriverError> {
        if script.contains("linkCount") {
            self.next_sample()
        } else if script.contains("innerHeight") {
            Ok(Value::Bool(self.at_bottom))
        } else if script.contains("scrollTo") {
            self.probe.scrolls.fetch_add(1, Ordering::SeqCst);
            if self.fail_scroll {
                Err(DriverError::Script("scroll rejected".to_string()))
            } else {
                Ok(Value::Null)
            }
        } else {
            Ok(Value::Null)
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        if self.broken.contains(selector) {
            return Err(DriverError::Script(format!("bad selector {}", selector)));
        }
        if self.present.contains(selector) {
            return Ok(true);
        }
        tokio::time::sleep(timeout).await;
        Ok(false)
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        Ok(self.html.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.hang_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Hands out pages built by `build`, failing the first `connect_failures` opens
pub struct ScriptedFactory<F>
where
    F: Fn() -> ScriptedPage + Send + Sync + 'static,
{
    pub build: F,
    pub connect_failures: AtomicUsize,
    pub opened: AtomicUsize,
}

impl<F> ScriptedFactory<F>
where
    F: Fn() -> ScriptedPage + Send + Sync + 'static,
{
    pub fn new(build: F) -> Self {
        Self {
            build,
            connect_failures: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<F> DriverFactory for ScriptedFactory<F>
where
    F: Fn() -> ScriptedPage + Send + Sync + 'static,
{
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let failures_left = self.connect_failures.load(Ordering::SeqCst);
        if failures_left > 0 {
            self.connect_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(DriverError::Connect("scripted".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new((self.build)()))
    }
}
