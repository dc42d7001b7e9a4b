//! Per-request policies wrapped around every page visit.

use crate::config::{PacingConfig, ValidationConfig, WaitUntil};
use crate::driver::PageDriver;
use crate::error::DriverError;
use rand::Rng;
use std::time::Duration;

/// Picks a user agent at random for every new session
#[derive(Debug, Clone)]
pub struct UserAgentRotator {
    user_agents: Vec<String>,
}

impl UserAgentRotator {
    pub fn new(user_agents: Vec<String>) -> Self {
        Self { user_agents }
    }

    pub fn next(&self) -> &str {
        if self.user_agents.is_empty() {
            return "";
        }
        let idx = rand::rng().random_range(0..self.user_agents.len());
        &self.user_agents[idx]
    }
}

/// Spaces out navigations so the crawl does not hammer the site
#[derive(Debug, Clone)]
pub struct RequestPacer {
    delay: Duration,
    randomize: bool,
}

impl RequestPacer {
    pub fn new(delay: Duration, randomize: bool) -> Self {
        Self { delay, randomize }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.download_delay_ms),
            config.randomize_delay,
        )
    }

    /// The delay to apply before the next request
    pub fn next_delay(&self) -> Duration {
        if !self.randomize || self.delay.is_zero() {
            return self.delay;
        }
        let factor: f64 = rand::rng().random_range(0.5..=1.5);
        self.delay.mul_f64(factor)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        ::log::debug!("Delaying request for {:.2} seconds", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

/// Retries navigations that failed for transient reasons
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retry_times: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retry_times: u32, backoff: Duration) -> Self {
        Self {
            retry_times,
            backoff,
        }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self::new(
            config.retry_times,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    pub async fn navigate(
        &self,
        driver: &mut dyn PageDriver,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let mut attempt = 0;
        loop {
            match driver.navigate(url, wait_until, timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retry_times => {
                    attempt += 1;
                    ::log::warn!(
                        "Navigation to {} failed ({}), retry {}/{}",
                        url,
                        e,
                        attempt,
                        self.retry_times
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Flags rendered pages that look blocked or empty
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    min_body_len: usize,
    expected_marker: Option<String>,
}

/// Why a rendered page looks suspicious
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseWarning {
    TooShort(usize),
    MissingMarker(String),
}

impl ResponseValidator {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            min_body_len: config.min_body_len,
            expected_marker: config.expected_marker.as_ref().map(|m| m.to_lowercase()),
        }
    }

    pub fn check(&self, html: &str) -> Vec<ResponseWarning> {
        let mut warnings = Vec::new();
        if html.len() < self.min_body_len {
            warnings.push(ResponseWarning::TooShort(html.len()));
        }
        if let Some(marker) = &self.expected_marker {
            if !html.to_lowercase().contains(marker) {
                warnings.push(ResponseWarning::MissingMarker(marker.clone()));
            }
        }
        warnings
    }

    /// Log every warning for `url`; the page is processed regardless
    pub fn inspect(&self, url: &str, html: &str) {
        for warning in self.check(html) {
            match warning {
                ResponseWarning::TooShort(len) => ::log::warn!(
                    "Response body for {} seems too short ({} bytes), might be blocked",
                    url,
                    len
                ),
                ResponseWarning::MissingMarker(marker) => ::log::warn!(
                    "Response for {} doesn't contain expected content '{}'",
                    url,
                    marker
                ),
            }
        }
    }
}
