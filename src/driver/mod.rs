//! The rendered-page capability the crawl passes are written against.
//!
//! Every call that waits on the browser takes an explicit timeout or is
//! bounded by the page deadline of its caller.

pub mod webdriver;

#[cfg(test)]
pub mod mock;

use crate::config::WaitUntil;
use crate::error::DriverError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One browser page/session, owned by a single page-processing task
#[async_trait]
pub trait PageDriver: Send {
    /// Load `url` and wait until it reaches `wait_until`, at most `timeout`
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Run a script in page context; the script must `return` its value
    async fn evaluate_script(&mut self, script: &str) -> Result<Value, DriverError>;

    /// `Ok(true)` once `selector` is present, `Ok(false)` if `timeout` elapsed first
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    /// Serialized DOM of the current page
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Release the page. Calling it again is a no-op
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens a fresh page for every URL processed
#[async_trait]
pub trait DriverFactory: Send + Sync + 'static {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}
