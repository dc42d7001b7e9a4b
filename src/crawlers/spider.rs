use crate::driver::PageDriver;
use crate::error::DriverError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

/// Longest a page close may take before the session is abandoned
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// A crawl pass that turns one URL into one output record
#[async_trait]
pub trait Spider: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Process `url` on a freshly opened page.
    ///
    /// Implementations must close `driver` exactly once before returning,
    /// whatever happened, and report failures inside the output.
    async fn process(&self, driver: &mut dyn PageDriver, url: &str) -> Self::Output;

    /// Output for a URL whose page could not even be opened
    fn session_failed(&self, url: &str, error: &DriverError) -> Self::Output;
}

/// Close `driver` within [`CLOSE_TIMEOUT`], logging instead of failing
pub async fn close_page(driver: &mut dyn PageDriver, url: &str) {
    let closed = match timeout(CLOSE_TIMEOUT, driver.close()).await {
        Ok(closed) => closed,
        Err(_) => Err(DriverError::Timeout {
            operation: "closing the session",
            timeout: CLOSE_TIMEOUT,
        }),
    };
    match closed {
        Ok(()) => ::log::debug!("Page closed: {}", url),
        Err(e) => ::log::warn!("Failed to close page {}: {}", url, e),
    }
}
