use crate::config::ReadinessConfig;
use crate::driver::PageDriver;
use std::time::Duration;

/// Waits for the first of `selectors` to show up, each given `per_selector_timeout`.
///
/// Returns `true` on the first hit and `false` when every candidate timed out
/// or failed. Either way the page then gets `settle_delay` for late responses
/// to land. Failure is not an error: the caller carries on in degraded mode.
pub async fn wait_for_ready(
    driver: &mut dyn PageDriver,
    selectors: &[String],
    per_selector_timeout: Duration,
    settle_delay: Duration,
) -> bool {
    ::log::info!("Waiting for initial page load...");

    let mut ready = false;
    for selector in selectors {
        match driver.wait_for_selector(selector, per_selector_timeout).await {
            Ok(true) => {
                ::log::info!("Page ready, found selector: {}", selector);
                ready = true;
                break;
            }
            Ok(false) => {
                ::log::debug!(
                    "Selector {} not found within {:?}",
                    selector,
                    per_selector_timeout
                );
            }
            Err(e) => {
                ::log::debug!("Waiting for selector {} failed: {}", selector, e);
            }
        }
    }

    if !ready {
        ::log::warn!("None of the expected page elements appeared, continuing anyway");
    }

    if !settle_delay.is_zero() {
        tokio::time::sleep(settle_delay).await;
    }
    ready
}

/// [`wait_for_ready`] driven by a [`ReadinessConfig`]
pub async fn wait_for_ready_with(driver: &mut dyn PageDriver, config: &ReadinessConfig) -> bool {
    wait_for_ready(
        driver,
        &config.selectors,
        config.per_selector_timeout(),
        config.settle_delay(),
    )
    .await
}
