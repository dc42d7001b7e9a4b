//! Drives an infinite-scroll product grid until it stops growing.

use crate::config::ScrollConfig;
use crate::driver::PageDriver;
use crate::error::DriverError;
use crate::parsers::listing::link_count_expression;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

const SCROLL_TO_BOTTOM_SCRIPT: &str = r#"
    window.scrollTo({ top: document.body.scrollHeight, behavior: 'smooth' });
    return null;
"#;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cheap summary of the rendered page used to detect new content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFingerprint {
    pub scroll_height: u64,
    pub link_count: usize,
}

/// Per-page loop state; lives only for one [`scroll_until_stable`] call
#[derive(Debug, Clone)]
pub struct ScrollState {
    pub iterations_done: usize,
    pub consecutive_no_change: usize,
    pub last_fingerprint: PageFingerprint,
}

impl ScrollState {
    pub fn new(initial: PageFingerprint) -> Self {
        Self {
            iterations_done: 0,
            consecutive_no_change: 0,
            last_fingerprint: initial,
        }
    }

    /// Record the fingerprint at the end of an iteration. Returns whether it changed
    pub fn record(&mut self, after: PageFingerprint) -> bool {
        self.iterations_done += 1;
        let changed = after != self.last_fingerprint;
        if changed {
            self.consecutive_no_change = 0;
        } else {
            self.consecutive_no_change += 1;
        }
        self.last_fingerprint = after;
        changed
    }

    /// An iteration whose page interaction failed counts as "no change"
    pub fn record_failure(&mut self) {
        self.iterations_done += 1;
        self.consecutive_no_change += 1;
    }

    pub fn converged(&self, no_change_threshold: usize) -> bool {
        self.consecutive_no_change >= no_change_threshold
    }
}

/// Timing and limits for [`scroll_until_stable`]
#[derive(Debug, Clone)]
pub struct ScrollOptions {
    pub max_iterations: usize,
    pub no_change_threshold: usize,
    /// Pause right after each scroll command
    pub per_iteration_delay: Duration,
    pub poll_interval: Duration,
    pub max_wait_per_iteration: Duration,
    pub bottom_tolerance_px: u32,
    /// Poll time that must pass before "at the bottom" ends the poll
    pub bottom_min_wait: Duration,
    pub count_selectors: Vec<String>,
}

impl From<&ScrollConfig> for ScrollOptions {
    fn from(config: &ScrollConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            no_change_threshold: config.no_change_threshold,
            per_iteration_delay: Duration::from_millis(config.scroll_settle_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_wait_per_iteration: Duration::from_millis(config.max_wait_per_iteration_ms),
            bottom_tolerance_px: config.bottom_tolerance_px,
            bottom_min_wait: Duration::from_millis(config.bottom_min_wait_ms),
            count_selectors: config.count_selectors.clone(),
        }
    }
}

/// Script returning `{ scrollHeight, linkCount }` for the current page
pub fn fingerprint_script(count_selectors: &[String]) -> String {
    format!(
        "return {{ scrollHeight: document.body.scrollHeight, linkCount: {} }};",
        link_count_expression(count_selectors)
    )
}

fn at_bottom_script(tolerance_px: u32) -> String {
    format!(
        "return window.innerHeight + window.scrollY >= document.body.scrollHeight - {};",
        tolerance_px
    )
}

async fn sample(driver: &mut dyn PageDriver, script: &str) -> Result<PageFingerprint, DriverError> {
    let value = driver.evaluate_script(script).await?;
    serde_json::from_value(value)
        .map_err(|e| DriverError::Script(format!("unexpected fingerprint: {}", e)))
}

async fn is_at_bottom(driver: &mut dyn PageDriver, tolerance_px: u32) -> Result<bool, DriverError> {
    let value = driver.evaluate_script(&at_bottom_script(tolerance_px)).await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// Scrolls to the bottom repeatedly until the fingerprint stops changing for
/// `no_change_threshold` iterations in a row or `max_iterations` is reached.
///
/// Returns the last observed link count. It is diagnostic only; links are
/// extracted from the final page content afterwards.
pub async fn scroll_until_stable(driver: &mut dyn PageDriver, options: &ScrollOptions) -> usize {
    scroll_until_stable_by(driver, options, None).await
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// [`scroll_until_stable`] that also stops, like convergence, once `deadline`
/// has passed. The deadline is checked before every iteration and every poll
/// step, and no wait inside the loop runs past it.
pub async fn scroll_until_stable_by(
    driver: &mut dyn PageDriver,
    options: &ScrollOptions,
    deadline: Option<Instant>,
) -> usize {
    ::log::info!("Scrolling to load more content...");

    let script = fingerprint_script(&options.count_selectors);
    let initial = match sample(driver, &script).await {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            ::log::warn!("Could not take initial page fingerprint: {}", e);
            PageFingerprint::default()
        }
    };
    let mut state = ScrollState::new(initial);

    while state.iterations_done < options.max_iterations {
        if deadline_passed(deadline) {
            ::log::warn!("Page deadline reached, stopping scroll");
            break;
        }

        let iteration = state.iterations_done + 1;
        let before = state.last_fingerprint;
        ::log::info!(
            "Before scroll {}: height={}, links={}",
            iteration,
            before.scroll_height,
            before.link_count
        );

        match run_iteration(driver, options, &script, before, deadline).await {
            Ok(after) => {
                if !state.record(after) {
                    ::log::info!(
                        "Scroll {} loaded nothing new ({} in a row)",
                        iteration,
                        state.consecutive_no_change
                    );
                }
            }
            Err(e) => {
                ::log::warn!("Scroll {} failed: {}", iteration, e);
                state.record_failure();
            }
        }

        if state.converged(options.no_change_threshold) {
            ::log::info!("No new content for several scrolls, stopping");
            break;
        }
    }

    ::log::info!(
        "Scrolling finished after {} iterations, final link count: {}",
        state.iterations_done,
        state.last_fingerprint.link_count
    );
    state.last_fingerprint.link_count
}

async fn run_iteration(
    driver: &mut dyn PageDriver,
    options: &ScrollOptions,
    script: &str,
    before: PageFingerprint,
    deadline: Option<Instant>,
) -> Result<PageFingerprint, DriverError> {
    // Never sleep past the page deadline
    let capped = |wait: Duration| match deadline {
        Some(deadline) => wait.min(deadline.saturating_duration_since(Instant::now())),
        None => wait,
    };

    driver.evaluate_script(SCROLL_TO_BOTTOM_SCRIPT).await?;
    let settle = capped(options.per_iteration_delay);
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    let step = options.poll_interval.max(MIN_POLL_INTERVAL);
    let mut waited = Duration::ZERO;
    while waited < options.max_wait_per_iteration {
        if deadline_passed(deadline) {
            ::log::debug!("Page deadline reached while waiting for new content");
            break;
        }
        tokio::time::sleep(capped(step)).await;
        waited += step;

        let current = sample(driver, script).await?;
        if current != before {
            ::log::info!(
                "New content: height {}→{}, links {}→{}",
                before.scroll_height,
                current.scroll_height,
                before.link_count,
                current.link_count
            );
            break;
        }

        if waited > options.bottom_min_wait && is_at_bottom(driver, options.bottom_tolerance_px).await? {
            ::log::info!("Reached the bottom of the page");
            break;
        }
    }

    sample(driver, script).await
}
