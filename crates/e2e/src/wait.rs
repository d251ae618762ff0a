//! Explicit waits
//!
//! Every wait takes its own [`WaitConfig`]; there is no shared implicit
//! timeout. A wait moves `Idle -> Polling -> {Satisfied, TimedOut}` and
//! never retries past its deadline.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::webdriver::{BrowserDriver, ElementRef};

/// Lower bound on the poll interval so a zero config cannot busy-spin
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timeout and poll interval for one wait call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Maximum time to keep polling
    pub timeout: Duration,

    /// Delay between evaluations
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self { timeout, poll_interval }
    }

    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(timeout_ms), Duration::from_millis(poll_interval_ms))
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

/// Lifecycle of a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPhase {
    Idle,
    Polling,
    Satisfied,
    TimedOut,
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T = ()> {
    /// The condition held before the deadline
    Satisfied {
        value: T,
        elapsed: Duration,
        polls: u32,
    },

    /// The deadline passed with the condition still false
    TimedOut {
        elapsed: Duration,
        polls: u32,
        timeout: Duration,
    },
}

impl<T> WaitOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }

    pub fn phase(&self) -> WaitPhase {
        match self {
            WaitOutcome::Satisfied { .. } => WaitPhase::Satisfied,
            WaitOutcome::TimedOut { .. } => WaitPhase::TimedOut,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Satisfied { elapsed, .. } | WaitOutcome::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    pub fn polls(&self) -> u32 {
        match self {
            WaitOutcome::Satisfied { polls, .. } | WaitOutcome::TimedOut { polls, .. } => *polls,
        }
    }

    /// Turn a timeout into [`E2eError::Timeout`] naming what was awaited
    pub fn into_result(self, what: impl Into<String>) -> E2eResult<T> {
        match self {
            WaitOutcome::Satisfied { value, .. } => Ok(value),
            WaitOutcome::TimedOut { timeout, .. } => Err(E2eError::Timeout {
                what: what.into(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Poll `probe` until it yields `Some(value)` or the timeout elapses.
///
/// The probe runs once immediately, then once per poll interval. The final
/// sleep is clamped to the deadline so the last evaluation lands on it.
/// Success returns at once, unless the probe itself ran past the deadline.
/// A probe error aborts the wait.
pub async fn poll_until<T, F, Fut>(config: &WaitConfig, mut probe: F) -> E2eResult<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let start = Instant::now();
    let deadline = start + config.timeout;
    let interval = config.effective_poll_interval();
    let mut polls = 0u32;

    trace!(phase = ?WaitPhase::Idle, timeout_ms = config.timeout.as_millis() as u64, "wait starting");

    loop {
        polls += 1;
        trace!(phase = ?WaitPhase::Polling, poll = polls, "evaluating condition");

        let result = probe().await?;
        let now = Instant::now();

        // A result that only arrives after the deadline does not count
        if let Some(value) = result.filter(|_| now <= deadline) {
            let elapsed = now.duration_since(start);
            debug!(phase = ?WaitPhase::Satisfied, polls, elapsed_ms = elapsed.as_millis() as u64, "condition satisfied");
            return Ok(WaitOutcome::Satisfied { value, elapsed, polls });
        }

        if now >= deadline {
            let elapsed = now.duration_since(start);
            debug!(phase = ?WaitPhase::TimedOut, polls, elapsed_ms = elapsed.as_millis() as u64, "condition not met before deadline");
            return Ok(WaitOutcome::TimedOut {
                elapsed,
                polls,
                timeout: config.timeout,
            });
        }

        sleep(interval.min(deadline - now)).await;
    }
}

/// Poll a boolean condition
pub async fn wait_until<F, Fut>(config: &WaitConfig, mut condition: F) -> E2eResult<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    poll_until(config, move || {
        let check = condition();
        async move { Ok(check.await?.then_some(())) }
    })
    .await
}

/// Poll `read` until its value differs from `baseline`, yielding the new value.
///
/// The baseline must be read by the caller before the triggering action.
/// If nothing changes the wait times out, even when the baseline already
/// equals the value the caller expects to see.
pub async fn wait_for_change<T, F, Fut>(
    config: &WaitConfig,
    baseline: &T,
    mut read: F,
) -> E2eResult<WaitOutcome<T>>
where
    T: PartialEq + Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<T>>,
{
    poll_until(config, move || {
        let current = read();
        async move {
            let current = current.await?;
            trace!(?baseline, ?current, "comparing against baseline");
            Ok((current != *baseline).then_some(current))
        }
    })
    .await
}

/// Probe: the element exists in the DOM
pub async fn element_present(driver: &dyn BrowserDriver, locator: &Locator) -> E2eResult<Option<ElementRef>> {
    driver.find_element(locator).await
}

/// Probe: the element exists, is displayed and has a non-zero rendered size
pub async fn element_visible(driver: &dyn BrowserDriver, locator: &Locator) -> E2eResult<Option<ElementRef>> {
    let Some(element) = driver.find_element(locator).await? else {
        return Ok(None);
    };

    match is_rendered(driver, &element).await {
        Ok(true) => Ok(Some(element)),
        Ok(false) => Ok(None),
        Err(e) if e.is_stale_element() || e.is_no_such_element() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Probe: the element is visible and enabled
pub async fn element_clickable(driver: &dyn BrowserDriver, locator: &Locator) -> E2eResult<Option<ElementRef>> {
    let Some(element) = element_visible(driver, locator).await? else {
        return Ok(None);
    };

    match driver.is_enabled(&element).await {
        Ok(true) => Ok(Some(element)),
        Ok(false) => Ok(None),
        Err(e) if e.is_stale_element() => Ok(None),
        Err(e) => Err(e),
    }
}

async fn is_rendered(driver: &dyn BrowserDriver, element: &ElementRef) -> E2eResult<bool> {
    if !driver.is_displayed(element).await? {
        return Ok(false);
    }
    Ok(driver.rect(element).await?.has_area())
}

/// Wait until the element exists
pub async fn wait_for_present(
    driver: &dyn BrowserDriver,
    locator: &Locator,
    config: &WaitConfig,
) -> E2eResult<ElementRef> {
    poll_until(config, move || element_present(driver, locator))
        .await?
        .into_result(format!("presence of {}", locator))
}

/// Wait until the element is visible
pub async fn wait_for_visible(
    driver: &dyn BrowserDriver,
    locator: &Locator,
    config: &WaitConfig,
) -> E2eResult<ElementRef> {
    poll_until(config, move || element_visible(driver, locator))
        .await?
        .into_result(format!("visibility of {}", locator))
}

/// Wait until the element can be clicked
pub async fn wait_for_clickable(
    driver: &dyn BrowserDriver,
    locator: &Locator,
    config: &WaitConfig,
) -> E2eResult<ElementRef> {
    poll_until(config, move || element_clickable(driver, locator))
        .await?
        .into_result(format!("{} to be clickable", locator))
}
