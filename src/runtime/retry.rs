// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policies and backoff strategies for resilient API calls.
//!
//! This module provides configurable retry behavior for handling transient failures
//! in REST and JSON-RPC communication with an XO server.
//!
//! # Example
//!
//! ```
//! use xo_api_rs::runtime::{RetryConfig, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let retry = RetryConfig::builder()
//!     .max_retries(3)
//!     .backoff(ExponentialBackoff::new(Duration::from_millis(100)))
//!     .build();
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::config::RetryMode;
use crate::error::XoError;

/// Defines a backoff strategy for retry delays.
pub trait BackoffStrategy: Clone + Send + Sync + 'static {
    /// Calculate the delay before the next retry attempt.
    ///
    /// # Arguments
    /// * `attempt` - The current attempt number (0-indexed)
    fn delay(&self, attempt: u32) -> Duration;
}

// =============================================================================
// No Backoff
// =============================================================================

/// No delay between retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl NoBackoff {
    /// Create a new no-backoff strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackoffStrategy for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

// =============================================================================
// Linear Backoff
// =============================================================================

/// Linear backoff - delay increases linearly with each attempt.
///
/// Also drives the task poll schedule.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    initial_delay: Duration,
    increment: Duration,
    max_delay: Duration,
}

impl LinearBackoff {
    /// Create a new linear backoff strategy.
    #[must_use]
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            increment: initial_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Set the increment for each retry.
    #[must_use]
    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    /// Set the maximum delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay + self.increment.saturating_mul(attempt);
        delay.min(self.max_delay)
    }
}

// =============================================================================
// Exponential Backoff
// =============================================================================

/// Exponential backoff - delay doubles with each attempt.
///
/// Jitter spreads each delay uniformly over ±20% to avoid synchronized retries.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

/// Fraction of the delay used as jitter in each direction.
const JITTER_FRACTION: f64 = 0.2;

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy.
    #[must_use]
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Set the maximum delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the multiplier for exponential growth.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            // uniform in [-20%, +20%]
            let spread = (rand::random::<f64>() * 2.0 - 1.0) * JITTER_FRACTION;
            (capped_delay * (1.0 + spread)).min(self.max_delay.as_millis() as f64)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay.max(0.0) as u64)
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Determines whether an error should be retried.
pub trait RetryPolicy: Clone + Send + Sync + 'static {
    /// Returns `true` if the operation should be retried for this error.
    fn should_retry(&self, error: &XoError) -> bool;
}

/// Default retry policy - retries on transport failures, HTTP 5xx and HTTP 429.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, error: &XoError) -> bool {
        error.is_retryable()
    }
}

/// Never retry - fail immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&self, _error: &XoError) -> bool {
        false
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

/// Complete retry configuration combining policy and backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig<P: RetryPolicy = DefaultRetryPolicy, B: BackoffStrategy = ExponentialBackoff>
{
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Policy determining which errors to retry.
    pub policy: P,
    /// Backoff strategy for calculating delays.
    pub backoff: B,
    /// Maximum total time for all retries.
    pub total_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            policy: DefaultRetryPolicy,
            backoff: ExponentialBackoff::default(),
            total_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> RetryConfigBuilder<DefaultRetryPolicy, ExponentialBackoff> {
        RetryConfigBuilder::new()
    }

    /// Retry configuration for a client retry mode.
    ///
    /// `None` performs exactly one attempt. `Backoff` retries transient errors
    /// for as long as the total budget allows.
    #[must_use]
    pub fn from_mode(mode: RetryMode, max_time: Duration) -> Self {
        match mode {
            RetryMode::None => Self {
                max_retries: 0,
                policy: DefaultRetryPolicy,
                backoff: ExponentialBackoff::default(),
                total_timeout: None,
            },
            RetryMode::Backoff => Self {
                max_retries: u32::MAX,
                policy: DefaultRetryPolicy,
                backoff: ExponentialBackoff::default(),
                total_timeout: Some(max_time),
            },
        }
    }

    /// Disable retries.
    #[must_use]
    pub fn disabled() -> RetryConfig<NoRetryPolicy, NoBackoff> {
        RetryConfig {
            max_retries: 0,
            policy: NoRetryPolicy,
            backoff: NoBackoff,
            total_timeout: None,
        }
    }
}

/// Transport whose log target receives retry warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryChannel {
    #[default]
    Rest,
    Rpc,
}

fn log_retry(channel: RetryChannel, attempt: u32, delay: Duration, error: &XoError) {
    let delay_ms = delay.as_millis() as u64;
    match channel {
        RetryChannel::Rest => {
            warn!(target: "xo_api::rest", attempt, delay_ms, error = %error, "retrying after transient failure");
        }
        RetryChannel::Rpc => {
            warn!(target: "xo_api::rpc", attempt, delay_ms, error = %error, "retrying after transient failure");
        }
    }
}

impl<P: RetryPolicy, B: BackoffStrategy> RetryConfig<P, B> {
    /// Execute an async operation with retry logic, logging on the REST target.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, XoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, XoError>>,
    {
        self.execute_on(RetryChannel::Rest, operation).await
    }

    /// Execute an async operation with retry logic.
    ///
    /// Sleeps are clamped to the remaining total budget, so the time spent
    /// retrying never exceeds `total_timeout` plus the duration of the last
    /// attempt. Retry warnings go to the target of `channel`.
    pub async fn execute_on<T, F, Fut>(
        &self,
        channel: RetryChannel,
        mut operation: F,
    ) -> Result<T, XoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, XoError>>,
    {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !self.policy.should_retry(&e) {
                        return Err(e);
                    }

                    if attempt >= self.max_retries {
                        return Err(e);
                    }

                    let mut delay = self.backoff.delay(attempt);
                    if let Some(timeout) = self.total_timeout {
                        let elapsed = start.elapsed();
                        if elapsed >= timeout {
                            return Err(e);
                        }
                        delay = delay.min(timeout - elapsed);
                    }

                    log_retry(channel, attempt + 1, delay, &e);
                    tokio::time::sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }
}

/// Builder for `RetryConfig`.
#[derive(Debug, Clone)]
pub struct RetryConfigBuilder<P: RetryPolicy, B: BackoffStrategy> {
    max_retries: u32,
    policy: P,
    backoff: B,
    total_timeout: Option<Duration>,
}

impl RetryConfigBuilder<DefaultRetryPolicy, ExponentialBackoff> {
    /// Create a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            policy: DefaultRetryPolicy,
            backoff: ExponentialBackoff::default(),
            total_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Default for RetryConfigBuilder<DefaultRetryPolicy, ExponentialBackoff> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RetryPolicy, B: BackoffStrategy> RetryConfigBuilder<P, B> {
    /// Set maximum retry attempts.
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn policy<P2: RetryPolicy>(self, policy: P2) -> RetryConfigBuilder<P2, B> {
        RetryConfigBuilder {
            max_retries: self.max_retries,
            policy,
            backoff: self.backoff,
            total_timeout: self.total_timeout,
        }
    }

    /// Set the backoff strategy.
    #[must_use]
    pub fn backoff<B2: BackoffStrategy>(self, backoff: B2) -> RetryConfigBuilder<P, B2> {
        RetryConfigBuilder {
            max_retries: self.max_retries,
            policy: self.policy,
            backoff,
            total_timeout: self.total_timeout,
        }
    }

    /// Set the total timeout for all retries.
    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    /// Disable total timeout.
    #[must_use]
    pub fn no_total_timeout(mut self) -> Self {
        self.total_timeout = None;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> RetryConfig<P, B> {
        RetryConfig {
            max_retries: self.max_retries,
            policy: self.policy,
            backoff: self.backoff,
            total_timeout: self.total_timeout,
        }
    }
}
