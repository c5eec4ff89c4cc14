// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime utilities for resilience and observability.
//!
//! Retry policies and backoff schedules shared by the REST and JSON-RPC
//! transports, plus request logging with credential redaction.

mod logging;
mod retry;

pub use logging::{LogLevel, LoggingConfig, RequestLogger, RequestMetrics, RequestSpan};
pub use retry::{
    BackoffStrategy, DefaultRetryPolicy, ExponentialBackoff, LinearBackoff, NoBackoff,
    NoRetryPolicy, RetryChannel, RetryConfig, RetryConfigBuilder, RetryPolicy,
};
