// SPDX-License-Identifier: MIT OR Apache-2.0

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, XoError};

/// Per-call deadline and cancellation.
///
/// ```
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use xo_api_rs::CallOptions;
///
/// let token = CancellationToken::new();
/// let opts = CallOptions::new()
///     .with_timeout(Duration::from_secs(10))
///     .with_cancel(token.clone());
/// assert_eq!(opts.timeout, Some(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overall deadline of the operation, retries included.
    pub timeout: Option<Duration>,
    /// Cancels the operation when triggered.
    pub cancel: Option<CancellationToken>,
    /// Send the request once, bypassing the client's retry mode.
    pub single_attempt: bool,
}

impl CallOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_single_attempt(mut self) -> Self {
        self.single_attempt = true;
        self
    }

    /// Whether the cancellation token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Deadline to apply: the caller's, capped by `ceiling` when given.
    pub(crate) fn effective_timeout(&self, ceiling: Option<Duration>) -> Option<Duration> {
        match (self.timeout, ceiling) {
            (Some(t), Some(c)) => Some(t.min(c)),
            (t, c) => t.or(c),
        }
    }

    /// Drive `fut` under this call's deadline and cancellation.
    ///
    /// `ceiling` caps the caller's deadline and applies when the caller gave
    /// none. Dropping `fut` on either exit releases whatever it holds.
    pub(crate) async fn run<T, F>(&self, ceiling: Option<Duration>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self.effective_timeout(ceiling);
        let bounded = async {
            match deadline {
                Some(d) => match tokio::time::timeout(d, fut).await {
                    Ok(r) => r,
                    Err(_) => Err(XoError::Timeout(d)),
                },
                None => fut.await,
            }
        };

        match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(XoError::Cancelled),
                    r = bounded => r,
                }
            }
            None => bounded.await,
        }
    }
}
