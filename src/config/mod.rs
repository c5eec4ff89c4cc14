// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration management for XO clients
//!
//! A [`ClientConfig`] is an immutable value describing where the XO server
//! lives, how to authenticate, how to treat TLS and how hard to retry. It is
//! built through [`ClientConfigBuilder`], loaded from the environment, or
//! loaded from a YAML file.
//!
//! # Environment Variables
//!
//! The following environment variables are supported:
//!
//! - `XOA_URL` - Server URL (`ws`, `wss`, `http` or `https`), required
//! - `XOA_TOKEN` - Authentication token
//! - `XOA_USER` / `XOA_PASSWORD` - Credentials, used when no token is set
//! - `XOA_INSECURE` - Skip certificate verification for the configured host
//! - `XOA_RETRY_MODE` - `none` or `backoff`
//! - `XOA_RETRY_MAX_TIME` - Total retry budget, e.g. `5m` or `30s`
//! - `XOA_CALL_TIMEOUT` - Default JSON-RPC call deadline
//! - `XOA_DEVELOPMENT` - Verbose request logging
//!
//! # Example
//!
//! ```no_run
//! use xo_api_rs::config::ClientConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! println!("REST base: {}", config.rest_base());
//! # Ok(())
//! # }
//! ```

mod xoconfig;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, XoError};
use crate::runtime::LoggingConfig;

pub use xoconfig::{
    XoConfigFile, ENV_CALL_TIMEOUT, ENV_DEVELOPMENT, ENV_INSECURE, ENV_PASSWORD, ENV_RETRY_MAX_TIME,
    ENV_RETRY_MODE, ENV_TOKEN, ENV_URL, ENV_USER,
};

/// Default budget for retries under [`RetryMode::Backoff`].
pub const DEFAULT_RETRY_MAX_TIME: Duration = Duration::from_secs(5 * 60);
/// Default deadline of a single JSON-RPC call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default deadline of a REST request when the caller gives none.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the client authenticates against the server.
///
/// Holding exactly one variant makes "token xor user+password" structural.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Password { user: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"[REDACTED]").finish(),
            Credentials::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Retry behaviour applied to REST and JSON-RPC calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Return the first error verbatim.
    #[default]
    None,
    /// Retry transient failures with exponential backoff.
    Backoff,
}

impl FromStr for RetryMode {
    type Err = XoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(RetryMode::None),
            "backoff" => Ok(RetryMode::Backoff),
            other => Err(XoError::Config(format!(
                "Unknown retry mode '{other}' (expected 'none' or 'backoff')"
            ))),
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::None => write!(f, "none"),
            RetryMode::Backoff => write!(f, "backoff"),
        }
    }
}

/// Immutable client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    url: Url,
    credentials: Credentials,
    insecure: bool,
    retry_mode: RetryMode,
    retry_max_time: Duration,
    call_timeout: Duration,
    request_timeout: Duration,
    development: bool,
    logging: LoggingConfig,
}

impl ClientConfig {
    /// Create a configuration builder for a server URL.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(url)
    }

    /// Server URL as configured.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Skip certificate verification for the configured host.
    pub fn insecure(&self) -> bool {
        self.insecure
    }

    pub fn retry_mode(&self) -> RetryMode {
        self.retry_mode
    }

    pub fn retry_max_time(&self) -> Duration {
        self.retry_max_time
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn development(&self) -> bool {
        self.development
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    /// Host name the TLS policy is scoped to.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// `true` when the server is reached over TLS.
    pub fn is_tls(&self) -> bool {
        matches!(self.url.scheme(), "https" | "wss")
    }

    /// Base URL of the REST API, e.g. `https://xo.local/rest/v0`.
    pub fn rest_base(&self) -> Url {
        let scheme = if self.is_tls() { "https" } else { "http" };
        self.with_scheme_and_path(scheme, "/rest/v0")
    }

    /// URL of the JSON-RPC WebSocket endpoint, e.g. `wss://xo.local/api/`.
    pub fn rpc_url(&self) -> Url {
        let scheme = if self.is_tls() { "wss" } else { "ws" };
        self.with_scheme_and_path(scheme, "/api/")
    }

    fn with_scheme_and_path(&self, scheme: &str, path: &str) -> Url {
        let mut base = format!("{scheme}://{}", self.host());
        if let Some(port) = self.url.port() {
            base.push_str(&format!(":{port}"));
        }
        let prefix = self.url.path().trim_end_matches('/');
        base.push_str(prefix);
        base.push_str(path);
        // Built from a URL that already parsed; only the scheme and path changed.
        Url::parse(&base).unwrap_or_else(|_| self.url.clone())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    url: String,
    token: Option<String>,
    user: Option<String>,
    password: Option<String>,
    insecure: bool,
    retry_mode: RetryMode,
    retry_max_time: Duration,
    call_timeout: Duration,
    request_timeout: Duration,
    development: bool,
    logging: Option<LoggingConfig>,
}

impl ClientConfigBuilder {
    /// Create a new builder with defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            user: None,
            password: None,
            insecure: false,
            retry_mode: RetryMode::None,
            retry_max_time: DEFAULT_RETRY_MAX_TIME,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            development: false,
            logging: None,
        }
    }

    /// Authenticate with a token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Authenticate with a user name and password.
    #[must_use]
    pub fn user_password(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    #[must_use]
    pub fn retry_mode(mut self, mode: RetryMode) -> Self {
        self.retry_mode = mode;
        self
    }

    #[must_use]
    pub fn retry_max_time(mut self, max_time: Duration) -> Self {
        self.retry_max_time = max_time;
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable verbose request logging.
    #[must_use]
    pub fn development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Override the request logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `XoError::Config` if:
    /// - The URL does not parse, has no host, or uses an unsupported scheme
    /// - Both or neither of token and user/password are set
    /// - A timeout is zero
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<ClientConfig> {
        let url = Url::parse(self.url.trim())?;
        if !matches!(url.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(XoError::Config(format!(
                "Unsupported URL scheme '{}' (expected ws, wss, http or https)",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(XoError::Config("No host in server URL".to_string()));
        }

        let token = self.token.filter(|t| !t.is_empty());
        let user = self.user.filter(|u| !u.is_empty());
        let password = self.password.filter(|p| !p.is_empty());

        let credentials = match (token, user, password) {
            (Some(token), None, None) => Credentials::Token(token),
            (None, Some(user), Some(password)) => Credentials::Password { user, password },
            (Some(_), _, _) => {
                return Err(XoError::Config(
                    "Token and user/password are mutually exclusive".to_string(),
                ))
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(XoError::Config(
                    "User and password must be set together".to_string(),
                ))
            }
            (None, None, None) => {
                return Err(XoError::Config(
                    "Either a token or a user and password is required".to_string(),
                ))
            }
        };

        if self.call_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(XoError::Config("Timeouts must be non-zero".to_string()));
        }

        let logging = self.logging.unwrap_or_else(|| {
            if self.development {
                LoggingConfig::verbose()
            } else {
                LoggingConfig::default()
            }
        });

        Ok(ClientConfig {
            url,
            credentials,
            insecure: self.insecure,
            retry_mode: self.retry_mode,
            retry_max_time: self.retry_max_time,
            call_timeout: self.call_timeout,
            request_timeout: self.request_timeout,
            development: self.development,
            logging,
        })
    }
}
