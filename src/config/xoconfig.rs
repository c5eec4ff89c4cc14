// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file and environment loading
//!
//! A configuration file is YAML (typically `~/.xo/config.yaml`):
//!
//! ```yaml
//! url: https://xo.example.com
//! token: 3bcf...e1
//! insecure: false
//! retry_mode: backoff
//! retry_max_time: 2m
//! ```
//!
//! Environment variables take precedence over file values when loaded with
//! [`ClientConfig::load_with_env`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ClientConfig, RetryMode};
use crate::error::{Result, XoError};

pub const ENV_URL: &str = "XOA_URL";
pub const ENV_TOKEN: &str = "XOA_TOKEN";
pub const ENV_USER: &str = "XOA_USER";
pub const ENV_PASSWORD: &str = "XOA_PASSWORD";
pub const ENV_INSECURE: &str = "XOA_INSECURE";
pub const ENV_RETRY_MODE: &str = "XOA_RETRY_MODE";
pub const ENV_RETRY_MAX_TIME: &str = "XOA_RETRY_MAX_TIME";
pub const ENV_CALL_TIMEOUT: &str = "XOA_CALL_TIMEOUT";
pub const ENV_DEVELOPMENT: &str = "XOA_DEVELOPMENT";
/// Path of the configuration file, overriding the default location.
pub const ENV_CONFIG: &str = "XOA_CONFIG";

/// On-disk (or environment) shape of a client configuration.
///
/// Every field is optional so that sources can be layered; validation
/// happens once, when converting into a [`ClientConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct XoConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_mode: Option<RetryMode>,

    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_max_time: Option<Duration>,

    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development: Option<bool>,
}

impl XoConfigFile {
    /// Parse configuration from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| XoError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file is malformed YAML
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            XoError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Read the `XOA_*` variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean, retry mode or duration is malformed.
    #[allow(clippy::result_large_err)]
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            url: get(ENV_URL),
            token: get(ENV_TOKEN),
            user: get(ENV_USER),
            password: get(ENV_PASSWORD),
            insecure: get(ENV_INSECURE)
                .map(|v| parse_bool(ENV_INSECURE, &v))
                .transpose()?,
            retry_mode: get(ENV_RETRY_MODE).map(|v| v.parse()).transpose()?,
            retry_max_time: get(ENV_RETRY_MAX_TIME)
                .map(|v| parse_duration(ENV_RETRY_MAX_TIME, &v))
                .transpose()?,
            call_timeout: get(ENV_CALL_TIMEOUT)
                .map(|v| parse_duration(ENV_CALL_TIMEOUT, &v))
                .transpose()?,
            development: get(ENV_DEVELOPMENT)
                .map(|v| parse_bool(ENV_DEVELOPMENT, &v))
                .transpose()?,
        })
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: XoConfigFile) -> Self {
        // Credentials are replaced as a unit so a token in one layer and a
        // password in another never combine into an ambiguous config.
        let other_has_creds = other.token.is_some() || other.user.is_some();
        let (token, user, password) = if other_has_creds {
            (other.token, other.user, other.password)
        } else {
            (self.token, self.user, self.password)
        };

        Self {
            url: other.url.or(self.url),
            token,
            user,
            password,
            insecure: other.insecure.or(self.insecure),
            retry_mode: other.retry_mode.or(self.retry_mode),
            retry_max_time: other.retry_max_time.or(self.retry_max_time),
            call_timeout: other.call_timeout.or(self.call_timeout),
            development: other.development.or(self.development),
        }
    }

    /// Validate into an immutable [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns `XoError::Config` when the URL is missing or the result fails
    /// builder validation.
    #[allow(clippy::result_large_err)]
    pub fn into_config(self) -> Result<ClientConfig> {
        let url = self
            .url
            .ok_or_else(|| XoError::Config(format!("{ENV_URL} is required")))?;

        let mut builder = ClientConfig::builder(url)
            .insecure(self.insecure.unwrap_or(false))
            .retry_mode(self.retry_mode.unwrap_or_default())
            .development(self.development.unwrap_or(false));

        if let Some(token) = self.token {
            builder = builder.token(token);
        }
        if self.user.is_some() || self.password.is_some() {
            builder = builder.user_password(
                self.user.unwrap_or_default(),
                self.password.unwrap_or_default(),
            );
        }
        if let Some(max_time) = self.retry_max_time {
            builder = builder.retry_max_time(max_time);
        }
        if let Some(timeout) = self.call_timeout {
            builder = builder.call_timeout(timeout);
        }

        builder.build()
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `XoError::Config` before any network I/O if a variable is
    /// missing or malformed.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Load configuration through a custom variable lookup.
    #[allow(clippy::result_large_err)]
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        XoConfigFile::from_env_with(lookup)?.into_config()
    }

    /// Load configuration from a YAML file.
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        XoConfigFile::load_from_path(path)?.into_config()
    }

    /// Parse configuration from a YAML string.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        XoConfigFile::from_yaml(yaml)?.into_config()
    }

    /// Load configuration from the default location (~/.xo/config.yaml)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The home directory cannot be determined
    /// - The config file cannot be read
    /// - The config file is malformed
    #[allow(clippy::result_large_err)]
    pub fn load_default() -> Result<Self> {
        Self::load_from_path(Self::config_path()?)
    }

    /// Load the configuration file (if present) and apply environment overrides.
    #[allow(clippy::result_large_err)]
    pub fn load_with_env() -> Result<Self> {
        let path = Self::config_path()?;
        let file = if path.exists() {
            XoConfigFile::load_from_path(&path)?
        } else {
            XoConfigFile::default()
        };
        let env = XoConfigFile::from_env_with(|key| std::env::var(key).ok())?;
        file.merge(env).into_config()
    }

    /// Get the default config file path (~/.xo/config.yaml)
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined
    #[allow(clippy::result_large_err)]
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| XoError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".xo").join("config.yaml"))
    }

    /// Get the path to the config file, respecting the XOA_CONFIG environment variable
    #[allow(clippy::result_large_err)]
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var(ENV_CONFIG) {
            Ok(PathBuf::from(env_path))
        } else {
            Self::default_path()
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(XoError::Config(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| XoError::Config(format!("{key}: invalid duration '{value}': {e}")))
}
