// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-server test harness.
//!
//! Integration tests against a real XO appliance call [`XoTestEnv::from_env`]
//! and return early when it yields `None`.

use std::env;

use crate::client::XoClient;
use crate::config::ClientConfig;
use crate::error::Result;

/// Gate variable; live tests are skipped unless it is set.
pub const ENV_DEV_TESTS: &str = "XO_DEV_TESTS";
/// Pool the live tests may create objects in.
pub const ENV_TEST_POOL: &str = "XO_TEST_POOL";
/// Template used by VM-creating live tests.
pub const ENV_TEST_TEMPLATE: &str = "XO_TEST_TEMPLATE";

pub struct XoTestEnv {
    pub config: ClientConfig,
    pub pool_id: Option<String>,
    pub template_id: Option<String>,
}

impl XoTestEnv {
    /// Read the live-test environment.
    ///
    /// Returns `None` when `XO_DEV_TESTS` is unset or the `XOA_*` variables do
    /// not form a valid configuration.
    pub fn from_env() -> Option<Self> {
        if env::var(ENV_DEV_TESTS).is_err() {
            println!("Skipping live test: {ENV_DEV_TESTS} not set");
            return None;
        }
        let config = match ClientConfig::from_env() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{ENV_DEV_TESTS} is set but the XOA_* configuration is invalid: {e}");
                return None;
            }
        };
        Some(Self {
            config,
            pool_id: env::var(ENV_TEST_POOL).ok().filter(|s| !s.is_empty()),
            template_id: env::var(ENV_TEST_TEMPLATE).ok().filter(|s| !s.is_empty()),
        })
    }

    pub async fn connect(&self) -> Result<XoClient> {
        XoClient::connect(self.config.clone()).await
    }

    /// Unique name for objects created by a test, e.g. `xo-api-rs-vm-1a2b3c4d`.
    #[must_use]
    pub fn unique_name(prefix: &str) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("xo-api-rs-{prefix}-{}", &suffix[..8])
    }
}
