//! Settings for locker resolution and the HTTP clients behind it.

use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::utils;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Full pipeline runs per locker link, first fetch included.
    pub max_attempts: u32,
    /// Locker links resolved at the same time within one batch.
    pub max_in_flight: usize,
    /// Pause between two attempts on the same link.
    pub retry_delay_ms: u64,
    /// Deadline for one link inside a batch, retries included.
    pub resolve_timeout_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Resolve host names with hickory instead of the platform resolver.
    pub dns_over_https: bool,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_in_flight: 4,
            retry_delay_ms: 250,
            resolve_timeout_ms: 60_000,
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            dns_over_https: true,
            user_agent: utils::get_user_agent().to_owned(),
        }
    }
}

impl ResolverConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse resolver config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.max_in_flight == 0 {
            bail!("max_in_flight must be at least 1");
        }
        if self.resolve_timeout_ms == 0 {
            bail!("resolve_timeout_ms must be at least 1");
        }
        if self.user_agent.trim().is_empty() {
            bail!("user_agent must not be empty");
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
