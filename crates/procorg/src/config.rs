//! Registry configuration.
//!
//! Sources, lowest priority first:
//! 1. Default values
//! 2. A TOML file passed to [`RegistryConfig::load`]
//! 3. Environment variables (`PROCORG_*`)
//!
//! ```toml
//! # Escalate to a forcible kill when a child ignores SIGTERM for 2s
//! termination_grace_ms = 2000
//! kill_on_drop = true
//! ```

use crate::error::RegistryError;
use crate::result::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`RegistryConfig::termination_grace_ms`].
pub const ENV_TERMINATION_GRACE_MS: &str = "PROCORG_TERMINATION_GRACE_MS";

/// Environment variable overriding [`RegistryConfig::kill_on_drop`].
pub const ENV_KILL_ON_DROP: &str = "PROCORG_KILL_ON_DROP";

/// Settings governing how the registry terminates its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How long `destroy` waits after SIGTERM before forcing a kill.
    ///
    /// `None` waits indefinitely, so a child ignoring SIGTERM blocks `destroy`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_grace_ms: Option<u64>,

    /// Kill children still tracked when the registry is dropped.
    pub kill_on_drop: bool,
}

impl RegistryConfig {
    /// Load configuration with the full priority chain.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RegistryError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `PROCORG_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_TERMINATION_GRACE_MS) {
            let raw = raw.trim();
            self.termination_grace_ms = if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(raw.parse().map_err(|e| {
                    RegistryError::config(format!(
                        "Invalid {}={}: {}",
                        ENV_TERMINATION_GRACE_MS, raw, e
                    ))
                })?)
            };
        }

        if let Some(raw) = lookup(ENV_KILL_ON_DROP) {
            self.kill_on_drop = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(RegistryError::config(format!(
                        "Invalid {}={}: expected a boolean",
                        ENV_KILL_ON_DROP, other
                    )));
                }
            };
        }

        Ok(())
    }

    /// Set the grace period before a forcible kill.
    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace_ms = Some(grace.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Set whether remaining children are killed on drop.
    pub fn with_kill_on_drop(mut self, kill_on_drop: bool) -> Self {
        self.kill_on_drop = kill_on_drop;
        self
    }

    /// Grace period as a `Duration`.
    pub fn termination_grace(&self) -> Option<Duration> {
        self.termination_grace_ms.map(Duration::from_millis)
    }
}
