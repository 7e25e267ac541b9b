//! config.rs — Locator settings
//!
//! Loaded from the `[locator]` table of a TOML file and/or from the
//! environment:
//!
//! | key                 | env var                    | default |
//! |---------------------|----------------------------|---------|
//! | discard_interval_ms | `UWB_DISCARD_INTERVAL_MS`  | 5000    |
//! | calculation_level   | `UWB_CALCULATION_LEVEL`    | low     |
//! | update_level        | `UWB_UPDATE_LEVEL`         | none    |

use std::time::Duration;

use serde::Deserialize;
use uwb_types::{CalculationLevel, UpdateLevel};

use crate::error::ConfigError;

pub const DEFAULT_DISCARD_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Anchors not heard from for this long are dropped (ms)
    pub discard_interval_ms: u64,
    /// Combination policy for five or more anchors
    pub calculation_level: CalculationLevel,
    /// When `Receiver::update` recalculates
    pub update_level: UpdateLevel,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            discard_interval_ms: DEFAULT_DISCARD_INTERVAL_MS,
            calculation_level: CalculationLevel::default(),
            update_level: UpdateLevel::default(),
        }
    }
}

impl LocatorConfig {
    pub fn discard_interval(&self) -> Duration {
        Duration::from_millis(self.discard_interval_ms)
    }

    /// Defaults overridden by `UWB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (keyed by env var name) on top of `self`.
    /// A present but unparseable value is an error rather than a silent fallback.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("UWB_DISCARD_INTERVAL_MS") {
            self.discard_interval_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "discard_interval_ms",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("UWB_CALCULATION_LEVEL") {
            self.calculation_level = raw.trim().parse()?;
        }
        if let Some(raw) = lookup("UWB_UPDATE_LEVEL") {
            self.update_level = raw.trim().parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discard_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "discard_interval_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
