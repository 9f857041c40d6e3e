//! Coordinator configuration.

use chrono::Duration;

use crate::state::session::{DEFAULT_DISCONNECT_GRACE_SECS, DEFAULT_SESSION_MAX_AGE_SECS};
use crate::state::supply::DEFAULT_FEATURE_COUNT_TOLERANCE;

/// Default cadence of the session age sweep (1 hour).
pub const DEFAULT_SWEEP_INTERVAL_SECS: i64 = 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// Tunables for a `Coordinator`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Seconds a half-empty session survives a disconnect
    pub disconnect_grace_secs: i64,

    /// Sessions older than this are swept regardless of state
    pub session_max_age_secs: i64,

    pub sweep_interval_secs: i64,

    /// Allowed deviation from the expected snake/ladder counts
    pub feature_count_tolerance: usize,

    /// Try random layouts before presets when the generator fails
    pub algorithmic_fallback: bool,

    /// Fixed RNG seed for dice and layouts; entropy when absent
    pub seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            disconnect_grace_secs: DEFAULT_DISCONNECT_GRACE_SECS,
            session_max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            feature_count_tolerance: DEFAULT_FEATURE_COUNT_TOLERANCE,
            algorithmic_fallback: true,
            seed: None,
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.disconnect_grace_secs < 0 {
            return Err(ConfigError::Validation(
                "disconnect_grace_secs must be >= 0".into(),
            ));
        }
        if self.session_max_age_secs <= 0 {
            return Err(ConfigError::Validation(
                "session_max_age_secs must be > 0".into(),
            ));
        }
        if self.sweep_interval_secs <= 0 {
            return Err(ConfigError::Validation(
                "sweep_interval_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::seconds(self.disconnect_grace_secs)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::seconds(self.session_max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::seconds(self.sweep_interval_secs)
    }
}
