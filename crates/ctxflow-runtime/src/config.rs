//! Engine configuration
//!
//! [`EngineConfig`] is plain serde data, loadable from TOML:
//!
//! ```toml
//! history_limit = 16
//!
//! [eligibility.overrides]
//! listener-invoke = "solid_only"
//!
//! [logging]
//! level = "ctxflow=debug"
//! json = false
//! ```

use ctxflow_merge::{EdgeFilter, EligibilityPolicy, DEFAULT_HISTORY_LIMIT};
use ctxflow_model::MergeKind;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Upper bound on the per-token late-edge history
pub const MAX_HISTORY_LIMIT: usize = 65_536;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a configuration
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds an unusable value
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Late edges kept per token for diagnostics
    pub history_limit: usize,
    /// Which edges take part at each merge point
    pub eligibility: EligibilityPolicy,
    /// Subscriber settings used by [`crate::logging::init_tracing`]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns `Parse` for malformed TOML and `Invalid` for values that fail
    /// validation.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values
    ///
    /// # Errors
    /// Returns `Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit > MAX_HISTORY_LIMIT {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: format!("{} exceeds maximum {MAX_HISTORY_LIMIT}", self.history_limit),
            });
        }
        EnvFilter::try_new(&self.logging.level).map_err(|e| ConfigError::Invalid {
            field: "logging.level",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// With late-edge history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// With eligibility policy
    #[inline]
    #[must_use]
    pub fn with_eligibility(mut self, eligibility: EligibilityPolicy) -> Self {
        self.eligibility = eligibility;
        self
    }

    /// With an eligibility override for one merge point
    #[must_use]
    pub fn with_edge_filter(mut self, kind: MergeKind, filter: EdgeFilter) -> Self {
        self.eligibility = self.eligibility.with_override(kind, filter);
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            eligibility: EligibilityPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` takes precedence)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
