use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Install a subscriber at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
    /// Include timestamps
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_timestamps() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            json: false,
            timestamps: default_timestamps(),
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.level.is_empty() {
            return Err(ConfigError::ValidationError("observability.level cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for ObservabilityConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
