pub mod app;
pub mod auth;
pub mod cache;
pub mod database;
pub mod observability;

use thiserror::Error;

pub use app::{AppConfig, Environment, load_from_path};
pub use auth::{AuthConfig, ExternalAuthConfig, GoogleAuthConfig, JwtConfig};
pub use cache::{CacheBackend, CacheConfig};
pub use database::{DatabaseConfig, DatabaseDriver};
pub use observability::ObservabilityConfig;

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Config file does not exist: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Checks a configuration section for values that cannot work at runtime
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Builds a configuration section populated with its defaults
pub trait WithDefaults {
    fn with_defaults() -> Self;
}

/// Load the application configuration from files and environment variables
pub fn load() -> Result<AppConfig, ConfigError> {
    app::load_config()
}
