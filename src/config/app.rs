use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    AuthConfig, CacheConfig, ConfigError, DatabaseConfig, ObservabilityConfig, Validate,
    WithDefaults,
};

/// Prefix for environment variable overrides, e.g. `LIGHTER_DATA__DATABASE__PORT`
pub const ENV_PREFIX: &str = "LIGHTER_DATA";

/// Top-level configuration that aggregates all config sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub env: Environment,
    /// Database configuration (connection, pool, retry)
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache backend configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Authentication secrets
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Development,
    Qa,
    Production,
}

impl Environment {
    /// Environment named by `APP_ENV`, `Local` when unset or unknown
    pub fn current() -> Self {
        std::env::var("APP_ENV")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "qa" => Environment::Qa,
            "production" | "prod" => Environment::Production,
            _ => Environment::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "development",
            Environment::Qa => "qa",
            Environment::Production => "production",
        }
    }

    pub fn is_dev(&self) -> bool {
        *self == Environment::Development
    }

    pub fn is_qa(&self) -> bool {
        *self == Environment::Qa
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.cache.validate()?;
        self.observability.validate()?;
        self.auth.validate()?;
        Ok(())
    }
}

impl WithDefaults for AppConfig {
    fn with_defaults() -> Self {
        Self {
            env: Environment::default(),
            database: DatabaseConfig::with_defaults(),
            cache: CacheConfig::with_defaults(),
            observability: ObservabilityConfig::with_defaults(),
            auth: AuthConfig::with_defaults(),
        }
    }
}

/// `APP_ENV`, when set, decides `AppConfig::env` over anything in the files
fn app_env_override() -> Option<&'static str> {
    std::env::var("APP_ENV")
        .ok()
        .map(|value| Environment::parse(&value).as_str())
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Load configuration from files and environment variables
///
/// When `CONFIG_PATH` is set, that single file is loaded (and must exist).
/// Otherwise precedence is (highest to lowest):
/// 1. Environment variables: LIGHTER_DATA__DATABASE__PORT=5432
/// 2. config/local.toml (git-ignored, developer overrides)
/// 3. config/{APP_ENV}.toml
/// 4. config/default.toml
pub fn load_config() -> Result<AppConfig, ConfigError> {
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        if !path.is_empty() {
            return load_from_path(path);
        }
    }

    use config::{Config, File};

    let env = Environment::current();

    let config = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", env.as_str())).required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(env_source())
        .set_override_option("env", app_env_override())?
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

/// Load configuration from a single file, overlaid by environment variables
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    use config::{Config, File};

    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(env_source())
        .set_override_option("env", app_env_override())?
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}
