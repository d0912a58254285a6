use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};
use crate::security::SecretString;

/// Authentication secrets consumed by host services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "JwtConfig::default")]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub external: ExternalAuthConfig,
}

/// JWT signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl: u64,
    /// Signing secret
    #[serde(default)]
    pub secret: SecretString,
}

/// Third-party identity providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalAuthConfig {
    #[serde(default)]
    pub google: GoogleAuthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: SecretString,
}

fn default_token_ttl() -> u64 {
    3600 // 1 hour
}

impl JwtConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl)
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            token_ttl: default_token_ttl(),
            secret: SecretString::default(),
        }
    }
}

impl Validate for AuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.token_ttl == 0 {
            return Err(ConfigError::ValidationError("auth.jwt.token_ttl must be > 0".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for AuthConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
