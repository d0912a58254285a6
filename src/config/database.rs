use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};
use crate::security::SecretString;

/// Relational backend the pool connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    Postgres,
    Sqlite,
}

/// Database configuration (connection, pool limits, retry, caching)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Backend driver
    #[serde(default = "default_driver")]
    pub driver: DatabaseDriver,
    /// Database host
    #[serde(default = "default_host")]
    pub host: String,
    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database user
    #[serde(default = "default_user")]
    pub user: String,
    /// Database password, masked while in memory
    #[serde(default)]
    pub password: SecretString,
    /// Database name (file path or `:memory:` for sqlite)
    #[serde(default = "default_name")]
    pub name: String,
    /// Postgres sslmode
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
    /// Cache entry TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Maximum attempts for retried operations
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base wait between attempts in milliseconds
    #[serde(default = "default_retry_wait")]
    pub retry_wait: u64,
    /// Upper bound for a single wait in milliseconds
    #[serde(default = "default_retry_max_wait")]
    pub retry_max_wait: u64,
    /// Idle connections kept by the pool
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: u32,
    /// Maximum open connections
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,
    /// Hard cap of the driver pool; `max_open_conns` can be raised up to it at runtime
    #[serde(default = "default_max_pool_ceiling")]
    pub max_pool_ceiling: u32,
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Pool acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: u64,
    /// Seconds to wait for the server to accept TCP before connecting (0 disables)
    #[serde(default)]
    pub connect_wait: u64,
    /// Expose the cache handle to transaction scopes
    #[serde(default)]
    pub enable_caching: bool,
}

fn default_driver() -> DatabaseDriver {
    DatabaseDriver::Postgres
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_name() -> String {
    "app".to_string()
}

fn default_sslmode() -> String {
    "disable".to_string()
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_wait() -> u64 {
    5000 // 5 seconds
}

fn default_retry_max_wait() -> u64 {
    60000
}

fn default_max_idle_conns() -> u32 {
    5
}

fn default_max_open_conns() -> u32 {
    10
}

fn default_max_pool_ceiling() -> u32 {
    100
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

impl DatabaseConfig {
    /// Driver URL handed to the ORM
    ///
    /// Credentials are percent-encoded. The returned string contains the
    /// plaintext password and must never be logged; use [`redacted_dsn`].
    ///
    /// [`redacted_dsn`]: DatabaseConfig::redacted_dsn
    pub fn url(&self) -> String {
        match self.driver {
            DatabaseDriver::Postgres => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                urlencoding::encode(&self.user),
                urlencoding::encode(&self.password.expose_str()),
                self.host,
                self.port,
                urlencoding::encode(&self.name),
                self.sslmode,
            ),
            DatabaseDriver::Sqlite => {
                if self.name.is_empty() || self.name == ":memory:" {
                    "sqlite::memory:".to_string()
                } else {
                    format!("sqlite://{}?mode=rwc", self.name)
                }
            }
        }
    }

    /// Key=value connection string
    pub fn dsn(&self) -> String {
        self.render_dsn(&self.password.expose_str())
    }

    /// Key=value connection string with the password masked
    pub fn redacted_dsn(&self) -> String {
        self.render_dsn("********")
    }

    fn render_dsn(&self, password: &str) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            self.host, self.port, self.user, password, self.name, self.sslmode
        )
    }

    /// `host:port` for reachability checks
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait)
    }

    pub fn retry_max_wait(&self) -> Duration {
        Duration::from_millis(self.retry_max_wait)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout)
    }

    pub fn connect_wait(&self) -> Option<Duration> {
        (self.connect_wait > 0).then(|| Duration::from_secs(self.connect_wait))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: SecretString::default(),
            name: default_name(),
            sslmode: default_sslmode(),
            cache_ttl: default_cache_ttl(),
            max_retries: default_max_retries(),
            retry_wait: default_retry_wait(),
            retry_max_wait: default_retry_max_wait(),
            max_idle_conns: default_max_idle_conns(),
            max_open_conns: default_max_open_conns(),
            max_pool_ceiling: default_max_pool_ceiling(),
            connect_timeout: default_connect_timeout(),
            acquire_timeout: default_acquire_timeout(),
            connect_wait: 0,
            enable_caching: false,
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.driver == DatabaseDriver::Postgres {
            if self.host.is_empty() {
                return Err(ConfigError::ValidationError("database.host cannot be empty".to_string()));
            }
            if self.port == 0 {
                return Err(ConfigError::ValidationError("database.port must be > 0".to_string()));
            }
            if self.name.is_empty() {
                return Err(ConfigError::ValidationError("database.name cannot be empty".to_string()));
            }
        }
        if self.max_open_conns == 0 {
            return Err(ConfigError::ValidationError("database.max_open_conns must be > 0".to_string()));
        }
        if self.max_open_conns > self.max_pool_ceiling {
            return Err(ConfigError::ValidationError("database.max_open_conns must be <= max_pool_ceiling".to_string()));
        }
        if self.max_idle_conns > self.max_open_conns {
            return Err(ConfigError::ValidationError("database.max_idle_conns must be <= max_open_conns".to_string()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationError("database.max_retries must be > 0".to_string()));
        }
        if self.retry_wait > self.retry_max_wait {
            return Err(ConfigError::ValidationError("database.retry_wait must be <= retry_max_wait".to_string()));
        }
        if self.acquire_timeout == 0 {
            return Err(ConfigError::ValidationError("database.acquire_timeout must be > 0".to_string()));
        }
        if self.enable_caching && self.cache_ttl == 0 {
            return Err(ConfigError::ValidationError("database.cache_ttl must be > 0 when caching is enabled".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for DatabaseConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
