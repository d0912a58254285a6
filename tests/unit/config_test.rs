//! Configuration loading and validation
//!
//! Tests touching process environment run under `#[serial]`.

use lighter_data::config::*;
use serial_test::serial;
use std::env;

mod utils {
    use std::fs;
    use std::path::Path;

    pub fn create_temp_config(path: &str, content: &str) {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn remove_temp_config(path: &str) {
        let _ = fs::remove_file(path);
    }

    /// Clean up environment variables with LIGHTER_DATA prefix
    pub fn clean_env_vars() {
        let keys: Vec<String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("LIGHTER_DATA"))
            .map(|(k, _)| k)
            .collect();

        for key in keys {
            unsafe { std::env::remove_var(&key) };
        }
        unsafe {
            std::env::remove_var("APP_ENV");
            std::env::remove_var("CONFIG_PATH");
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

#[test]
#[serial]
fn test_load_default_config_success() {
    utils::clean_env_vars();

    let config = load();
    assert!(config.is_ok(), "Failed to load default configuration: {:?}", config.err());
    let config = config.unwrap();

    assert_eq!(config.env, Environment::Local);

    assert_eq!(config.database.driver, DatabaseDriver::Postgres);
    assert_eq!(config.database.port, 5432);
    assert_eq!(config.database.cache_ttl, 300);
    assert_eq!(config.database.max_retries, 3);
    assert_eq!(config.database.retry_wait, 5000);
    assert_eq!(config.database.max_idle_conns, 5);
    assert_eq!(config.database.max_open_conns, 10);
    assert!(!config.database.enable_caching);

    assert_eq!(config.cache.backend, CacheBackend::Local);
    assert_eq!(config.cache.max_entries, 1000);

    assert!(config.observability.enabled);
    assert_eq!(config.observability.level, "info");

    assert_eq!(config.auth.jwt.token_ttl, 3600);

    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_environment_variable_override() {
    utils::clean_env_vars();

    unsafe {
        env::set_var("LIGHTER_DATA__DATABASE__HOST", "db");
        env::set_var("LIGHTER_DATA__DATABASE__PORT", "6543");
        env::set_var("LIGHTER_DATA__DATABASE__PASSWORD", "s3cr3t");
        env::set_var("LIGHTER_DATA__DATABASE__ENABLE_CACHING", "true");
    }

    let config = load().unwrap();

    assert_eq!(config.database.host, "db", "Host should be overridden by env var");
    assert_eq!(config.database.port, 6543, "Port should be overridden by env var");
    assert_eq!(config.database.password.expose_str(), "s3cr3t");
    assert!(config.database.enable_caching);

    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_config_path_selects_single_file() {
    utils::clean_env_vars();

    let path = "target/test-config/config_path.toml";
    utils::create_temp_config(
        path,
        r#"
env = "qa"

[database]
driver = "sqlite"
name = ":memory:"
max_open_conns = 2
max_idle_conns = 1
"#,
    );

    unsafe { env::set_var("CONFIG_PATH", path) };
    let config = load().unwrap();

    assert_eq!(config.env, Environment::Qa);
    assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
    assert_eq!(config.database.url(), "sqlite::memory:");
    assert_eq!(config.database.max_open_conns, 2);
    // fields absent from the file keep their defaults
    assert_eq!(config.database.max_retries, 3);

    utils::remove_temp_config(path);
    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_app_env_sets_environment() {
    utils::clean_env_vars();
    unsafe { env::set_var("APP_ENV", "production") };

    let config = load().unwrap();

    assert_eq!(config.env, Environment::Production);
    assert!(config.env.is_production());
    // no config/production.toml, so the remaining values come from default.toml
    assert_eq!(config.database.max_open_conns, 10);

    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_app_env_wins_over_config_path_file() {
    utils::clean_env_vars();

    let path = "target/test-config/app_env.toml";
    utils::create_temp_config(path, "env = \"qa\"\n");
    unsafe {
        env::set_var("CONFIG_PATH", path);
        env::set_var("APP_ENV", "development");
    }

    let config = load().unwrap();
    assert_eq!(config.env, Environment::Development);

    utils::remove_temp_config(path);
    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_config_path_missing_file() {
    utils::clean_env_vars();
    unsafe { env::set_var("CONFIG_PATH", "target/test-config/absent.toml") };

    let result = load();
    assert!(matches!(result, Err(ConfigError::NotFound(_))));

    utils::clean_env_vars();
}

#[test]
#[serial]
fn test_invalid_override_fails_validation() {
    utils::clean_env_vars();
    unsafe { env::set_var("LIGHTER_DATA__DATABASE__MAX_OPEN_CONNS", "0") };

    let result = load();
    assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("max_open_conns")));

    utils::clean_env_vars();
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_empty_host() {
    let mut config = AppConfig::with_defaults();
    config.database.host = "".to_string();

    let result = config.validate();
    if let Err(ConfigError::ValidationError(msg)) = result {
        assert!(msg.contains("database.host"));
    } else {
        panic!("Expected ValidationError for empty host");
    }
}

#[test]
fn test_validation_sqlite_ignores_host() {
    let mut config = AppConfig::with_defaults();
    config.database.driver = DatabaseDriver::Sqlite;
    config.database.host = "".to_string();

    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_retry_wait_above_cap() {
    let mut config = AppConfig::with_defaults();
    config.database.retry_wait = 120_000;

    assert!(config.validate().is_err());
}

#[test]
fn test_validation_caching_requires_ttl() {
    let mut config = AppConfig::with_defaults();
    config.database.enable_caching = true;
    config.database.cache_ttl = 0;

    assert!(config.validate().is_err());
}

#[test]
fn test_scenario_config_dsn() {
    let config = DatabaseConfig {
        host: "db".to_string(),
        port: 5432,
        user: "u".to_string(),
        password: lighter_data::SecretString::new("p"),
        name: "app".to_string(),
        max_retries: 3,
        retry_wait: 1000,
        ..DatabaseConfig::default()
    };

    assert!(config.validate().is_ok());
    assert_eq!(
        config.dsn(),
        "host=db port=5432 user=u password=p dbname=app sslmode=disable"
    );
    assert_eq!(config.address(), "db:5432");
    assert!(!config.redacted_dsn().contains("password=p "));
}
