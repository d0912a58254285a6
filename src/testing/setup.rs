use crate::config::{DatabaseConfig, DatabaseDriver};
use crate::database::Coordinator;

use super::notes;

/// In-memory SQLite configuration with fast retries
///
/// Every pool opened from it gets its own database; the idle floor of one keeps
/// that database alive for the pool's lifetime.
pub fn sqlite_config() -> DatabaseConfig {
    DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        name: ":memory:".to_string(),
        max_open_conns: 4,
        max_idle_conns: 1,
        max_retries: 3,
        retry_wait: 1,
        retry_max_wait: 10,
        acquire_timeout: 5,
        ..DatabaseConfig::default()
    }
}

/// Returns a pinged coordinator over a fresh in-memory database with the
/// `notes` table created
///
/// # Panics
/// Panics if the pool cannot be opened or the table cannot be created.
/// This is intentional for test setup - tests should fail fast if setup is broken.
///
/// # Example
/// ```no_run
/// use lighter_data::testing;
///
/// #[tokio::test]
/// async fn test_something() {
///     let coordinator = testing::coordinator().await;
///     // Use coordinator for testing
/// }
/// ```
pub async fn coordinator() -> Coordinator {
    with_config(sqlite_config()).await
}

/// Like [`coordinator`], with caching enabled over a local cache
pub async fn caching_coordinator() -> Coordinator {
    with_config(DatabaseConfig {
        enable_caching: true,
        ..sqlite_config()
    })
    .await
}

async fn with_config(config: DatabaseConfig) -> Coordinator {
    let coordinator = Coordinator::new(&config)
        .await
        .expect("Failed to open in-memory database");
    coordinator.open().await.expect("Failed to ping in-memory database");

    let schema = coordinator.schema_for(notes::Entity);
    coordinator
        .migrate(&[schema])
        .await
        .expect("Failed to create notes table");

    coordinator
}
