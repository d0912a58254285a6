//! Test fixtures shared by unit and integration tests

pub mod notes;
pub mod setup;

pub use setup::{caching_coordinator, coordinator, sqlite_config};
