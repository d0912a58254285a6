//! Counters and gauges emitted by the data layer.
//!
//! Only the `metrics` facade is used here. Installing a recorder (Prometheus or
//! otherwise) is left to the host application; without one every call is a no-op.

use std::sync::Once;

use ::metrics::{counter, describe_counter, describe_gauge, gauge};

pub const TRANSACTIONS_TOTAL: &str = "lighter_data_transactions_total";
pub const RETRY_ATTEMPTS_TOTAL: &str = "lighter_data_retry_attempts_total";
pub const POOL_CONNECTIONS_IN_USE: &str = "lighter_data_pool_connections_in_use";

static DESCRIBE: Once = Once::new();

/// Terminal outcome of a transaction scope, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
    Aborted,
    Cancelled,
    CommitFailed,
    BeginFailed,
}

impl TransactionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionOutcome::Committed => "committed",
            TransactionOutcome::RolledBack => "rolled_back",
            TransactionOutcome::Aborted => "aborted",
            TransactionOutcome::Cancelled => "cancelled",
            TransactionOutcome::CommitFailed => "commit_failed",
            TransactionOutcome::BeginFailed => "begin_failed",
        }
    }
}

/// Registers descriptions with whatever recorder is installed. Only the first
/// call has an effect.
///
/// Called when the first connection pool opens, so a host installs its recorder
/// before opening a coordinator.
pub fn describe_metrics() {
    DESCRIBE.call_once(register_descriptions);
}

fn register_descriptions() {
    describe_counter!(
        TRANSACTIONS_TOTAL,
        "Total number of transaction scopes by outcome"
    );
    describe_counter!(
        RETRY_ATTEMPTS_TOTAL,
        "Total number of attempts made by retry policies"
    );
    describe_gauge!(
        POOL_CONNECTIONS_IN_USE,
        "Number of pool connections currently leased"
    );
}

pub fn record_transaction(outcome: TransactionOutcome) {
    ::tracing::debug!("Metrics: Recording transaction outcome={}", outcome.as_str());
    counter!(TRANSACTIONS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_retry_attempt() {
    counter!(RETRY_ATTEMPTS_TOTAL).increment(1);
}

pub fn set_pool_in_use(count: usize) {
    gauge!(POOL_CONNECTIONS_IN_USE).set(count as f64);
}
