//! Resilience patterns for database operations
//!
//! # Available Patterns
//!
//! - **Retry**: bounded exponential backoff around an operation the caller
//!   chooses to retry. The policy does not classify failures; anything the
//!   operation returns as `Err` is retried.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use lighter_data::resilience::RetryPolicy;
//!
//! # async fn example() {
//! let policy = RetryPolicy::new(3, Duration::from_millis(10));
//!
//! let result = policy.execute(|| async {
//!     Ok::<_, std::io::Error>(42)
//! }).await;
//! assert_eq!(result.unwrap(), 42);
//! # }
//! ```

mod retry;

pub use retry::{BACKOFF_MULTIPLIER, RetryError, RetryPolicy};
