//! Secret handling for configuration values

mod hash;
mod secret;

pub use hash::sha256_hex;
pub use secret::{DEFAULT_KEY, SecretString};
