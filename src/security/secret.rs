//! In-memory obfuscation for configuration secrets
//!
//! `SecretString` keeps a value XOR-masked with a rotating key so the plaintext
//! never sits in its field at rest. This is a memory-residency device only: the
//! mask is trivially reversible and must not be treated as encryption.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key applied to freshly constructed secrets
pub const DEFAULT_KEY: u64 = 12345;

const REDACTED: &str = "[REDACTED]";

/// A string value stored XOR-masked with an integer key
///
/// The masking byte is the low byte of the key. The masked buffer is always
/// `plaintext ^ key` under the key currently stored alongside it; the only way
/// to change the key is through [`SecretString::set_key`] or
/// [`SecretString::rotate_key`], which unmask under the old key first.
///
/// # Example
///
/// ```rust
/// use lighter_data::security::SecretString;
///
/// let mut secret = SecretString::new("hunter2");
/// assert_ne!(secret.masked(), b"hunter2");
///
/// secret.rotate_key();
/// assert_eq!(secret.get(), b"hunter2".to_vec());
/// ```
pub struct SecretString {
    key: u64,
    masked: Vec<u8>,
    initialized: bool,
}

impl SecretString {
    /// Create a secret masked under [`DEFAULT_KEY`]
    pub fn new(value: impl AsRef<[u8]>) -> Self {
        let mut secret = Self {
            key: DEFAULT_KEY,
            masked: Vec::new(),
            initialized: false,
        };
        secret.set(value);
        secret
    }

    /// Replace the stored value, masking it under the current key
    pub fn set(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        self.wipe();
        self.masked = xor(value.as_ref(), self.key);
        self.initialized = true;
        self
    }

    /// Recover the plaintext
    ///
    /// A secret that was never set yields an empty buffer.
    pub fn get(&self) -> Vec<u8> {
        if !self.initialized {
            return Vec::new();
        }
        xor(&self.masked, self.key)
    }

    /// Recover the plaintext as a string, replacing invalid UTF-8
    pub fn expose_str(&self) -> String {
        String::from_utf8_lossy(&self.get()).into_owned()
    }

    /// Re-mask the stored value under `key`
    pub fn set_key(&mut self, key: u64) {
        if self.initialized {
            let plain = self.get();
            self.wipe();
            self.masked = xor(&plain, key);
        }
        self.key = key;
    }

    /// Re-mask the stored value under a fresh random key
    ///
    /// The new key always differs from the current one in its masking byte, so
    /// the masked buffer of a non-empty secret changes on every rotation.
    pub fn rotate_key(&mut self) {
        let mut rng = rand::thread_rng();
        let key = loop {
            let candidate: u64 = rng.gen_range(1..u64::MAX);
            if candidate as u8 != self.key as u8 {
                break candidate;
            }
        };
        self.set_key(key);
    }

    /// The key currently masking the value
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The masked bytes as stored
    pub fn masked(&self) -> &[u8] {
        &self.masked
    }

    pub fn is_set(&self) -> bool {
        self.initialized
    }

    pub fn is_empty(&self) -> bool {
        self.masked.is_empty()
    }

    fn wipe(&mut self) {
        self.masked.iter_mut().for_each(|byte| *byte = 0);
    }
}

fn xor(value: &[u8], key: u64) -> Vec<u8> {
    let mask = key as u8;
    value.iter().map(|byte| byte ^ mask).collect()
}

impl Default for SecretString {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY,
            masked: Vec::new(),
            initialized: false,
        }
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            masked: self.masked.clone(),
            initialized: self.initialized,
        }
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for SecretString {}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretString").field(&REDACTED).finish()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}
