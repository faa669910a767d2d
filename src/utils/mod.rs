//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod retry;

use sha2::{Digest, Sha256};

pub use retry::{RetryPolicy, retry};

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
