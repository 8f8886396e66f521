//! Request signing for the signed-HTTP probe.
//!
//! The remote API authenticates a request by `CheckSum = sha1(secret ‖ nonce ‖ curtime)`
//! rendered as lowercase hex, with no separators between the parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::error::ConfigError;

/// Compute the checksum for one request.
///
/// Pure: no state, no I/O, safe to call from any number of tasks.
pub fn sign(secret: &str, nonce: &str, timestamp: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(secret.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(timestamp.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random value mixed into every signature of one probe instance.
///
/// Generated once when the probe is built and reused for every check it
/// performs. Callers that need a fresh nonce per request must build a new
/// probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Nonce {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of digits in the `CurTime` header: epoch seconds or milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TimestampPrecision {
    /// 10 digits.
    Seconds,
    /// 13 digits.
    #[default]
    Millis,
}

impl TryFrom<u8> for TimestampPrecision {
    type Error = ConfigError;

    fn try_from(digits: u8) -> Result<Self, Self::Error> {
        match digits {
            10 => Ok(Self::Seconds),
            13 => Ok(Self::Millis),
            other => Err(ConfigError::InvalidPrecision(other)),
        }
    }
}

impl From<TimestampPrecision> for u8 {
    fn from(p: TimestampPrecision) -> Self {
        match p {
            TimestampPrecision::Seconds => 10,
            TimestampPrecision::Millis => 13,
        }
    }
}

/// Current epoch time as a decimal string at `precision`.
pub fn timestamp(precision: TimestampPrecision) -> String {
    timestamp_at(Utc::now(), precision)
}

pub fn timestamp_at(now: DateTime<Utc>, precision: TimestampPrecision) -> String {
    let millis = now.timestamp_millis();
    match precision {
        TimestampPrecision::Millis => millis.to_string(),
        TimestampPrecision::Seconds => (millis / 1000).to_string(),
    }
}
