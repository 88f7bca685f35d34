//! Reference numbers read back to callers
//!
//! Format is a three-letter prefix, a dash and exactly six decimal digits:
//! `UBG-` for urgent cases, `CBK-` for scheduled callbacks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Error;

const DIGITS: usize = 6;
const MODULUS: u64 = 1_000_000;

/// What a reference number tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    UrgentCase,
    Callback,
}

impl ReferenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::UrgentCase => "UBG",
            ReferenceKind::Callback => "CBK",
        }
    }
}

/// A validated reference number such as `UBG-042117`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceNumber {
    kind: ReferenceKind,
    value: String,
}

impl ReferenceNumber {
    /// Generate a random reference number
    pub fn generate(kind: ReferenceKind) -> Self {
        let n = rand::thread_rng().gen_range(0..MODULUS);
        Self::from_parts(kind, n)
    }

    /// Derive a reference number without touching the random source.
    ///
    /// Used on handler failure paths; the same call id and instant always
    /// produce the same number.
    pub fn fallback(kind: ReferenceKind, call_id: &str, at: DateTime<Utc>) -> Self {
        // FNV-1a over the call id and the millisecond timestamp
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let millis = at.timestamp_millis().to_le_bytes();
        for byte in call_id.as_bytes().iter().chain(millis.iter()) {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self::from_parts(kind, hash % MODULUS)
    }

    fn from_parts(kind: ReferenceKind, n: u64) -> Self {
        Self {
            kind,
            value: format!("{}-{:0width$}", kind.prefix(), n, width = DIGITS),
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl FromStr for ReferenceNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        let (prefix, rest) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidReference(s.clone()))?;

        let kind = match prefix {
            "UBG" => ReferenceKind::UrgentCase,
            "CBK" => ReferenceKind::Callback,
            _ => return Err(Error::InvalidReference(s.clone())),
        };

        if rest.len() != DIGITS || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidReference(s.clone()));
        }

        Ok(Self { kind, value: s })
    }
}

impl TryFrom<String> for ReferenceNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReferenceNumber> for String {
    fn from(reference: ReferenceNumber) -> Self {
        reference.value
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
