//! Self-verifying login challenges.
//!
//! A challenge travels as `mac:salt:timestamp`:
//! - `salt`: 16 random bytes, lowercase hex
//! - `timestamp`: issue time in Unix milliseconds
//! - `mac`: HMAC-SHA512 over `salt ++ timestamp`, keyed with the app secret
//!
//! Nothing is stored server-side. The MAC proves the server minted the
//! challenge and the embedded timestamp bounds its lifetime.

use super::unix_millis;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

/// Number of random salt bytes per challenge.
pub const SALT_BYTES: usize = 16;

/// Length of an HMAC-SHA512 tag in bytes.
pub const MAC_BYTES: usize = 64;

/// Length of a hex-encoded HMAC-SHA512 tag.
const MAC_HEX_LEN: usize = MAC_BYTES * 2;

/// Why a presented challenge was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("malformed challenge")]
    Malformed,

    #[error("challenge expired")]
    Expired,

    #[error("challenge MAC mismatch")]
    BadMac,

    #[error("challenge already used")]
    Replayed,
}

/// A parsed challenge. Its `Display` output is the wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub mac: String,
    pub salt: String,
    pub issued_at_ms: i64,
}

impl Challenge {
    /// Decoded MAC bytes.
    pub fn tag(&self) -> Result<[u8; MAC_BYTES], ChallengeError> {
        let mut tag = [0u8; MAC_BYTES];
        hex::decode_to_slice(&self.mac, &mut tag).map_err(|_| ChallengeError::Malformed)?;
        Ok(tag)
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mac, self.salt, self.issued_at_ms)
    }
}

impl FromStr for Challenge {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(mac), Some(salt), Some(timestamp), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ChallengeError::Malformed);
        };

        if mac.len() != MAC_HEX_LEN || !is_lower_hex(mac) {
            return Err(ChallengeError::Malformed);
        }
        if salt.is_empty() || !is_lower_hex(salt) {
            return Err(ChallengeError::Malformed);
        }
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ChallengeError::Malformed);
        }

        let issued_at_ms: i64 = timestamp.parse().map_err(|_| ChallengeError::Malformed)?;

        // Leading zeros would let two strings share one MAC input.
        if issued_at_ms.to_string() != timestamp {
            return Err(ChallengeError::Malformed);
        }

        Ok(Challenge {
            mac: mac.to_string(),
            salt: salt.to_string(),
            issued_at_ms,
        })
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Mints and checks challenges against the app secret.
#[derive(Clone)]
pub struct ChallengeCodec {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl ChallengeCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_vec()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Issue a fresh challenge stamped with the current time.
    pub fn issue(&self) -> Challenge {
        self.issue_at(unix_millis())
    }

    /// Issue a challenge stamped with `now_ms`.
    pub fn issue_at(&self, now_ms: i64) -> Challenge {
        let mut rng = rand::rng();
        let mut bytes = [0u8; SALT_BYTES];
        rng.fill(&mut bytes);

        let salt = hex::encode(bytes);
        let mac = hex::encode(self.keyed_mac(&salt, now_ms).finalize().into_bytes());

        Challenge {
            mac,
            salt,
            issued_at_ms: now_ms,
        }
    }

    /// Parse and check a serialized challenge against the current time.
    pub fn verify(&self, serialized: &str) -> Result<Challenge, ChallengeError> {
        self.verify_at(serialized, unix_millis())
    }

    /// Parse and check a serialized challenge as of `now_ms`.
    ///
    /// A challenge is live while `now_ms - issued_at_ms <= ttl`. The MAC is
    /// compared in constant time.
    pub fn verify_at(&self, serialized: &str, now_ms: i64) -> Result<Challenge, ChallengeError> {
        let challenge: Challenge = serialized.parse()?;

        let elapsed = now_ms.saturating_sub(challenge.issued_at_ms);
        if elapsed > self.ttl_ms() {
            return Err(ChallengeError::Expired);
        }

        let tag = challenge.tag()?;
        self.keyed_mac(&challenge.salt, challenge.issued_at_ms)
            .verify_slice(&tag)
            .map_err(|_| ChallengeError::BadMac)?;

        Ok(challenge)
    }

    /// Boolean form of [`verify`](Self::verify). Never panics on bad input.
    pub fn validate(&self, serialized: &str) -> bool {
        self.verify(serialized).is_ok()
    }

    pub fn validate_at(&self, serialized: &str, now_ms: i64) -> bool {
        self.verify_at(serialized, now_ms).is_ok()
    }

    /// Last instant (inclusive, Unix millis) at which `challenge` is accepted.
    pub fn expires_at_ms(&self, challenge: &Challenge) -> i64 {
        challenge.issued_at_ms.saturating_add(self.ttl_ms())
    }

    fn keyed_mac(&self, salt: &str, issued_at_ms: i64) -> HmacSha512 {
        // HMAC accepts keys of any length, so construction cannot fail.
        #[allow(clippy::expect_used)]
        let mut mac =
            HmacSha512::new_from_slice(&self.secret).expect("HMAC accepts keys of any size");
        mac.update(salt.as_bytes());
        mac.update(issued_at_ms.to_string().as_bytes());
        mac
    }
}
