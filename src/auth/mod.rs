//! Wallet challenge-response authentication and stateless sessions.

pub mod challenge;
pub mod gateway;
pub mod middleware;
pub mod replay;
pub mod session;
pub mod verify;

pub use challenge::{Challenge, ChallengeCodec, ChallengeError};
pub use gateway::{AuthError, AuthGateway, LoginError, SignedChallenge};
pub use middleware::{AppState, AuthSession};
pub use replay::{ChallengeReplayCache, ChallengeTag, ReplayCache};
pub use session::{IssuedSession, SessionError, SessionIssuer, SESSION_COOKIE};
pub use verify::{AddressRecovery, PersonalSignVerifier, SignatureError};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Current Unix time in seconds.
pub(crate) fn unix_seconds() -> i64 {
    unix_millis() / 1000
}
