//! Stateless session tokens.
//!
//! A session is an HS256 JWT carrying the recovered address and an absolute
//! expiry. The server keeps no session store: a token is valid wherever its
//! signature checks out and `exp` is in the future.

use super::unix_seconds;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE: &str = "authorization";

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Address recovered at login.
    pub address: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiration (Unix seconds).
    pub exp: i64,
}

/// A freshly minted session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub address: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Session failures. Callers reject all of them alike; the kinds exist for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session expired")]
    Expired,

    #[error("session signature mismatch")]
    BadSignature,

    #[error("malformed session token")]
    Malformed,

    #[error("failed to sign session: {0}")]
    Signing(String),
}

/// Mints and validates session tokens with the session secret.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a session for `address` expiring `ttl` from now.
    pub fn mint(&self, address: &str) -> Result<IssuedSession, SessionError> {
        self.mint_at(address, unix_seconds())
    }

    /// Mint a session as if issued at `issued_at` (Unix seconds).
    pub fn mint_at(&self, address: &str, issued_at: i64) -> Result<IssuedSession, SessionError> {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            address: address.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        Ok(IssuedSession {
            token,
            address: claims.address,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Validate a token and return the address it was issued to.
    pub fn validate(&self, token: &str) -> Result<String, SessionError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                ErrorKind::InvalidSignature => SessionError::BadSignature,
                _ => SessionError::Malformed,
            })?;

        if data.claims.address.is_empty() {
            return Err(SessionError::Malformed);
        }

        Ok(data.claims.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"session-secret-for-unit-tests-0123456789";
    const ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
    const THIRTY_DAYS: Duration = Duration::from_secs(2_592_000);

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(SECRET, THIRTY_DAYS)
    }

    #[test]
    fn test_mint_and_validate() {
        let issuer = issuer();
        let session = issuer.mint(ADDRESS).unwrap();

        assert_eq!(session.address, ADDRESS);
        assert_eq!(session.expires_at - session.issued_at, 2_592_000);
        assert_eq!(issuer.validate(&session.token).unwrap(), ADDRESS);
    }

    #[test]
    fn test_expired_session() {
        let issuer = issuer();
        let long_ago = unix_seconds() - 31 * 24 * 60 * 60;
        let session = issuer.mint_at(ADDRESS, long_ago).unwrap();

        assert_eq!(issuer.validate(&session.token), Err(SessionError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let session = issuer().mint(ADDRESS).unwrap();
        let other = SessionIssuer::new(b"a-completely-different-session-secret", THIRTY_DAYS);

        assert_eq!(
            other.validate(&session.token),
            Err(SessionError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_signature() {
        let issuer = issuer();
        let token = issuer.mint(ADDRESS).unwrap().token;

        let sig_start = token.rfind('.').unwrap() + 1;
        let mut tampered = token.clone();
        let original = &token[sig_start + 5..sig_start + 6];
        let replacement = if original == "A" { "B" } else { "A" };
        tampered.replace_range(sig_start + 5..sig_start + 6, replacement);

        assert_eq!(
            issuer.validate(&tampered),
            Err(SessionError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_claims() {
        let issuer = issuer();
        let genuine = issuer.mint(ADDRESS).unwrap().token;
        let forged = SessionIssuer::new(b"attacker-controlled-secret-value", THIRTY_DAYS)
            .mint("0x0000000000000000000000000000000000000bad")
            .unwrap()
            .token;

        // Forged header + claims, genuine signature.
        let forged_body = &forged[..forged.rfind('.').unwrap()];
        let genuine_sig = &genuine[genuine.rfind('.').unwrap()..];
        let spliced = format!("{}{}", forged_body, genuine_sig);

        assert_eq!(issuer.validate(&spliced), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let issuer = issuer();
        for token in ["", "not-a-token", "a.b.c", "a.b"] {
            assert_eq!(
                issuer.validate(token),
                Err(SessionError::Malformed),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_empty_address_rejected() {
        let issuer = issuer();
        let session = issuer.mint("").unwrap();
        assert_eq!(issuer.validate(&session.token), Err(SessionError::Malformed));
    }
}
