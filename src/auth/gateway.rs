//! Login orchestration and session checks for both transports.
//!
//! Client state moves `Anonymous → ChallengeOutstanding → Authenticated`
//! and back to `Anonymous` on logout. Only the last step touches the client
//! (its cookie); the server holds no per-client state beyond the optional
//! replay cache.

use super::challenge::{ChallengeCodec, ChallengeError};
use super::replay::{ChallengeReplayCache, ReplayCache};
use super::session::{IssuedSession, SessionError, SessionIssuer, SESSION_COOKIE};
use super::unix_millis;
use super::verify::{AddressRecovery, PersonalSignVerifier, SignatureError};
use crate::config::Config;
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;

/// A challenge together with the client's signature over it.
#[derive(Debug, Clone)]
pub struct SignedChallenge {
    pub challenge: String,
    pub signature: String,
}

impl SignedChallenge {
    /// Build from optional wire fields. Absent or empty fields are malformed input.
    pub fn from_parts(
        challenge: Option<String>,
        signature: Option<String>,
    ) -> Result<Self, LoginError> {
        let challenge = challenge
            .filter(|c| !c.is_empty())
            .ok_or(LoginError::MalformedInput("originalMessage"))?;
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(LoginError::MalformedInput("signedMessage"))?;

        Ok(SignedChallenge {
            challenge,
            signature,
        })
    }
}

/// Login failures. `Display` is what the client sees, so it never says
/// which part of the challenge failed.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("{0} required")]
    MalformedInput(&'static str),

    #[error("bad secret")]
    BadChallenge(ChallengeError),

    #[error("invalid signature")]
    InvalidSignature(SignatureError),

    #[error("failed to issue session")]
    Session(SessionError),
}

/// Outcome of a session check that did not yield an identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no session presented")]
    Unauthenticated,

    #[error("invalid session: {0}")]
    InvalidSession(#[from] SessionError),
}

pub struct AuthGateway {
    challenges: ChallengeCodec,
    verifier: Arc<dyn AddressRecovery>,
    sessions: SessionIssuer,
    replay: Option<Arc<dyn ReplayCache>>,
    secure_cookies: bool,
}

impl AuthGateway {
    pub fn new(
        challenges: ChallengeCodec,
        verifier: Arc<dyn AddressRecovery>,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            challenges,
            verifier,
            sessions,
            replay: None,
            secure_cookies: false,
        }
    }

    /// Wire up the production components from configuration.
    pub fn from_config(config: &Config) -> Self {
        let challenges = ChallengeCodec::new(config.app_secret.as_bytes(), config.challenge_ttl());
        let sessions = SessionIssuer::new(config.session_secret.as_bytes(), config.session_ttl());

        let mut gateway = Self::new(challenges, Arc::new(PersonalSignVerifier), sessions)
            .with_secure_cookies(config.use_ssl);
        if config.replay_protection {
            gateway = gateway.with_replay_cache(Arc::new(ChallengeReplayCache::new(
                config.replay_max_entries,
            )));
        }
        gateway
    }

    /// Enforce single use of challenges through `cache`.
    pub fn with_replay_cache(mut self, cache: Arc<dyn ReplayCache>) -> Self {
        self.replay = Some(cache);
        self
    }

    /// Mark session cookies `Secure` and `SameSite=Strict`.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn replay_cache(&self) -> Option<Arc<dyn ReplayCache>> {
        self.replay.clone()
    }

    /// Issue a challenge for the client to sign.
    pub fn begin_login(&self) -> String {
        self.challenges.issue().to_string()
    }

    /// Check a signed challenge and mint a session for the recovered address.
    ///
    /// The replay cache is consulted last, so a challenge is only burned by a
    /// submission that would otherwise have succeeded.
    pub fn complete_login(&self, signed: &SignedChallenge) -> Result<IssuedSession, LoginError> {
        let now_ms = unix_millis();

        let challenge = self
            .challenges
            .verify_at(&signed.challenge, now_ms)
            .map_err(LoginError::BadChallenge)?;

        let address = self
            .verifier
            .recover_address(&signed.challenge, &signed.signature)
            .map_err(LoginError::InvalidSignature)?;

        if let Some(replay) = &self.replay {
            let expires_at_ms = self.challenges.expires_at_ms(&challenge);
            let tag = challenge.tag().map_err(LoginError::BadChallenge)?;
            if !replay.check_and_insert(&tag, expires_at_ms, now_ms) {
                return Err(LoginError::BadChallenge(ChallengeError::Replayed));
            }
        }

        self.sessions.mint(&address).map_err(LoginError::Session)
    }

    /// Resolve the identity behind a request's session token.
    ///
    /// A missing (or empty) token is `Unauthenticated`; a present but
    /// unusable one is `InvalidSession`. Callers pick the policy.
    pub fn authenticate_request(&self, token: Option<&str>) -> Result<String, AuthError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;
        Ok(self.sessions.validate(token)?)
    }

    /// Resolve the identity for a connection upgrade. Any failure is anonymous.
    pub fn authenticate_upgrade(&self, token: Option<&str>) -> Option<String> {
        match self.authenticate_request(token) {
            Ok(address) => Some(address),
            Err(AuthError::Unauthenticated) => None,
            Err(AuthError::InvalidSession(e)) => {
                tracing::debug!(action = "session_rejected", transport = "upgrade", kind = %e, "Upgrade proceeds anonymously");
                None
            }
        }
    }

    /// Cookie that carries `session` back to the client.
    pub fn session_cookie(&self, session: &IssuedSession) -> Cookie<'static> {
        let max_age = i64::try_from(self.sessions.ttl().as_secs()).unwrap_or(i64::MAX);
        self.cookie(session.token.clone(), time::Duration::seconds(max_age))
    }

    /// Cookie that erases the client's session. No server-side revocation
    /// happens; the old token stays valid until its own expiry.
    pub fn logout(&self) -> Cookie<'static> {
        self.cookie(String::new(), time::Duration::ZERO)
    }

    fn cookie(&self, value: String, max_age: time::Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(self.secure_cookies)
            .path("/")
            .max_age(max_age);
        if self.secure_cookies {
            builder = builder.same_site(SameSite::Strict);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::challenge::Challenge;
    use crate::auth::verify::{address_of, hash_personal_message};
    use k256::ecdsa::SigningKey;
    use std::time::Duration;

    const APP_SECRET: &[u8] = b"gateway-app-secret-0123456789abcdef";
    const SESSION_SECRET: &[u8] = b"gateway-session-secret-0123456789abc";

    fn gateway() -> AuthGateway {
        AuthGateway::new(
            ChallengeCodec::new(APP_SECRET, Duration::from_secs(300)),
            Arc::new(PersonalSignVerifier),
            SessionIssuer::new(SESSION_SECRET, Duration::from_secs(2_592_000)),
        )
    }

    fn signing_key() -> SigningKey {
        let mut seed = [0u8; 32];
        rand::fill(&mut seed);
        SigningKey::from_slice(&seed).unwrap()
    }

    fn sign(key: &SigningKey, message: &str) -> String {
        let hash = hash_personal_message(message.as_bytes());
        let (sig, recovery_id) = key.sign_prehash_recoverable(&hash).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(bytes))
    }

    /// Recovery stub that answers with a fixed address.
    struct FixedRecovery(&'static str);

    impl AddressRecovery for FixedRecovery {
        fn recover_address(&self, _: &str, _: &str) -> Result<String, SignatureError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingRecovery;

    impl AddressRecovery for FailingRecovery {
        fn recover_address(&self, _: &str, _: &str) -> Result<String, SignatureError> {
            Err(SignatureError::Recovery("stub".to_string()))
        }
    }

    #[test]
    fn test_login_round_trip() {
        let gateway = gateway();
        let key = signing_key();

        let challenge = gateway.begin_login();
        let signed = SignedChallenge {
            signature: sign(&key, &challenge),
            challenge,
        };

        let session = gateway.complete_login(&signed).unwrap();
        let expected = address_of(key.verifying_key());
        assert_eq!(session.address, expected);
        assert_eq!(
            gateway.authenticate_request(Some(&session.token)).unwrap(),
            expected
        );
    }

    #[test]
    fn test_stale_challenge_is_bad_challenge() {
        let gateway = gateway();
        let codec = ChallengeCodec::new(APP_SECRET, Duration::from_secs(300));
        let stale = codec.issue_at(unix_millis() - 6 * 60 * 1000).to_string();

        let signed = SignedChallenge {
            signature: sign(&signing_key(), &stale),
            challenge: stale,
        };

        assert!(matches!(
            gateway.complete_login(&signed),
            Err(LoginError::BadChallenge(ChallengeError::Expired))
        ));
    }

    #[test]
    fn test_recomputed_wrong_mac_rejected() {
        let gateway = gateway();
        let genuine: Challenge = gateway.begin_login().parse().unwrap();

        // Same shape and timestamp, MAC keyed with the wrong secret.
        let forged = ChallengeCodec::new(b"not-the-app-secret", Duration::from_secs(300))
            .issue_at(genuine.issued_at_ms)
            .to_string();

        let signed = SignedChallenge {
            signature: sign(&signing_key(), &forged),
            challenge: forged,
        };

        assert!(matches!(
            gateway.complete_login(&signed),
            Err(LoginError::BadChallenge(ChallengeError::BadMac))
        ));
    }

    #[test]
    fn test_recovery_failure_is_invalid_signature() {
        let gateway = AuthGateway::new(
            ChallengeCodec::new(APP_SECRET, Duration::from_secs(300)),
            Arc::new(FailingRecovery),
            SessionIssuer::new(SESSION_SECRET, Duration::from_secs(60)),
        );
        let signed = SignedChallenge {
            challenge: gateway.begin_login(),
            signature: "0x00".to_string(),
        };

        let err = gateway.complete_login(&signed).unwrap_err();
        assert!(matches!(err, LoginError::InvalidSignature(_)));
        assert_eq!(err.to_string(), "invalid signature");
    }

    #[test]
    fn test_replayed_challenge_rejected() {
        let gateway = AuthGateway::new(
            ChallengeCodec::new(APP_SECRET, Duration::from_secs(300)),
            Arc::new(FixedRecovery("0xABC")),
            SessionIssuer::new(SESSION_SECRET, Duration::from_secs(60)),
        )
        .with_replay_cache(Arc::new(ChallengeReplayCache::new(100)));

        let signed = SignedChallenge {
            challenge: gateway.begin_login(),
            signature: "0xsig".to_string(),
        };

        assert_eq!(gateway.complete_login(&signed).unwrap().address, "0xABC");
        let err = gateway.complete_login(&signed).unwrap_err();
        assert!(matches!(
            err,
            LoginError::BadChallenge(ChallengeError::Replayed)
        ));
        assert_eq!(err.to_string(), "bad secret");
    }

    #[test]
    fn test_full_replay_cache_fails_closed() {
        let gateway = AuthGateway::new(
            ChallengeCodec::new(APP_SECRET, Duration::from_secs(300)),
            Arc::new(FixedRecovery("0xABC")),
            SessionIssuer::new(SESSION_SECRET, Duration::from_secs(60)),
        )
        .with_replay_cache(Arc::new(ChallengeReplayCache::new(1)));

        let first = SignedChallenge {
            challenge: gateway.begin_login(),
            signature: "0xsig".to_string(),
        };
        let second = SignedChallenge {
            challenge: gateway.begin_login(),
            signature: "0xsig".to_string(),
        };

        assert!(gateway.complete_login(&first).is_ok());
        assert!(matches!(
            gateway.complete_login(&second),
            Err(LoginError::BadChallenge(ChallengeError::Replayed))
        ));
        // The burned challenge stays burned.
        assert!(gateway.complete_login(&first).is_err());
    }

    #[test]
    fn test_failed_signature_does_not_burn_challenge() {
        let cache: Arc<dyn ReplayCache> = Arc::new(ChallengeReplayCache::new(100));
        let failing = AuthGateway::new(
            ChallengeCodec::new(APP_SECRET, Duration::from_secs(300)),
            Arc::new(FailingRecovery),
            SessionIssuer::new(SESSION_SECRET, Duration::from_secs(60)),
        )
        .with_replay_cache(Arc::clone(&cache));

        let signed = SignedChallenge {
            challenge: failing.begin_login(),
            signature: "0xsig".to_string(),
        };
        assert!(failing.complete_login(&signed).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_without_replay_cache_challenge_reusable() {
        let gateway = AuthGateway::new(
            ChallengeCodec::new(APP_SECRET, Duration::from_secs(300)),
            Arc::new(FixedRecovery("0xABC")),
            SessionIssuer::new(SESSION_SECRET, Duration::from_secs(60)),
        );
        let signed = SignedChallenge {
            challenge: gateway.begin_login(),
            signature: "0xsig".to_string(),
        };

        assert!(gateway.complete_login(&signed).is_ok());
        assert!(gateway.complete_login(&signed).is_ok());
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            SignedChallenge::from_parts(None, Some("sig".to_string())),
            Err(LoginError::MalformedInput("originalMessage"))
        ));
        assert!(matches!(
            SignedChallenge::from_parts(Some("c".to_string()), Some(String::new())),
            Err(LoginError::MalformedInput("signedMessage"))
        ));
        assert_eq!(
            LoginError::MalformedInput("originalMessage").to_string(),
            "originalMessage required"
        );
    }

    #[test]
    fn test_authenticate_request_outcomes() {
        let gateway = gateway();
        assert_eq!(
            gateway.authenticate_request(None),
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            gateway.authenticate_request(Some("")),
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            gateway.authenticate_request(Some("garbage")),
            Err(AuthError::InvalidSession(SessionError::Malformed))
        );
    }

    #[test]
    fn test_upgrade_with_expired_session_is_anonymous() {
        let gateway = gateway();
        let issuer = SessionIssuer::new(SESSION_SECRET, Duration::from_secs(60));
        let expired = issuer
            .mint_at("0xABC", crate::auth::unix_seconds() - 3600)
            .unwrap();

        assert_eq!(gateway.authenticate_upgrade(Some(&expired.token)), None);
        assert_eq!(gateway.authenticate_upgrade(None), None);

        let live = issuer.mint("0xABC").unwrap();
        assert_eq!(
            gateway.authenticate_upgrade(Some(&live.token)),
            Some("0xABC".to_string())
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let gateway = gateway();
        let session = SessionIssuer::new(SESSION_SECRET, Duration::from_secs(2_592_000))
            .mint("0xABC")
            .unwrap();

        let insecure = gateway.session_cookie(&session).to_string();
        assert!(insecure.starts_with(&format!("authorization={}", session.token)));
        assert!(insecure.contains("HttpOnly"));
        assert!(insecure.contains("Max-Age=2592000"));
        assert!(!insecure.contains("Secure"));
        assert!(!insecure.contains("SameSite"));

        let secure = gateway.with_secure_cookies(true).session_cookie(&session).to_string();
        assert!(secure.contains("Secure"));
        assert!(secure.contains("SameSite=Strict"));
    }

    #[test]
    fn test_logout_cookie_clears_session() {
        let cookie = gateway().logout().to_string();
        assert!(cookie.starts_with("authorization=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
    }
}
