use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

/// Minimum length of each server secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 2_592_000;
pub const DEFAULT_UPGRADE_AUTH_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_REPLAY_CLEANUP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REPLAY_MAX_ENTRIES: usize = 100_000;

/// How login failures are reported over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatusMode {
    /// `200 OK` with an `error` field.
    AlwaysOk,
    /// Conventional 4xx/5xx status codes with an `error` field.
    StatusCodes,
}

impl FromStr for ErrorStatusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(ErrorStatusMode::AlwaysOk),
            "status" => Ok(ErrorStatusMode::StatusCodes),
            _ => Err(format!("expected 'ok' or 'status', got '{}'", s)),
        }
    }
}

/// What to do with a connection upgrade that carries no valid session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePolicy {
    /// Upgrade anyway; the connection runs without an identity.
    AllowAnonymous,
    /// Answer 401 instead of switching protocols.
    RequireIdentity,
}

impl FromStr for UpgradePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" => Ok(UpgradePolicy::AllowAnonymous),
            "require" => Ok(UpgradePolicy::RequireIdentity),
            _ => Err(format!("expected 'anonymous' or 'require', got '{}'", s)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    // Secrets
    pub app_secret: Zeroizing<String>,
    pub session_secret: Zeroizing<String>,

    // Server
    pub bind_addr: SocketAddr,

    // TTLs (in seconds)
    pub challenge_ttl_secs: u64,
    pub session_ttl_secs: u64,

    // Transport
    pub use_ssl: bool,
    pub error_status_mode: ErrorStatusMode,

    // Connection upgrades
    pub upgrade_policy: UpgradePolicy,
    pub upgrade_auth_timeout_ms: u64,

    // Replay protection
    pub replay_protection: bool,
    pub replay_cleanup_interval_secs: u64,
    pub replay_max_entries: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_secret", &"[REDACTED]")
            .field("session_secret", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("challenge_ttl_secs", &self.challenge_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("use_ssl", &self.use_ssl)
            .field("error_status_mode", &self.error_status_mode)
            .field("upgrade_policy", &self.upgrade_policy)
            .field("upgrade_auth_timeout_ms", &self.upgrade_auth_timeout_ms)
            .field("replay_protection", &self.replay_protection)
            .field(
                "replay_cleanup_interval_secs",
                &self.replay_cleanup_interval_secs,
            )
            .field("replay_max_entries", &self.replay_max_entries)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Configuration with the given secrets and every other setting at its default.
    pub fn with_secrets(app_secret: &str, session_secret: &str) -> Self {
        Config {
            app_secret: Zeroizing::new(app_secret.to_string()),
            session_secret: Zeroizing::new(session_secret.to_string()),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            use_ssl: false,
            error_status_mode: ErrorStatusMode::AlwaysOk,
            upgrade_policy: UpgradePolicy::AllowAnonymous,
            upgrade_auth_timeout_ms: DEFAULT_UPGRADE_AUTH_TIMEOUT_MS,
            replay_protection: true,
            replay_cleanup_interval_secs: DEFAULT_REPLAY_CLEANUP_INTERVAL_SECS,
            replay_max_entries: DEFAULT_REPLAY_MAX_ENTRIES,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let app_secret = required_secret("APP_SECRET")?;
        let session_secret = required_secret("SESSION_SECRET")?;

        if app_secret.as_str() == session_secret.as_str() {
            return Err(ConfigError::InvalidValue(
                "SESSION_SECRET".to_string(),
                "must differ from APP_SECRET".to_string(),
            ));
        }

        // Server
        let bind_addr_str =
            env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        // TTLs
        let challenge_ttl_secs =
            parse_env_or_default("CHALLENGE_TTL_SECS", DEFAULT_CHALLENGE_TTL_SECS)?;
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;

        // Transport
        let use_ssl = parse_env_or_default("USE_SSL", false)?;
        let error_status_mode =
            parse_env_or_default("ERROR_STATUS_MODE", ErrorStatusMode::AlwaysOk)?;

        // Connection upgrades
        let upgrade_policy = parse_env_or_default("UPGRADE_POLICY", UpgradePolicy::AllowAnonymous)?;
        let upgrade_auth_timeout_ms =
            parse_env_or_default("UPGRADE_AUTH_TIMEOUT_MS", DEFAULT_UPGRADE_AUTH_TIMEOUT_MS)?;

        // Replay protection
        let replay_protection = parse_env_or_default("REPLAY_PROTECTION", true)?;
        let replay_cleanup_interval_secs = parse_env_or_default(
            "REPLAY_CLEANUP_INTERVAL_SECS",
            DEFAULT_REPLAY_CLEANUP_INTERVAL_SECS,
        )?;
        let replay_max_entries =
            parse_env_or_default("REPLAY_MAX_ENTRIES", DEFAULT_REPLAY_MAX_ENTRIES)?;

        for (key, value) in [
            ("CHALLENGE_TTL_SECS", challenge_ttl_secs),
            ("SESSION_TTL_SECS", session_ttl_secs),
            ("UPGRADE_AUTH_TIMEOUT_MS", upgrade_auth_timeout_ms),
            ("REPLAY_CLEANUP_INTERVAL_SECS", replay_cleanup_interval_secs),
            ("REPLAY_MAX_ENTRIES", replay_max_entries as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }

        Ok(Config {
            app_secret,
            session_secret,
            bind_addr,
            challenge_ttl_secs,
            session_ttl_secs,
            use_ssl,
            error_status_mode,
            upgrade_policy,
            upgrade_auth_timeout_ms,
            replay_protection,
            replay_cleanup_interval_secs,
            replay_max_entries,
        })
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn upgrade_auth_timeout(&self) -> Duration {
        Duration::from_millis(self.upgrade_auth_timeout_ms)
    }

    pub fn replay_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.replay_cleanup_interval_secs)
    }
}

/// Read a required secret and enforce the minimum length.
fn required_secret(key: &str) -> Result<Zeroizing<String>, ConfigError> {
    let value = Zeroizing::new(env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))?);

    if value.is_empty() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "cannot be empty".to_string(),
        ));
    }
    if value.len() < MIN_SECRET_LEN {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at least {} bytes", MIN_SECRET_LEN),
        ));
    }

    Ok(value)
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
