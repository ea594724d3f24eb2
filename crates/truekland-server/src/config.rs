//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use truekland_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, MAX_UPLOAD_SIZE};
use truekland_shared::sanitize::normalize_email;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./truekland.db`
    pub database_path: PathBuf,

    /// Directory where uploaded images are stored.
    /// Env: `UPLOAD_STORAGE_PATH`
    /// Default: `./uploads`
    pub upload_storage_path: PathBuf,

    /// Maximum image size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 5 MiB
    pub max_upload_size: usize,

    /// Ed25519 seed used to sign session tokens (hex-encoded, 64 chars).
    /// Env: `SESSION_SIGNING_KEY`
    /// Default: `None`, a random key is generated at startup and every
    /// session ends with the process.
    pub session_signing_key: Option<[u8; 32]>,

    /// Session lifetime in hours.
    /// Env: `SESSION_TTL_HOURS`
    /// Default: `168`
    pub session_ttl_hours: i64,

    /// Accounts with these emails are administrators.
    /// Env: `ADMIN_EMAILS` (comma separated)
    /// Default: empty
    pub admin_emails: Vec<String>,

    /// When true, new posts stay hidden until an admin authorizes them.
    /// Env: `POSTS_REQUIRE_APPROVAL` (true/false)
    /// Default: `false`
    pub posts_require_approval: bool,

    /// Whether new accounts can be created.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"TrueKland"`
    pub instance_name: String,

    /// Per-IP sustained request rate and burst.
    /// Env: `RATE_LIMIT_PER_SEC`, `RATE_LIMIT_BURST`
    /// Default: 10 req/s, burst 30
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: f64,
}

// The signing seed must never reach the logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("upload_storage_path", &self.upload_storage_path)
            .field("max_upload_size", &self.max_upload_size)
            .field("session_signing_key", &self.session_signing_key.map(|_| "<set>"))
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("admin_emails", &self.admin_emails)
            .field("posts_require_approval", &self.posts_require_approval)
            .field("registration_open", &self.registration_open)
            .field("instance_name", &self.instance_name)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./truekland.db"),
            upload_storage_path: PathBuf::from("./uploads"),
            max_upload_size: MAX_UPLOAD_SIZE,
            session_signing_key: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            admin_emails: Vec::new(),
            posts_require_approval: false,
            registration_open: true,
            instance_name: "TrueKland".to_string(),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = get("UPLOAD_STORAGE_PATH") {
            config.upload_storage_path = PathBuf::from(path);
        }

        if let Some(val) = get("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(hex_key) = get("SESSION_SIGNING_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.session_signing_key = Some(key),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid SESSION_SIGNING_KEY, generating an ephemeral key"
                    );
                }
            }
        }

        if let Some(val) = get("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(h) if h > 0 => config.session_ttl_hours = h,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_HOURS, using default"),
            }
        }

        if let Some(list) = get("ADMIN_EMAILS") {
            config.admin_emails = list
                .split(',')
                .map(normalize_email)
                .filter(|e| !e.is_empty())
                .collect();
        }

        if let Some(val) = get("POSTS_REQUIRE_APPROVAL") {
            config.posts_require_approval = parse_flag(&val);
        }

        if let Some(val) = get("REGISTRATION_OPEN") {
            config.registration_open = parse_flag(&val);
        }

        if let Some(name) = get("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = get("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(r) if r.is_finite() && r > 0.0 => config.rate_limit_per_sec = r,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = get("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(b) if b.is_finite() && b >= 1.0 => config.rate_limit_burst = b,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Whether an already-normalized email belongs to an administrator.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e == email)
    }
}

fn parse_flag(val: &str) -> bool {
    let val = val.trim();
    !(val.eq_ignore_ascii_case("false") || val == "0")
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_key(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex.len()));
    }

    let bytes = hex::decode(hex).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.session_signing_key.is_none());
        assert!(config.registration_open);
        assert!(!config.posts_require_approval);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let key = "ab".repeat(32);
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("SESSION_SIGNING_KEY", key.as_str()),
            ("ADMIN_EMAILS", " Root@Example.com , ,mod@example.com"),
            ("POSTS_REQUIRE_APPROVAL", "true"),
            ("REGISTRATION_OPEN", "0"),
            ("SESSION_TTL_HOURS", "2"),
        ]));

        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.session_signing_key, Some([0xab; 32]));
        assert_eq!(config.admin_emails, vec!["root@example.com", "mod@example.com"]);
        assert!(config.is_admin_email("root@example.com"));
        assert!(config.posts_require_approval);
        assert!(!config.registration_open);
        assert_eq!(config.session_ttl_hours, 2);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("SESSION_SIGNING_KEY", "abcd"),
            ("MAX_UPLOAD_SIZE", "-5"),
            ("RATE_LIMIT_BURST", "0"),
        ]));
        let defaults = ServerConfig::default();

        assert_eq!(config.http_addr, defaults.http_addr);
        assert!(config.session_signing_key.is_none());
        assert_eq!(config.max_upload_size, defaults.max_upload_size);
        assert_eq!(config.rate_limit_burst, defaults.rate_limit_burst);
    }

    #[test]
    fn test_parse_hex_key() {
        assert_eq!(parse_hex_key(&"ab".repeat(32)).unwrap(), [0xab; 32]);
        assert!(parse_hex_key("abcd").is_err());
        assert!(parse_hex_key(&"zz".repeat(32)).is_err());
    }
}
