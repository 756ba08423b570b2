//! Configuration for the keyring and the keyserver client.
//!
//! [`KeyrackConfig`] is loaded from TOML once at process start and the
//! resulting [`KeyStore`](crate::KeyStore) and
//! [`KeyServerClient`](crate::KeyServerClient) are handed to every consumer.
//!
//! # Example
//!
//! ```
//! use keyrack::KeyrackConfig;
//!
//! let config = KeyrackConfig::from_toml_str(r#"
//!     [keystore]
//!     path = "/var/lib/app/keyring.db"
//!     busy_timeout = "5s"
//!
//!     [keyserver]
//!     url = "hkps://keys.openpgp.org"
//!     timeout = "20s"
//! "#).unwrap();
//!
//! assert_eq!(config.keyserver.timeout.as_secs(), 20);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default keyserver.
pub const DEFAULT_KEYSERVER: &str = "hkps://keys.openpgp.org";

/// Default keyserver request timeout (30 seconds).
const DEFAULT_KEYSERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default SQLite busy timeout (5 seconds).
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyrackConfig {
    /// Local keyring settings.
    #[serde(default)]
    pub keystore: KeyStoreConfig,

    /// Keyserver settings.
    #[serde(default)]
    pub keyserver: KeyServerConfig,
}

/// Local keyring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyStoreConfig {
    /// Path to the SQLite keyring. `None` keeps the keyring in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long to wait for a lock held by another connection before
    /// failing with `StoreUnavailable`.
    #[serde(with = "humantime_serde", default = "default_busy_timeout")]
    pub busy_timeout: Duration,
}

/// Keyserver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyServerConfig {
    /// Keyserver URL (`hkp://`, `hkps://`, `http://` or `https://`).
    #[serde(default = "default_keyserver")]
    pub url: String,

    /// Per-request timeout.
    #[serde(with = "humantime_serde", default = "default_keyserver_timeout")]
    pub timeout: Duration,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_busy_timeout() -> Duration {
    DEFAULT_BUSY_TIMEOUT
}

fn default_keyserver() -> String {
    DEFAULT_KEYSERVER.to_string()
}

fn default_keyserver_timeout() -> Duration {
    DEFAULT_KEYSERVER_TIMEOUT
}

fn default_user_agent() -> String {
    concat!("keyrack/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: default_busy_timeout(),
        }
    }
}

impl Default for KeyServerConfig {
    fn default() -> Self {
        Self {
            url: default_keyserver(),
            timeout: default_keyserver_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl KeyServerConfig {
    /// Settings for the given keyserver URL with default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Replace the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the URL scheme and timeout.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("keyserver timeout must be non-zero".to_string()));
        }
        self.base_url().map(|_| ())
    }

    /// The keyserver URL translated to plain HTTP(S), without trailing slash.
    ///
    /// `hkp://host` becomes `http://host:11371`, `hkps://host` becomes
    /// `https://host`.
    pub fn base_url(&self) -> Result<String> {
        let url = self.url.trim().trim_end_matches('/');
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("keyserver URL has no scheme: {}", self.url)))?;

        if rest.is_empty() {
            return Err(Error::Config(format!("keyserver URL has no host: {}", self.url)));
        }

        match scheme.to_lowercase().as_str() {
            "hkp" => {
                if has_port(rest) {
                    Ok(format!("http://{}", rest))
                } else {
                    Ok(format!("http://{}:11371", rest))
                }
            }
            "hkps" | "https" => Ok(format!("https://{}", rest)),
            "http" => Ok(format!("http://{}", rest)),
            other => Err(Error::Config(format!(
                "unsupported keyserver scheme: {}",
                other
            ))),
        }
    }
}

/// Whether the authority part of `host_and_path` carries an explicit port.
fn has_port(host_and_path: &str) -> bool {
    let authority = host_and_path.split('/').next().unwrap_or(host_and_path);
    match authority.rsplit_once(':') {
        // IPv6 literal without port, e.g. "[::1]"
        Some((host, _)) if authority.ends_with(']') && host.starts_with('[') => false,
        Some((_, port)) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

impl KeyrackConfig {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: KeyrackConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.keyserver.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}
