//! TOML configuration shared by `test-server` and `test-client`.
//!
//! Every section has compiled-in defaults, so an empty file (or no file at all)
//! yields a working setup. Command-line flags are applied on top by the
//! binaries after loading.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transfer::MAX_BUFFER_SIZE;

/// Environment variable naming a config file to load when `--config` is absent.
pub const CONFIG_ENV: &str = "P2PBENCH_CONFIG";

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("stream count must be at least 1")]
    ZeroStreams,

    #[error("copy buffer size must be greater than zero")]
    ZeroBufferSize,

    #[error("copy buffer size {size} exceeds the maximum of {max} bytes")]
    BufferTooLarge { size: usize, max: usize },

    #[error("at least one transport (tcp or quic) must be enabled")]
    NoTransport,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for both benchmark binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded benchmark configuration");
        Ok(config)
    }

    /// Resolve the configuration, in order:
    /// 1. `explicit` (from `--config`); failure to load it is an error.
    /// 2. The path in the `P2PBENCH_CONFIG` environment variable.
    /// 3. Compiled-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "{CONFIG_ENV} set but file could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file given, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Check cross-field constraints after CLI overrides have been applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.streams == 0 {
            return Err(ConfigError::ZeroStreams);
        }
        if self.transfer.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        if self.transfer.buffer_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::BufferTooLarge {
                size: self.transfer.buffer_size,
                max: MAX_BUFFER_SIZE,
            });
        }
        if !self.network.tcp && !self.network.quic {
            return Err(ConfigError::NoTransport);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Node key storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Raw 32-byte Ed25519 secret key. When unset, every run gets a fresh
    /// ephemeral peer ID.
    pub key_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Listener and dial settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the server binds on.
    pub listen_ip: IpAddr,
    /// Port shared by the TCP and QUIC (UDP) listeners.
    pub port: u16,
    /// Listen on TCP (noise + yamux).
    pub tcp: bool,
    /// Listen on QUIC v1.
    pub quic: bool,
    /// Upper bound on connecting and opening streams (client).
    pub connect_timeout_secs: u64,
    /// How long a connection with no open streams is kept around.
    pub idle_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 4001,
            tcp: true,
            quic: true,
            connect_timeout_secs: 60,
            idle_timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

/// What gets moved and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// File the server streams to every requester.
    pub file: PathBuf,
    /// Parallel download streams opened by the client.
    pub streams: usize,
    /// Size of the per-stream copy buffer, in bytes.
    pub buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data"),
            streams: 1,
            buffer_size: 64 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = BenchConfig::default();

        assert!(cfg.identity.key_path.is_none());

        assert_eq!(cfg.network.listen_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(cfg.network.port, 4001);
        assert!(cfg.network.tcp);
        assert!(cfg.network.quic);
        assert_eq!(cfg.network.connect_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.network.idle_timeout(), Duration::from_secs(60));

        assert_eq!(cfg.transfer.file, PathBuf::from("data"));
        assert_eq!(cfg.transfer.streams, 1);
        assert_eq!(cfg.transfer.buffer_size, 65536);

        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);

        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[identity]
key_path = "/var/lib/p2pbench/node.key"

[network]
listen_ip = "127.0.0.1"
port = 5001
tcp = true
quic = false
connect_timeout_secs = 5
idle_timeout_secs = 30

[transfer]
file = "/srv/bench/1G.bin"
streams = 8
buffer_size = 1048576

[logging]
level = "debug"
json = true
"#;

        let cfg: BenchConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(
            cfg.identity.key_path,
            Some(PathBuf::from("/var/lib/p2pbench/node.key"))
        );
        assert_eq!(cfg.network.listen_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(cfg.network.port, 5001);
        assert!(!cfg.network.quic);
        assert_eq!(cfg.network.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.transfer.file, PathBuf::from("/srv/bench/1G.bin"));
        assert_eq!(cfg.transfer.streams, 8);
        assert_eq!(cfg.transfer.buffer_size, 1_048_576);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[transfer]
streams = 4
"#;

        let cfg: BenchConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.transfer.streams, 4);
        assert_eq!(cfg.transfer.file, PathBuf::from("data"));
        assert_eq!(cfg.network.port, 4001);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: BenchConfig = toml::from_str("").unwrap();
        let defaults = BenchConfig::default();

        assert_eq!(cfg.network.port, defaults.network.port);
        assert_eq!(cfg.transfer.buffer_size, defaults.transfer.buffer_size);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = BenchConfig::default();
        cfg.transfer.streams = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroStreams));

        let mut cfg = BenchConfig::default();
        cfg.transfer.buffer_size = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroBufferSize));

        let mut cfg = BenchConfig::default();
        cfg.network.tcp = false;
        cfg.network.quic = false;
        assert_eq!(cfg.validate(), Err(ConfigError::NoTransport));
    }

    #[test]
    fn test_validate_caps_buffer_size() {
        let mut cfg = BenchConfig::default();
        cfg.transfer.buffer_size = MAX_BUFFER_SIZE;
        assert!(cfg.validate().is_ok());

        cfg.transfer.buffer_size = usize::MAX;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::BufferTooLarge {
                size: usize::MAX,
                max: MAX_BUFFER_SIZE,
            })
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("p2pbench.toml");
        std::fs::write(&path, "[network]\nport = 9999\n").unwrap();

        let cfg = BenchConfig::load(&path).unwrap();
        assert_eq!(cfg.network.port, 9999);

        let cfg = BenchConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(cfg.network.port, 9999);
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        let missing = Path::new("/nonexistent/path/p2pbench.toml");
        assert!(BenchConfig::load(missing).is_err());
        assert!(BenchConfig::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = BenchConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let roundtripped: BenchConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(cfg.network.port, roundtripped.network.port);
        assert_eq!(cfg.transfer.buffer_size, roundtripped.transfer.buffer_size);
    }
}
