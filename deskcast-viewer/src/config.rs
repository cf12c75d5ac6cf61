//! Configuration for the consumer daemon.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use deskcast_core::SessionConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Producer connection settings.
    pub network: NetworkConfig,
    /// Local HTTP pull-endpoint settings.
    pub http: HttpConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Producer connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address of the producer to connect to.
    pub server_addr: String,
    /// Seconds of producer silence before the session is declared
    /// stalled and reconnected.
    pub stall_timeout_secs: u64,
    /// Upper bound in seconds for the reconnect backoff.
    pub reconnect_max_secs: u64,
}

/// HTTP pull-endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the `GET /frame` endpoint listens on.
    pub listen_addr: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:7399".into(),
            stall_timeout_secs: 15,
            reconnect_max_secs: 10,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3006".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert connection settings into a [`SessionConfig`].
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            stall_timeout: Duration::from_secs(self.network.stall_timeout_secs.max(1)),
        }
    }

    /// Upper bound for the reconnect backoff.
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.network.reconnect_max_secs.max(1))
    }
}

// ── Tests ────────────────────────────────────────────────────────
