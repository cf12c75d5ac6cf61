//! Configuration for the producer daemon.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use deskcast_core::StreamServerConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Streaming / send-loop settings.
    pub stream: StreamConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP address to listen on for consumers.
    pub listen_addr: String,
}

/// Streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Re-poll interval in milliseconds while the canvas is unchanged.
    pub idle_poll_ms: u64,
    /// Interval in seconds between no-change heartbeats.
    pub heartbeat_secs: u64,
    /// zstd compression level for outgoing messages.
    pub compression_level: i32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7399".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 720,
            idle_poll_ms: 100,
            heartbeat_secs: 5,
            compression_level: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
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

    /// Convert streaming settings into a [`StreamServerConfig`].
    pub fn to_stream_config(&self) -> StreamServerConfig {
        StreamServerConfig {
            idle_poll: Duration::from_millis(self.stream.idle_poll_ms.max(1)),
            heartbeat_interval: Duration::from_secs(self.stream.heartbeat_secs.max(1)),
            compression_level: self.stream.compression_level,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("listen_addr"));
        assert!(text.contains("canvas_width"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.listen_addr, "0.0.0.0:7399");
        assert_eq!(parsed.stream.canvas_width, 1280);
    }

    #[test]
    fn to_stream_config_floors_intervals() {
        let mut cfg = ServerConfig::default();
        cfg.stream.idle_poll_ms = 0;
        cfg.stream.heartbeat_secs = 0;
        let sc = cfg.to_stream_config();
        assert_eq!(sc.idle_poll, Duration::from_millis(1));
        assert_eq!(sc.heartbeat_interval, Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: ServerConfig = toml::from_str("[stream]\ncanvas_width = 640\n").unwrap();
        assert_eq!(cfg.stream.canvas_width, 640);
        assert_eq!(cfg.stream.canvas_height, 720);
        assert_eq!(cfg.logging.level, "info");
    }
}
