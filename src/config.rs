// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Configuration loaded from `luxlink.toml`.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::protocol::*;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Where the projector lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub host: String,
    /// UDP port for command records and their replies.
    pub command_port: u16,
    /// UDP port for image and sequencer program datagrams.
    pub data_port: u16,
    /// Command reply timeout in milliseconds.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Repair bursts before a persisting gap fails the transfer.
    pub max_repairs: u32,
    /// Lines per raw image packet.
    pub lines_per_packet: usize,
    /// Sequencer program chunk size in bytes.
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn" or "error", or any EnvFilter directive.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            command_port: DEFAULT_COMMAND_PORT,
            data_port: DEFAULT_DATA_PORT,
            timeout_ms: DEFAULT_TIMEOUT_SECS * 1000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_repairs: 3,
            lines_per_packet: 6,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::debug!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("command_port = 52985"));
        assert!(text.contains("max_repairs"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str("[transport]\nhost = \"10.0.0.2\"\n").unwrap();
        assert_eq!(parsed.transport.host, "10.0.0.2");
        assert_eq!(parsed.transport.data_port, 52986);
        assert_eq!(parsed.transport.timeout(), Duration::from_secs(10));
        assert_eq!(parsed.session, SessionConfig::default());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/luxlink.toml"));
        assert_eq!(cfg.transport, TransportConfig::default());
    }

    #[test]
    fn invalid_file_uses_defaults() {
        let path = std::env::temp_dir().join("luxlink_invalid_config.toml");
        std::fs::write(&path, "transport = 5").unwrap();
        let cfg = Config::load(&path);
        assert_eq!(cfg.logging.level, "info");
        std::fs::remove_file(&path).ok();
    }
}
