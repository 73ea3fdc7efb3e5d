//! Configuration.
//!
//! One `SyncConfig` is shared by host and client. It loads from JSON; binaries layer CLI flags
//! on top.

use std::{fmt, path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::world::{PlayerId, MAX_PLAYERS};

/// Root configuration shared by host/client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Host endpoint, e.g. `localhost:8080`. The host listens here and clients dial it.
    pub server_addr: String,
    /// WebSocket path.
    #[serde(default = "default_path")]
    pub path: String,
    /// Local player id. 0 is the host.
    #[serde(default)]
    pub player_id: u8,
    /// Client sync rounds per second.
    #[serde(default = "default_hz")]
    pub tick_hz: u32,
    /// Frontend frames per second.
    #[serde(default = "default_hz")]
    pub frame_hz: u32,
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
    /// How long the host waits for a silent client before dropping it. `None` waits forever.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

fn default_path() -> String {
    "/player".to_string()
}

fn default_hz() -> u32 {
    60
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_addr: "localhost:8080".to_string(),
            path: default_path(),
            player_id: 0,
            tick_hz: default_hz(),
            frame_hz: default_hz(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            idle_timeout_ms: None,
        }
    }
}

/// Read/write deadlines for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Option<Duration>,
    pub write: Duration,
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    PlayerIdOutOfRange(u8),
    ZeroRate(&'static str),
    BadPath(String),
    EmptyAddr,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PlayerIdOutOfRange(id) => {
                write!(f, "player_id {id} outside 0..{MAX_PLAYERS}")
            }
            ConfigError::ZeroRate(field) => write!(f, "{field} must be greater than zero"),
            ConfigError::BadPath(p) => write!(f, "path {p:?} must start with '/'"),
            ConfigError::EmptyAddr => write!(f, "server_addr is empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SyncConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_addr.trim().is_empty() {
            return Err(ConfigError::EmptyAddr);
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::BadPath(self.path.clone()));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::ZeroRate("tick_hz"));
        }
        if self.frame_hz == 0 {
            return Err(ConfigError::ZeroRate("frame_hz"));
        }
        self.local_player()?;
        Ok(())
    }

    pub fn local_player(&self) -> Result<PlayerId, ConfigError> {
        PlayerId::new(self.player_id).ok_or(ConfigError::PlayerIdOutOfRange(self.player_id))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_hz.max(1)))
    }

    /// Deadlines for a client connection; always bounded.
    pub fn client_timeouts(&self) -> Timeouts {
        Timeouts {
            read: Some(Duration::from_millis(self.read_timeout_ms)),
            write: Duration::from_millis(self.write_timeout_ms),
        }
    }

    /// Deadlines for a host-side connection; reads wait for `idle_timeout_ms`.
    pub fn host_timeouts(&self) -> Timeouts {
        Timeouts {
            read: self.idle_timeout_ms.map(Duration::from_millis),
            write: Duration::from_millis(self.write_timeout_ms),
        }
    }

    /// `ws://` URL clients dial.
    pub fn player_url(&self) -> String {
        format!("ws://{}{}", self.server_addr, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = SyncConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.player_url(), "ws://localhost:8080/player");
        assert_eq!(cfg.host_timeouts().read, None);
        assert_eq!(cfg.client_timeouts().read, Some(Duration::from_secs(5)));
    }

    #[test]
    fn json_fills_defaults() {
        let cfg = SyncConfig::from_json_str(r#"{"server_addr":"10.0.0.2:9000","player_id":2}"#)
            .unwrap();
        assert_eq!(cfg.path, "/player");
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.local_player().unwrap(), PlayerId::new(2).unwrap());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = SyncConfig {
            player_id: 4,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::PlayerIdOutOfRange(4)));

        let cfg = SyncConfig {
            tick_hz: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroRate("tick_hz")));

        let cfg = SyncConfig {
            path: "player".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::BadPath(_))));
    }

    #[test]
    fn tick_interval_from_hz() {
        let cfg = SyncConfig {
            tick_hz: 50,
            ..Default::default()
        };
        assert_eq!(cfg.tick_interval(), Duration::from_millis(20));
    }
}
