//! Driver configuration
//!
//! Fixed for the lifetime of a driver: the port name and baud rate are read
//! once at construction and never renegotiated. Stored as pretty JSON so a
//! cabinet can ship its own profile next to the executable.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LightgunError, LightgunResult};

/// Serial and logging settings for one lightgun
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightgunConfig {
    /// Serial device name (e.g. "COM4", "/dev/ttyACM0")
    pub port_name: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Per-read timeout on the serial handle, in milliseconds
    pub read_timeout_ms: u64,
    /// How long the reader idles when no bytes are waiting, in milliseconds
    pub poll_interval_ms: u64,
    /// Emit open/close lifecycle lines at info level
    pub log_debug_messages: bool,
}

impl Default for LightgunConfig {
    fn default() -> Self {
        Self {
            port_name: "COM4".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 100,
            poll_interval_ms: 5,
            log_debug_messages: false,
        }
    }
}

impl LightgunConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> LightgunResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            LightgunError::Config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            LightgunError::Config(format!("Failed to parse config '{}': {e}", path.display()))
        })
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> LightgunResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LightgunError::Config(format!("Serialization error: {e}")))?;
        std::fs::write(path, json).map_err(|e| {
            LightgunError::Config(format!("Failed to write config '{}': {e}", path.display()))
        })
    }
}
