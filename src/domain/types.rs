//! Core domain types

use serde::{Deserialize, Serialize};

/// Information about a serial port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub name: String,
    pub port_type: String,
    /// This is the port the driver is configured to open
    #[serde(default)]
    pub configured: bool,
}
