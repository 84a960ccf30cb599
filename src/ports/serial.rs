//! Serial port traits
//!
//! Split into two traits:
//! - `SerialFactory` — lists and opens ports
//! - `SerialConnection` — instance methods for reading/writing data
//!
//! The factory takes `&self` so test doubles can carry their own state.

use std::time::Duration;

use crate::domain::{LightgunResult, SerialPortInfo};

/// Factory for creating serial connections.
pub trait SerialFactory: Send {
    /// List available serial ports on the system
    fn list_ports(&self) -> LightgunResult<Vec<SerialPortInfo>>;

    /// Open a serial port at the given baud rate, returning a boxed connection.
    /// Reads on the returned connection must give up after `read_timeout`.
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> LightgunResult<Box<dyn SerialConnection>>;
}

/// Trait for an open serial port connection.
/// Only requires `Send` (not `Sync`) — each handle is owned by one thread.
pub trait SerialConnection: Send {
    /// Write bytes to the port
    fn write(&mut self, data: &[u8]) -> LightgunResult<usize>;

    /// Number of bytes waiting in the receive buffer
    fn bytes_to_read(&self) -> LightgunResult<u32>;

    /// Read bytes from the port (bounded by the read timeout)
    fn read(&mut self, buffer: &mut [u8]) -> LightgunResult<usize>;

    /// A second handle onto the same port, used by the background reader
    fn try_clone(&self) -> LightgunResult<Box<dyn SerialConnection>>;

    /// Close the connection
    fn close(&mut self) -> LightgunResult<()>;

    /// Check if the port is still connected
    fn is_connected(&self) -> bool;
}
