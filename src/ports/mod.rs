//! Port traits (interfaces)
//!
//! These traits define the boundary between the driver and the serial device.
//! Adapters implement them to connect to real hardware or an in-process mock.

pub mod serial;

pub use serial::*;
