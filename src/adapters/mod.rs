//! Adapters implementing the port traits

pub mod mock_serial;
pub mod serial_port;
