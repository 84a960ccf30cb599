//! Serial port adapter using the `serialport` crate
//!
//! Implements `SerialFactory` and `SerialConnection` traits.
//! `SerialPortFactory` has no instance data; it only lists and opens ports.
//!
//! A handle marks itself disconnected when an I/O error says the device is
//! gone (USB cable pulled, adapter reset), so the driver stops writing to it.

use std::cell::Cell;
use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPortType;

use crate::domain::{LightgunError, LightgunResult, SerialPortInfo};
use crate::ports::{SerialConnection, SerialFactory};

/// Zero-sized factory for creating serial port connections.
pub struct SerialPortFactory;

impl SerialFactory for SerialPortFactory {
    fn list_ports(&self) -> LightgunResult<Vec<SerialPortInfo>> {
        let ports = serialport::available_ports()
            .map_err(|e| LightgunError::Serial(format!("Failed to list ports: {e}")))?;

        Ok(ports
            .into_iter()
            .map(|p| SerialPortInfo {
                port_type: describe_port_type(&p.port_type),
                name: p.port_name,
                configured: false,
            })
            .collect())
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> LightgunResult<Box<dyn SerialConnection>> {
        let serial = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| LightgunError::Serial(format!("Failed to open {port}: {e}")))?;

        Ok(Box::new(SerialPortConnection::new(serial)))
    }
}

/// Guns enumerate as USB CDC devices; show the product string when the OS
/// reports one so the right port is easy to pick.
fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => match &info.product {
            Some(product) => format!("USB {product} ({:04X}:{:04X})", info.vid, info.pid),
            None => format!("USB ({:04X}:{:04X})", info.vid, info.pid),
        },
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "Native".to_string(),
    }
}

/// Errors after which the handle is no good and the device must be reopened.
fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

/// An open serial port connection wrapping the `serialport` crate.
/// The OS handle is released when `close` drops it.
pub struct SerialPortConnection {
    port: Option<Box<dyn serialport::SerialPort>>,
    device_present: Cell<bool>,
}

impl SerialPortConnection {
    fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            port: Some(port),
            device_present: Cell::new(true),
        }
    }

    fn port_mut(&mut self) -> LightgunResult<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| LightgunError::Serial("Port is closed".to_string()))
    }

    fn io_error(&self, context: &str, e: io::Error) -> LightgunError {
        if is_disconnect(e.kind()) {
            self.device_present.set(false);
        }
        LightgunError::Serial(format!("{context}: {e}"))
    }
}

impl SerialConnection for SerialPortConnection {
    fn write(&mut self, data: &[u8]) -> LightgunResult<usize> {
        let port = self.port_mut()?;
        let result = port.write_all(data).and_then(|()| port.flush());
        result.map_err(|e| self.io_error("Write failed", e))?;
        Ok(data.len())
    }

    fn bytes_to_read(&self) -> LightgunResult<u32> {
        let Some(port) = &self.port else {
            return Ok(0);
        };
        port.bytes_to_read().map_err(|e| {
            let gone = match e.kind() {
                serialport::ErrorKind::NoDevice => true,
                serialport::ErrorKind::Io(kind) => is_disconnect(kind),
                _ => false,
            };
            if gone {
                self.device_present.set(false);
            }
            LightgunError::Serial(format!("Failed to poll input buffer: {e}"))
        })
    }

    fn read(&mut self, buffer: &mut [u8]) -> LightgunResult<usize> {
        let result = self.port_mut()?.read(buffer);
        match result {
            Ok(n) => Ok(n),
            // A timeout just means nothing arrived in time
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(self.io_error("Read failed", e)),
        }
    }

    fn try_clone(&self) -> LightgunResult<Box<dyn SerialConnection>> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| LightgunError::Serial("Port is closed".to_string()))?;
        let clone = port
            .try_clone()
            .map_err(|e| LightgunError::Serial(format!("Failed to clone port: {e}")))?;
        Ok(Box::new(SerialPortConnection::new(clone)))
    }

    fn close(&mut self) -> LightgunResult<()> {
        self.port = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some() && self.device_present.get()
    }
}
