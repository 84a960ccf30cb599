//! Mock lightgun adapter for development and testing without hardware.
//!
//! Activate by setting MOCK_LIGHTGUN=1 in the environment:
//!
//!   MOCK_LIGHTGUN=1 RUST_LOG=lightgun_lib=info cargo run
//!
//! Every command written is logged at INFO level and acknowledged with a
//! status line, so the background reader has something to drain.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{LightgunError, LightgunResult, SerialPortInfo};
use crate::ports::{SerialConnection, SerialFactory};
use crate::protocol::Command;

const MOCK_PORT_NAME: &str = "MOCK";

pub struct MockSerialFactory;

impl SerialFactory for MockSerialFactory {
    fn list_ports(&self) -> LightgunResult<Vec<SerialPortInfo>> {
        Ok(vec![SerialPortInfo {
            name: MOCK_PORT_NAME.to_string(),
            port_type: "Mock".to_string(),
            configured: false,
        }])
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        _read_timeout: Duration,
    ) -> LightgunResult<Box<dyn SerialConnection>> {
        log::info!("[MOCK LIGHTGUN] Opened {port} at {baud_rate} baud");
        Ok(Box::new(MockSerialConnection {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            connected: true,
        }))
    }
}

/// Both handles of one mock port share the inbound queue.
pub struct MockSerialConnection {
    inbound: Arc<Mutex<VecDeque<u8>>>,
    connected: bool,
}

impl MockSerialConnection {
    fn inbound(&self) -> LightgunResult<std::sync::MutexGuard<'_, VecDeque<u8>>> {
        self.inbound
            .lock()
            .map_err(|_| LightgunError::Serial("Mock inbound queue poisoned".to_string()))
    }
}

impl SerialConnection for MockSerialConnection {
    fn write(&mut self, data: &[u8]) -> LightgunResult<usize> {
        if !self.connected {
            return Err(LightgunError::Serial("Write failed: mock port closed".to_string()));
        }
        let code = String::from_utf8_lossy(data);
        let meaning = Command::from_wire(&code).map_or("unknown", |c| c.describe());
        log::info!("[MOCK LIGHTGUN] {code} → {meaning}");
        self.inbound()?.extend(format!("OK {code}\r\n").bytes());
        Ok(data.len())
    }

    fn bytes_to_read(&self) -> LightgunResult<u32> {
        Ok(self.inbound()?.len() as u32)
    }

    fn read(&mut self, buffer: &mut [u8]) -> LightgunResult<usize> {
        let mut inbound = self.inbound()?;
        let n = inbound.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn try_clone(&self) -> LightgunResult<Box<dyn SerialConnection>> {
        Ok(Box::new(MockSerialConnection {
            inbound: Arc::clone(&self.inbound),
            connected: self.connected,
        }))
    }

    fn close(&mut self) -> LightgunResult<()> {
        log::info!("[MOCK LIGHTGUN] Closed");
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
