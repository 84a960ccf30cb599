//! Background reader: drains status lines from the gun while the port is open.
//!
//! The reader owns its own clone of the serial handle, so it never contends
//! with the foreground writer. It exits when the shared `open` flag drops, when
//! its stop channel is signalled or disconnected, or when its handle reports
//! the device gone. It never touches the `open` flag itself.
//!
//! Idle waits go through `recv_timeout` on the stop channel, so `disable`
//! wakes it immediately instead of waiting out a sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::domain::{LightgunError, LightgunResult};
use crate::ports::SerialConnection;

/// Chunk size for each serial read call
const READ_CHUNK_SIZE: usize = 64;

/// Longest status line kept before it is flushed without a terminator
const MAX_LINE_LEN: usize = 256;

/// Handle to a running reader thread.
pub(super) struct StatusReader {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl StatusReader {
    pub(super) fn spawn(
        serial: Box<dyn SerialConnection>,
        open: Arc<AtomicBool>,
        poll_interval: Duration,
        subscriber: Option<Sender<String>>,
    ) -> LightgunResult<Self> {
        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("lightgun-reader".to_string())
            .spawn(move || reader_loop(serial, open, stop_rx, poll_interval, subscriber))
            .map_err(|e| LightgunError::Reader(format!("Failed to spawn reader thread: {e}")))?;
        Ok(Self { stop, handle })
    }

    /// Signal the thread and block until it has exited.
    /// Callers clear the `open` flag first.
    pub(super) fn stop(self) -> LightgunResult<()> {
        let StatusReader { stop, handle } = self;
        // Disconnecting the channel wakes a reader parked in recv_timeout
        drop(stop);
        handle
            .join()
            .map_err(|_| LightgunError::Reader("Reader thread panicked".to_string()))
    }
}

fn reader_loop(
    mut serial: Box<dyn SerialConnection>,
    open: Arc<AtomicBool>,
    stop: Receiver<()>,
    poll_interval: Duration,
    subscriber: Option<Sender<String>>,
) {
    let mut lines = LineBuffer::default();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut failing = false;

    while open.load(Ordering::SeqCst) {
        if !serial.is_connected() {
            log::warn!("Lightgun disconnected; status reader stopping");
            break;
        }

        let received = match read_available(serial.as_mut(), &mut chunk) {
            Ok(n) => {
                if failing {
                    log::info!("Lightgun serial reads recovered");
                    failing = false;
                }
                n
            }
            Err(e) => {
                // Log once per failure streak; the loop keeps polling while open
                if !failing {
                    log::warn!("Lightgun read error: {e}");
                    failing = true;
                }
                0
            }
        };

        for line in lines.push(&chunk[..received]) {
            log::info!("Message received from serial port: {line}");
            if let Some(tx) = &subscriber {
                let _ = tx.send(line);
            }
        }

        if received > 0 {
            continue;
        }

        match stop.recv_timeout(poll_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::debug!("Lightgun reader exiting");
}

/// Read whatever is waiting without parking on an empty port.
fn read_available(serial: &mut dyn SerialConnection, chunk: &mut [u8]) -> LightgunResult<usize> {
    if serial.bytes_to_read()? == 0 {
        return Ok(0);
    }
    serial.read(chunk)
}

/// Splits the inbound byte stream into `\n`-terminated lines.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed bytes in; get back every line they completed.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || self.pending.len() >= MAX_LINE_LEN {
                if let Some(line) = self.take_line() {
                    lines.push(line);
                }
                if byte == b'\n' {
                    continue;
                }
            }
            self.pending.push(byte);
        }
        lines
    }

    fn take_line(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches('\r');
        (!line.is_empty()).then(|| line.to_string())
    }
}
