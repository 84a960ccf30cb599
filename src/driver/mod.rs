//! Lightgun driver: owns the serial connection and the background reader.
//!
//! Lifecycle: `enable` opens the port, starts the reader and puts the gun in
//! external control mode. `disable` hands control back to the gun, closes the
//! port and joins the reader before returning. Both can be cycled freely.
//!
//! Nothing here returns an error to the caller. A missing or busy gun is
//! logged and every command becomes a silent no-op, so gameplay never stalls
//! on hardware.

mod reader;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use log::Level;

use crate::adapters::serial_port::SerialPortFactory;
use crate::domain::{LightgunConfig, LightgunResult, SerialPortInfo};
use crate::ports::{SerialConnection, SerialFactory};
use crate::protocol::{encode_from_count, encode_from_percent, Command, ControlMode, ScreenMode};

use reader::StatusReader;

/// The port handle plus the flag the reader watches.
/// Created on first `enable`, reused across enable/disable cycles.
struct Connection {
    serial: Option<Box<dyn SerialConnection>>,
    open: Arc<AtomicBool>,
    reader: Option<StatusReader>,
}

impl Connection {
    fn new() -> Self {
        Self {
            serial: None,
            open: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// We still own an opened port, whether or not the device is still there.
    fn holds_port(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Port owned and the transport still reports the device connected.
    fn is_open(&self) -> bool {
        self.holds_port() && self.serial.as_ref().is_some_and(|s| s.is_connected())
    }

    /// Write a command if the port is open; otherwise drop it silently.
    fn send(&mut self, cmd: Command) {
        if !self.is_open() {
            return;
        }
        let Some(serial) = self.serial.as_mut() else {
            return;
        };
        log::debug!("Lightgun TX: {cmd}");
        if let Err(e) = serial.write(cmd.as_str().as_bytes()) {
            log::warn!("Failed to send {cmd} ({}): {e}", cmd.describe());
        }
    }

    /// Clear the open flag and release the port. Safe to call twice.
    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(mut serial) = self.serial.take() {
            if let Err(e) = serial.close() {
                log::warn!("Error closing serial port: {e}");
            }
        }
    }

    /// Close the port and block until the reader has exited.
    fn shutdown(&mut self) {
        self.close();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.stop() {
                log::error!("{e}");
            }
        }
    }
}

/// Driver for one external-control lightgun.
pub struct Lightgun {
    config: LightgunConfig,
    factory: Box<dyn SerialFactory>,
    connection: Option<Connection>,
    status_subscriber: Option<Sender<String>>,
}

impl Lightgun {
    pub fn new(config: LightgunConfig, factory: Box<dyn SerialFactory>) -> Self {
        Self {
            config,
            factory,
            connection: None,
            status_subscriber: None,
        }
    }

    /// Driver backed by a real serial port.
    pub fn with_serialport(config: LightgunConfig) -> Self {
        Self::new(config, Box::new(SerialPortFactory))
    }

    /// Also deliver every status line the gun sends to `tx`.
    /// Takes effect from the next `enable`.
    pub fn with_status_subscriber(mut self, tx: Sender<String>) -> Self {
        self.status_subscriber = Some(tx);
        self
    }

    pub fn config(&self) -> &LightgunConfig {
        &self.config
    }

    /// True while the port is open, the device is still connected, and the gun
    /// is under external control.
    pub fn is_enabled(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_open)
    }

    /// Serial ports visible to the factory, with the configured port flagged
    /// and listed first.
    pub fn list_ports(&self) -> LightgunResult<Vec<SerialPortInfo>> {
        let mut ports = self.factory.list_ports()?;
        for port in &mut ports {
            port.configured = port.name.eq_ignore_ascii_case(&self.config.port_name);
        }
        ports.sort_by_key(|p| !p.configured);
        Ok(ports)
    }

    /// Open the port, start the reader and enter external control mode.
    pub fn enable(&mut self) {
        let lifecycle_level = self.lifecycle_level();
        let connection = self.connection.get_or_insert_with(Connection::new);

        if connection.is_open() {
            log::warn!("Attempted to connect to lightgun when connection is already established!");
            return;
        }
        if connection.holds_port() {
            log::warn!("Lightgun on {} disconnected; reopening", self.config.port_name);
            connection.shutdown();
        }

        let serial = match self.factory.open(
            &self.config.port_name,
            self.config.baud_rate,
            self.config.read_timeout(),
        ) {
            Ok(serial) => serial,
            Err(e) => {
                log::error!("Error opening serial port: {e}");
                return;
            }
        };

        let reader_handle = match serial.try_clone() {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Lightgun status reader unavailable: {e}");
                None
            }
        };

        connection.serial = Some(serial);
        connection.open.store(true, Ordering::SeqCst);
        log::log!(lifecycle_level, "Serial port opened.");

        if let Some(handle) = reader_handle {
            match StatusReader::spawn(
                handle,
                Arc::clone(&connection.open),
                self.config.poll_interval(),
                self.status_subscriber.clone(),
            ) {
                Ok(reader) => connection.reader = Some(reader),
                Err(e) => log::error!("Lightgun status reader unavailable: {e}"),
            }
        }

        connection.send(Command::EnterExternalControl);
    }

    /// Leave external control mode, close the port and wait for the reader.
    pub fn disable(&mut self) {
        let lifecycle_level = self.lifecycle_level();
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if !connection.holds_port() {
            return;
        }

        // Skipped silently if the device already went away
        connection.send(Command::ExitExternalControl);
        connection.shutdown();
        log::log!(lifecycle_level, "Serial port closed.");
    }

    /// Recoil and show `remaining_ammo` on the LEDs (clamped to 0..=5).
    pub fn fire(&mut self, remaining_ammo: i32) {
        self.send(encode_from_count(remaining_ammo));
    }

    /// Recoil and show a remaining-ammo fraction on the LEDs.
    pub fn fire_percent(&mut self, remaining_ammo_percent: f32) {
        self.send(encode_from_percent(remaining_ammo_percent));
    }

    pub fn reload(&mut self) {
        self.send(Command::SlideReturn);
    }

    pub fn rumble(&mut self) {
        self.send(Command::Rumble);
    }

    pub fn set_screen_mode(&mut self, mode: ScreenMode) {
        self.send(Command::ScreenMode(mode));
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.send(Command::ControlMode(mode));
    }

    pub fn enable_led_auto_mode(&mut self) {
        self.send(Command::LedAutoMode);
    }

    fn send(&mut self, cmd: Command) {
        if let Some(connection) = self.connection.as_mut() {
            connection.send(cmd);
        }
    }

    fn lifecycle_level(&self) -> Level {
        if self.config.log_debug_messages {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

impl Drop for Lightgun {
    fn drop(&mut self) {
        // Never leave the gun stuck in external control
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LightgunError;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    // ---------------------------------------------------------------------------
    // Log capture: records every log line with the thread that emitted it,
    // so parallel tests only see their own output
    // ---------------------------------------------------------------------------

    struct RecordingLogger;

    static RECORDS: Mutex<Vec<(ThreadId, Level, String)>> = Mutex::new(Vec::new());
    static LOGGER: RecordingLogger = RecordingLogger;

    impl log::Log for RecordingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            if let Ok(mut records) = RECORDS.lock() {
                records.push((thread::current().id(), record.level(), record.args().to_string()));
            }
        }
        fn flush(&self) {}
    }

    fn capture_logs() {
        // Only the first call installs the logger; later ones are no-ops
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    }

    /// Lines logged on this thread at `level`.
    fn logged(level: Level) -> Vec<String> {
        let me = thread::current().id();
        RECORDS
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, lvl, _)| *id == me && *lvl == level)
            .map(|(_, _, msg)| msg.clone())
            .collect()
    }

    // ---------------------------------------------------------------------------
    // FakeSerial: records writes, never has anything to read.
    // Each open is a new generation; unplugging disconnects every handle
    // opened so far, so a later open comes back connected.
    // ---------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeState {
        opens: usize,
        closes: usize,
        writes: Vec<String>,
        fail_open: bool,
        unplugged_through: usize,
    }

    struct FakeFactory(Arc<Mutex<FakeState>>);

    impl SerialFactory for FakeFactory {
        fn list_ports(&self) -> LightgunResult<Vec<SerialPortInfo>> {
            Ok(["FAKE", "com4"]
                .into_iter()
                .map(|name| SerialPortInfo {
                    name: name.to_string(),
                    port_type: "Fake".to_string(),
                    configured: false,
                })
                .collect())
        }

        fn open(
            &self,
            port: &str,
            _baud_rate: u32,
            _read_timeout: Duration,
        ) -> LightgunResult<Box<dyn SerialConnection>> {
            let mut state = self.0.lock().unwrap();
            if state.fail_open {
                return Err(LightgunError::Serial(format!("Failed to open {port}: busy")));
            }
            state.opens += 1;
            Ok(Box::new(FakeSerial {
                state: Arc::clone(&self.0),
                generation: state.opens,
            }))
        }
    }

    struct FakeSerial {
        state: Arc<Mutex<FakeState>>,
        generation: usize,
    }

    impl SerialConnection for FakeSerial {
        fn write(&mut self, data: &[u8]) -> LightgunResult<usize> {
            self.state
                .lock()
                .unwrap()
                .writes
                .push(String::from_utf8_lossy(data).into());
            Ok(data.len())
        }
        fn bytes_to_read(&self) -> LightgunResult<u32> {
            Ok(0)
        }
        fn read(&mut self, _buf: &mut [u8]) -> LightgunResult<usize> {
            Ok(0)
        }
        fn try_clone(&self) -> LightgunResult<Box<dyn SerialConnection>> {
            Ok(Box::new(FakeSerial {
                state: Arc::clone(&self.state),
                generation: self.generation,
            }))
        }
        fn close(&mut self) -> LightgunResult<()> {
            self.state.lock().unwrap().closes += 1;
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.generation > self.state.lock().unwrap().unplugged_through
        }
    }

    fn make_gun() -> (Lightgun, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let gun = Lightgun::new(
            LightgunConfig::default(),
            Box::new(FakeFactory(Arc::clone(&state))),
        );
        (gun, state)
    }

    fn writes(state: &Arc<Mutex<FakeState>>) -> Vec<String> {
        state.lock().unwrap().writes.clone()
    }

    fn unplug(state: &Arc<Mutex<FakeState>>) {
        let mut state = state.lock().unwrap();
        state.unplugged_through = state.opens;
    }

    // --- Lifecycle ---

    #[test]
    fn enable_enters_external_control() {
        let (mut gun, state) = make_gun();
        gun.enable();
        assert!(gun.is_enabled());
        assert_eq!(writes(&state), ["ZS"]);
    }

    #[test]
    fn disable_exits_external_control_then_closes() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.disable();
        assert!(!gun.is_enabled());
        assert_eq!(writes(&state), ["ZS", "ZX"]);
        assert_eq!(state.lock().unwrap().closes, 1);
    }

    #[test]
    fn second_enable_warns_and_does_not_reopen() {
        capture_logs();
        let (mut gun, state) = make_gun();
        gun.enable();
        assert!(logged(Level::Warn).is_empty());

        gun.enable();
        assert_eq!(state.lock().unwrap().opens, 1);
        assert_eq!(writes(&state), ["ZS"]);
        assert_eq!(
            logged(Level::Warn),
            ["Attempted to connect to lightgun when connection is already established!"]
        );
    }

    #[test]
    fn disable_without_enable_is_noop() {
        let (mut gun, state) = make_gun();
        gun.disable();
        gun.disable();
        assert!(writes(&state).is_empty());
        assert_eq!(state.lock().unwrap().closes, 0);
    }

    #[test]
    fn second_disable_does_not_close_again() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.disable();
        gun.disable();
        assert_eq!(state.lock().unwrap().closes, 1);
        assert_eq!(writes(&state), ["ZS", "ZX"]);
    }

    #[test]
    fn lifecycle_is_repeatable() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.disable();
        gun.enable();
        assert!(gun.is_enabled());
        assert_eq!(state.lock().unwrap().opens, 2);
        assert_eq!(writes(&state), ["ZS", "ZX", "ZS"]);
    }

    #[test]
    fn open_failure_leaves_driver_closed() {
        let (mut gun, state) = make_gun();
        state.lock().unwrap().fail_open = true;
        gun.enable();
        assert!(!gun.is_enabled());
        gun.fire(3);
        gun.disable();
        assert!(writes(&state).is_empty());
    }

    #[test]
    fn open_failure_is_logged_as_error() {
        capture_logs();
        let (mut gun, state) = make_gun();
        state.lock().unwrap().fail_open = true;
        gun.enable();
        assert_eq!(
            logged(Level::Error),
            ["Error opening serial port: Serial port error: Failed to open COM4: busy"]
        );
        assert!(logged(Level::Warn).is_empty());
    }

    #[test]
    fn enable_retries_after_open_failure() {
        let (mut gun, state) = make_gun();
        state.lock().unwrap().fail_open = true;
        gun.enable();
        state.lock().unwrap().fail_open = false;
        gun.enable();
        assert!(gun.is_enabled());
        assert_eq!(writes(&state), ["ZS"]);
    }

    #[test]
    fn drop_hands_control_back_to_gun() {
        let (mut gun, state) = make_gun();
        gun.enable();
        drop(gun);
        assert_eq!(writes(&state), ["ZS", "ZX"]);
    }

    // --- Device lost while open ---

    #[test]
    fn unplugged_device_drops_commands_silently() {
        capture_logs();
        let (mut gun, state) = make_gun();
        gun.enable();
        unplug(&state);

        assert!(!gun.is_enabled());
        gun.fire(3);
        gun.reload();
        assert_eq!(writes(&state), ["ZS"]);
        assert!(logged(Level::Warn).is_empty());

        // disable still releases the port, without trying to send ZX
        gun.disable();
        assert_eq!(state.lock().unwrap().closes, 1);
        assert_eq!(writes(&state), ["ZS"]);
    }

    #[test]
    fn enable_after_unplug_reopens() {
        let (mut gun, state) = make_gun();
        gun.enable();
        unplug(&state);

        gun.enable();
        assert!(gun.is_enabled());
        {
            let state = state.lock().unwrap();
            assert_eq!(state.opens, 2);
            assert_eq!(state.closes, 1);
        }
        gun.fire(2);
        assert_eq!(writes(&state), ["ZS", "ZS", "Z2"]);
    }

    // --- Commands ---

    #[test]
    fn commands_before_enable_are_silent() {
        let (mut gun, state) = make_gun();
        gun.fire(5);
        gun.fire_percent(0.5);
        gun.reload();
        gun.rumble();
        assert!(writes(&state).is_empty());
    }

    #[test]
    fn commands_after_disable_are_silent() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.disable();
        gun.rumble();
        gun.fire(1);
        assert_eq!(writes(&state), ["ZS", "ZX"]);
    }

    #[test]
    fn fire_encodes_count_and_percent() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.fire(12);
        gun.fire(2);
        gun.fire(-4);
        gun.fire_percent(0.01);
        gun.fire_percent(0.21);
        assert_eq!(writes(&state), ["ZS", "Z5", "Z2", "Z0", "Z1", "Z2"]);
    }

    #[test]
    fn reload_and_rumble_send_fixed_codes() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.reload();
        gun.rumble();
        assert_eq!(writes(&state), ["ZS", "Z6", "ZZ"]);
    }

    #[test]
    fn mode_commands_send_their_codes() {
        let (mut gun, state) = make_gun();
        gun.enable();
        gun.set_screen_mode(ScreenMode::Widescreen);
        gun.set_screen_mode(ScreenMode::Standard);
        gun.set_control_mode(ControlMode::Joystick);
        gun.set_control_mode(ControlMode::KeyboardMouse);
        gun.enable_led_auto_mode();
        assert_eq!(writes(&state), ["ZS", "ZW", "ZN", "ZJ", "ZM", "ZR"]);
    }

    #[test]
    fn list_ports_puts_configured_port_first() {
        let (gun, _) = make_gun();
        assert_eq!(gun.config().port_name, "COM4");
        let ports = gun.list_ports().unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].name, "com4");
        assert!(ports[0].configured);
        assert_eq!(ports[1].name, "FAKE");
        assert!(!ports[1].configured);
    }
}
