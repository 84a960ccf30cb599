//! Lightgun serial command set.
//!
//! Every command is a two-character ASCII code starting with `Z`. No
//! terminator is sent. This module holds the vocabulary; `encode` holds the
//! pure ammo → command mapping so it can be tested without a serial port.

use std::fmt;

pub mod encode;

pub use encode::{encode_from_count, encode_from_percent};

/// Number of LED/recoil steps the gun can display
pub const MAX_AMMO_BUCKET: u8 = 5;

/// Aspect ratio the gun calibrates its aim for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    /// 16:9
    Widescreen,
    /// 4:3
    Standard,
}

/// How the gun presents itself to the host as an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Joystick,
    KeyboardMouse,
}

/// One of the six ammo display levels, `Z0`..`Z5`.
/// Only constructible through clamping, so it is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmmoBucket(u8);

impl AmmoBucket {
    /// Clamp any count into the 0..=5 range.
    pub fn saturating(count: i32) -> Self {
        Self(count.clamp(0, MAX_AMMO_BUCKET as i32) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

/// Commands understood by the lightgun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Host takes over recoil and LEDs
    EnterExternalControl,
    /// Gun returns to its own self-control mode
    ExitExternalControl,
    LedAutoMode,
    /// Slide returns to standard position; 5 orange LEDs
    SlideReturn,
    /// Rotates the rumble motor once
    Rumble,
    ScreenMode(ScreenMode),
    ControlMode(ControlMode),
    /// Recoil and show the remaining ammo on the LEDs
    Ammo(AmmoBucket),
}

impl Command {
    /// Wire bytes for this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::EnterExternalControl => "ZS",
            Command::ExitExternalControl => "ZX",
            Command::LedAutoMode => "ZR",
            Command::SlideReturn => "Z6",
            Command::Rumble => "ZZ",
            Command::ScreenMode(ScreenMode::Widescreen) => "ZW",
            Command::ScreenMode(ScreenMode::Standard) => "ZN",
            Command::ControlMode(ControlMode::Joystick) => "ZJ",
            Command::ControlMode(ControlMode::KeyboardMouse) => "ZM",
            Command::Ammo(bucket) => AMMO_CODES[bucket.level() as usize],
        }
    }

    /// Look a wire code back up. Used by the mock adapter to describe traffic.
    pub fn from_wire(code: &str) -> Option<Self> {
        ALL_STATIC
            .iter()
            .copied()
            .chain((0..=MAX_AMMO_BUCKET as i32).map(|n| Command::Ammo(AmmoBucket::saturating(n))))
            .find(|cmd| cmd.as_str() == code)
    }

    /// Short human description for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Command::EnterExternalControl => "enter external control",
            Command::ExitExternalControl => "exit external control",
            Command::LedAutoMode => "LED auto mode",
            Command::SlideReturn => "slide return",
            Command::Rumble => "rumble",
            Command::ScreenMode(ScreenMode::Widescreen) => "widescreen 16:9",
            Command::ScreenMode(ScreenMode::Standard) => "standard 4:3",
            Command::ControlMode(ControlMode::Joystick) => "joystick mode",
            Command::ControlMode(ControlMode::KeyboardMouse) => "keyboard/mouse mode",
            Command::Ammo(_) => "fire",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const AMMO_CODES: [&str; MAX_AMMO_BUCKET as usize + 1] = ["Z0", "Z1", "Z2", "Z3", "Z4", "Z5"];

const ALL_STATIC: &[Command] = &[
    Command::EnterExternalControl,
    Command::ExitExternalControl,
    Command::LedAutoMode,
    Command::SlideReturn,
    Command::Rumble,
    Command::ScreenMode(ScreenMode::Widescreen),
    Command::ScreenMode(ScreenMode::Standard),
    Command::ControlMode(ControlMode::Joystick),
    Command::ControlMode(ControlMode::KeyboardMouse),
];
