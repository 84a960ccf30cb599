//! Lightgun Driver
//!
//! Serial control for light guns that support an external control mode:
//! recoil, LED ammo display, rumble, and screen/control mode switching.
//!
//! ## Architecture (Hexagonal / Ports & Adapters)
//!
//! - `domain/` - Pure domain types, config and errors
//! - `ports/` - Trait definitions for the serial device
//! - `protocol/` - Command vocabulary and ammo encoding (pure, no I/O)
//! - `adapters/` - Implementations of ports (serialport, mock)
//! - `driver/` - Connection lifecycle and the background status reader
//! - `console` - Stdin host used by the `lightgun` binary

// Core domain (pure, no I/O)
pub mod domain;
pub mod ports;
pub mod protocol;

// Adapters (external I/O)
pub mod adapters;

pub mod console;
pub mod driver;

pub use driver::Lightgun;
