//! Core domain types
//!
//! Pure types with no I/O dependencies beyond reading the config file.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
