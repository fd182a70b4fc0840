//! Scripted control of a QEMU VM through its human monitor.
//!
//! This library provides:
//! - A monitor session over TCP (banner, command lines, half-close)
//! - Encoding of text into `sendkey` key names
//! - Drivers for the supported exchanges: screenshot, keyboard input, reset
//!
//! Logging goes through `tracing`; installing a subscriber is up to the
//! binary.

pub mod commands;
pub mod config;
pub mod error;
pub mod monitor;

// Re-export commonly used items
pub use commands::{reboot, screenshot, send_input, MonitorCommand, SendReport};
pub use config::{MonitorConfig, DEFAULT_MONITOR};
pub use error::{EncodingError, MonitorError};
pub use monitor::{encode, KeySequence, KeyToken, MonitorAddress, MonitorSession};
