//! vhid - Virtual HID pointer/touch device
//!
//! This crate emulates a relative mouse, a single absolute pointer and a
//! multi-contact touch screen whose input reports are injected by a trusted
//! producer rather than read from hardware.

pub mod config;
pub mod error;
pub mod events;
pub mod hid;
pub mod utils;

pub use error::{AppError, Result};
