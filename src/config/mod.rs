//! Configuration
//!
//! TOML-backed settings for the emulated device: identity, startup mode,
//! per-mode buffering policy and logging.

pub mod schema;
pub mod store;

pub use schema::{DeviceConfig, LogConfig, QueueConfig, VhidConfig};
pub use store::{load, load_or_default};
