//! Utility modules for vhid

pub mod throttle;

pub use throttle::LogThrottler;
