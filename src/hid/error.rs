//! Device-level error taxonomy
//!
//! Every variant is a local, recoverable condition: the device keeps servicing
//! subsequent requests after returning any of them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HidError {
    /// Unrecognized device mode requested
    #[error("Invalid device mode: {0}")]
    InvalidMode(String),

    /// Report tag or size does not match the active mode
    #[error("Report validation failed: {0}")]
    Validation(String),

    /// Consumer buffer cannot hold one report of the active mode
    #[error("Buffer too small: report needs {required} bytes, buffer holds {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    /// Pending read terminated by the consumer
    #[error("Read canceled")]
    Canceled,

    /// Pending read flushed by a device mode transition
    #[error("Device reconfigured")]
    Reconfigured,
}

impl HidError {
    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            HidError::InvalidMode(_) => "invalid_mode",
            HidError::Validation(_) => "validation",
            HidError::BufferTooSmall { .. } => "buffer_too_small",
            HidError::Canceled => "canceled",
            HidError::Reconfigured => "reconfigured",
        }
    }
}
