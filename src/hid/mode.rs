//! Device mode controller
//!
//! Owns the active [`DeviceMode`], its report descriptor and the epoch
//! counter. Lives inside the device lock together with the report queue, so a
//! transition and the flush it triggers are observed as one step.

use serde::{Deserialize, Serialize};

use super::error::HidError;
use super::report_desc::{build_descriptor, report_byte_length};
use super::types::DeviceMode;

/// A completed mode transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeTransition {
    /// Mode before the transition
    pub from: DeviceMode,
    /// Mode after the transition
    pub to: DeviceMode,
    /// Epoch that starts with this transition
    pub epoch: u64,
}

#[derive(Debug)]
pub struct ModeController {
    mode: DeviceMode,
    descriptor: &'static [u8],
    epoch: u64,
}

impl ModeController {
    pub fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            descriptor: build_descriptor(mode),
            epoch: 0,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Report descriptor of the active mode
    pub fn descriptor(&self) -> &'static [u8] {
        self.descriptor
    }

    /// Number of transitions performed so far
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Swap mode and descriptor together and start a new epoch
    ///
    /// Switching to the mode that is already active still starts a new epoch;
    /// the caller flushes in-flight state either way.
    pub fn switch_to(&mut self, mode: DeviceMode) -> ModeTransition {
        let from = self.mode;
        self.mode = mode;
        self.descriptor = build_descriptor(mode);
        self.epoch += 1;
        ModeTransition {
            from,
            to: mode,
            epoch: self.epoch,
        }
    }

    /// Check a report of `mode` with `len` bytes against the active layout
    pub fn validate(&self, mode: DeviceMode, len: usize) -> Result<(), HidError> {
        if mode != self.mode {
            return Err(HidError::Validation(format!(
                "{} report submitted while device is in {} mode",
                mode, self.mode
            )));
        }
        let expected = report_byte_length(mode);
        if len != expected {
            return Err(HidError::Validation(format!(
                "{} report must be {} bytes, got {}",
                mode, expected, len
            )));
        }
        Ok(())
    }
}
