use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::hid::{DeviceMode, HidAttributes, QueuePolicy};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhidConfig {
    /// Emulated device identity and startup mode
    pub device: DeviceConfig,
    /// Per-mode report buffering
    pub queue: QueueConfig,
    /// Logging behaviour
    pub log: LogConfig,
}

impl VhidConfig {
    /// Reject values the device cannot operate with
    pub fn validate(&self) -> Result<()> {
        for mode in DeviceMode::ALL {
            if self.queue.policy_for(mode).capacity == 0 {
                return Err(AppError::Config(format!(
                    "queue.{}.capacity must be at least 1",
                    mode
                )));
            }
        }
        Ok(())
    }
}

/// Device identity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB Vendor ID (e.g., 0x1d6b)
    pub vendor_id: u16,
    /// USB Product ID (e.g., 0x0104)
    pub product_id: u16,
    /// Device version number (BCD)
    pub version_number: u16,
    /// Mode presented at device arrival
    pub initial_mode: DeviceMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x1d6b,  // Linux Foundation
            product_id: 0x0104, // Multifunction Composite Gadget
            version_number: 0x0100,
            initial_mode: DeviceMode::Mouse,
        }
    }
}

impl DeviceConfig {
    pub fn attributes(&self) -> HidAttributes {
        HidAttributes {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            version_number: self.version_number,
        }
    }
}

/// Report buffering configuration, one policy per mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub mouse: QueuePolicy,
    pub single_touch: QueuePolicy,
    pub multi_touch: QueuePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mouse: QueuePolicy::default_for(DeviceMode::Mouse),
            single_touch: QueuePolicy::default_for(DeviceMode::SingleTouch),
            multi_touch: QueuePolicy::default_for(DeviceMode::MultiTouch),
        }
    }
}

impl QueueConfig {
    pub fn policy_for(&self, mode: DeviceMode) -> QueuePolicy {
        match mode {
            DeviceMode::Mouse => self.mouse,
            DeviceMode::SingleTouch => self.single_touch,
            DeviceMode::MultiTouch => self.multi_touch,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum seconds between repeated queue-overflow warnings
    pub throttle_secs: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { throttle_secs: 5 }
    }
}
