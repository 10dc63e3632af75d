//! Device event types
//!
//! Payloads published on the [`EventBus`](super::EventBus).

use serde::{Deserialize, Serialize};

use crate::hid::{DeviceMode, RequestId};

/// Why a report was dropped without reaching a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Evicted (or refused) by the mode's overflow policy
    Overflow,
    /// The pending read it was handed to could not hold it
    BufferTooSmall,
}

/// Device event enumeration
///
/// Serialized as:
/// ```json
/// {
///   "event": "device.mode_changed",
///   "data": { "from": "mouse", "to": "multi_touch", "epoch": 1, ... }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum DeviceEvent {
    /// Active mode switched; in-flight state of the previous epoch was flushed
    #[serde(rename = "device.mode_changed")]
    ModeChanged {
        from: DeviceMode,
        to: DeviceMode,
        /// Epoch number that starts with this transition
        epoch: u64,
        /// Pending reads completed with `Reconfigured`
        flushed_reads: usize,
        /// Buffered reports of the previous mode that were discarded
        discarded_reports: usize,
    },

    /// A validated report was dropped before delivery
    #[serde(rename = "device.report_dropped")]
    ReportDropped { mode: DeviceMode, reason: DropReason },

    /// A pending read was canceled, by the consumer or by device removal
    #[serde(rename = "device.read_canceled")]
    ReadCanceled { request_id: RequestId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = DeviceEvent::ReportDropped {
            mode: DeviceMode::SingleTouch,
            reason: DropReason::Overflow,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "device.report_dropped");
        assert_eq!(json["data"]["mode"], "single_touch");
        assert_eq!(json["data"]["reason"], "overflow");
    }

    #[test]
    fn test_mode_changed_roundtrip() {
        let event = DeviceEvent::ModeChanged {
            from: DeviceMode::Mouse,
            to: DeviceMode::MultiTouch,
            epoch: 3,
            flushed_reads: 2,
            discarded_reports: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: DeviceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
