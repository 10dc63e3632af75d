//! Control dispatcher
//!
//! The single entry surface of the emulated device. Every request completes
//! synchronously in bounded time; a read with no report available returns
//! [`HidResponse::ReadPending`] and resolves later through its completion.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::device::{DeviceContext, ReadStatus, SubmitStatus};
use super::error::HidError;
use super::mode::ModeTransition;
use super::queue::{QueueStats, ReadCompletion};
use super::types::{DeviceMode, HidAttributes, InputReport, RequestId};

/// Request issued to the device
pub enum HidRequest {
    /// Fixed device identity
    GetAttributes,
    /// HID class descriptor of the current mode
    GetHidDescriptor,
    /// Report descriptor of the current mode
    GetReportDescriptor,
    /// Current mode
    GetMode,
    /// Switch mode by wire tag
    SetDeviceMode { tag: u8 },
    /// Producer-side typed report
    SubmitInputReport(InputReport),
    /// Producer-side encoded report with its mode tag
    SubmitRawReport { tag: u8, bytes: Bytes },
    /// Consumer-side read
    ReadInputReport {
        capacity: usize,
        completion: ReadCompletion,
    },
    /// Consumer-side cancellation of a pending read
    CancelRead { id: RequestId },
    /// Queue counters
    GetStats,
}

impl HidRequest {
    /// Request name for logging
    pub fn name(&self) -> &'static str {
        match self {
            HidRequest::GetAttributes => "get_attributes",
            HidRequest::GetHidDescriptor => "get_hid_descriptor",
            HidRequest::GetReportDescriptor => "get_report_descriptor",
            HidRequest::GetMode => "get_mode",
            HidRequest::SetDeviceMode { .. } => "set_device_mode",
            HidRequest::SubmitInputReport(_) => "submit_input_report",
            HidRequest::SubmitRawReport { .. } => "submit_raw_report",
            HidRequest::ReadInputReport { .. } => "read_input_report",
            HidRequest::CancelRead { .. } => "cancel_read",
            HidRequest::GetStats => "get_stats",
        }
    }
}

impl fmt::Debug for HidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HidRequest::SetDeviceMode { tag } => {
                f.debug_struct("SetDeviceMode").field("tag", tag).finish()
            }
            HidRequest::SubmitInputReport(report) => {
                f.debug_tuple("SubmitInputReport").field(report).finish()
            }
            HidRequest::SubmitRawReport { tag, bytes } => f
                .debug_struct("SubmitRawReport")
                .field("tag", tag)
                .field("bytes", bytes)
                .finish(),
            HidRequest::ReadInputReport { capacity, .. } => f
                .debug_struct("ReadInputReport")
                .field("capacity", capacity)
                .finish_non_exhaustive(),
            HidRequest::CancelRead { id } => f.debug_struct("CancelRead").field("id", id).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Response to a [`HidRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidResponse {
    Attributes(HidAttributes),
    HidDescriptor([u8; 9]),
    ReportDescriptor(&'static [u8]),
    Mode(DeviceMode),
    ModeSet(ModeTransition),
    Accepted(SubmitStatus),
    /// Read satisfied immediately
    ReportReady(Bytes),
    /// Read parked; its completion fires later
    ReadPending(RequestId),
    /// Whether the read was still pending when canceled
    CancelResult(bool),
    Stats(QueueStats),
}

/// Routes requests to the device context
#[derive(Clone)]
pub struct ControlDispatcher {
    device: Arc<DeviceContext>,
}

impl ControlDispatcher {
    pub fn new(device: Arc<DeviceContext>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Arc<DeviceContext> {
        &self.device
    }

    /// Handle one request
    pub fn dispatch(&self, request: HidRequest) -> Result<HidResponse, HidError> {
        trace!("Dispatching {:?}", request);
        let device = &self.device;
        match request {
            HidRequest::GetAttributes => Ok(HidResponse::Attributes(device.attributes())),
            HidRequest::GetHidDescriptor => Ok(HidResponse::HidDescriptor(device.hid_descriptor())),
            HidRequest::GetReportDescriptor => {
                Ok(HidResponse::ReportDescriptor(device.report_descriptor()))
            }
            HidRequest::GetMode => Ok(HidResponse::Mode(device.mode())),
            HidRequest::SetDeviceMode { tag } => device.set_mode_tag(tag).map(HidResponse::ModeSet),
            HidRequest::SubmitInputReport(report) => {
                device.submit_report(&report).map(HidResponse::Accepted)
            }
            HidRequest::SubmitRawReport { tag, bytes } => {
                let mode = DeviceMode::try_from(tag).map_err(|_| {
                    HidError::Validation(format!("unknown report tag {}", tag))
                })?;
                device.submit_raw(mode, bytes).map(HidResponse::Accepted)
            }
            HidRequest::ReadInputReport {
                capacity,
                completion,
            } => match device.read_input_report(capacity, completion)? {
                ReadStatus::Ready(bytes) => Ok(HidResponse::ReportReady(bytes)),
                ReadStatus::Pending(id) => Ok(HidResponse::ReadPending(id)),
            },
            HidRequest::CancelRead { id } => Ok(HidResponse::CancelResult(device.cancel_read(id))),
            HidRequest::GetStats => Ok(HidResponse::Stats(device.stats())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VhidConfig;
    use crate::hid::report_desc::{build_descriptor, hid_descriptor};

    fn dispatcher() -> ControlDispatcher {
        let device = DeviceContext::from_config(&VhidConfig::default()).unwrap();
        ControlDispatcher::new(Arc::new(device))
    }

    fn noop() -> ReadCompletion {
        Box::new(|_| {})
    }

    #[test]
    fn test_descriptor_queries_follow_mode() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch(HidRequest::GetReportDescriptor).unwrap(),
            HidResponse::ReportDescriptor(build_descriptor(DeviceMode::Mouse))
        );

        d.dispatch(HidRequest::SetDeviceMode {
            tag: DeviceMode::MultiTouch.tag(),
        })
        .unwrap();
        assert_eq!(
            d.dispatch(HidRequest::GetReportDescriptor).unwrap(),
            HidResponse::ReportDescriptor(build_descriptor(DeviceMode::MultiTouch))
        );
        assert_eq!(
            d.dispatch(HidRequest::GetHidDescriptor).unwrap(),
            HidResponse::HidDescriptor(hid_descriptor(DeviceMode::MultiTouch))
        );
    }

    #[test]
    fn test_attributes_from_config() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch(HidRequest::GetAttributes).unwrap(),
            HidResponse::Attributes(HidAttributes {
                vendor_id: 0x1d6b,
                product_id: 0x0104,
                version_number: 0x0100,
            })
        );
    }

    #[test]
    fn test_invalid_mode_tag() {
        let d = dispatcher();
        assert!(matches!(
            d.dispatch(HidRequest::SetDeviceMode { tag: 42 }),
            Err(HidError::InvalidMode(_))
        ));
        assert_eq!(
            d.dispatch(HidRequest::GetMode).unwrap(),
            HidResponse::Mode(DeviceMode::Mouse)
        );
    }

    #[test]
    fn test_raw_report_unknown_tag_is_validation_error() {
        let d = dispatcher();
        assert!(matches!(
            d.dispatch(HidRequest::SubmitRawReport {
                tag: 7,
                bytes: Bytes::from_static(&[0, 0, 0]),
            }),
            Err(HidError::Validation(_))
        ));
    }

    #[test]
    fn test_read_then_submit_then_cancel_noop() {
        let d = dispatcher();
        let id = match d
            .dispatch(HidRequest::ReadInputReport {
                capacity: 8,
                completion: noop(),
            })
            .unwrap()
        {
            HidResponse::ReadPending(id) => id,
            other => panic!("unexpected response: {:?}", other),
        };

        assert_eq!(
            d.dispatch(HidRequest::SubmitRawReport {
                tag: DeviceMode::Mouse.tag(),
                bytes: Bytes::from_static(&[1, 2, 3]),
            })
            .unwrap(),
            HidResponse::Accepted(SubmitStatus::Delivered(id))
        );
        assert_eq!(
            d.dispatch(HidRequest::CancelRead { id }).unwrap(),
            HidResponse::CancelResult(false)
        );
    }

    #[test]
    fn test_request_debug_hides_completion() {
        let request = HidRequest::ReadInputReport {
            capacity: 16,
            completion: noop(),
        };
        assert_eq!(format!("{:?}", request), "ReadInputReport { capacity: 16, .. }");
        assert_eq!(format!("{:?}", HidRequest::GetStats), "get_stats");
    }
}
