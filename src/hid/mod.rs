//! Virtual HID device
//!
//! Presents a pointer/touch device to an OS input stack while its input
//! reports come from a separate, trusted producer:
//!
//! ```text
//! Producer --> SubmitInputReport --+                       +--> ReportReady (immediate)
//!                                  v                       |
//!                         ControlDispatcher --> DeviceContext [mode | queue]
//!                                  ^                       |
//! OS consumer --> ReadInputReport -+                       +--> completion (deferred)
//! ```
//!
//! - `report_desc`: fixed report descriptors, one per mode
//! - `mode`: active mode, descriptor reference and epoch
//! - `queue`: rendezvous of reports and pending reads
//! - `device`: the shared, lock-protected device context
//! - `dispatcher`: the request surface

pub mod device;
pub mod dispatcher;
pub mod error;
pub mod mode;
pub mod queue;
pub mod report_desc;
pub mod types;

pub use device::{DeviceContext, ReadStatus, SubmitStatus};
pub use dispatcher::{ControlDispatcher, HidRequest, HidResponse};
pub use error::HidError;
pub use mode::ModeTransition;
pub use queue::{OverflowPolicy, QueuePolicy, QueueStats, ReadCompletion};
pub use report_desc::{build_descriptor, hid_descriptor, report_byte_length};
pub use types::{
    DeviceMode, HidAttributes, InputReport, RequestId, TouchContact, ABS_LOGICAL_MAX,
    MAX_CONTACTS,
};
