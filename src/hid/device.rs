//! Emulated device context
//!
//! [`DeviceContext`] is the single long-lived object behind the dispatcher.
//! Everything mutable (mode controller + report queue) sits behind one
//! `parking_lot::Mutex`. Each operation holds the lock only for its critical
//! section and completes pending reads and publishes events after releasing
//! it, so completion callbacks may re-enter the device freely.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use super::error::HidError;
use super::mode::{ModeController, ModeTransition};
use super::queue::{PendingRead, PushOutcome, QueueStats, ReadCompletion, ReportQueue};
use super::report_desc::{hid_descriptor, report_byte_length};
use super::types::{DeviceMode, HidAttributes, InputReport, RequestId};
use crate::config::{QueueConfig, VhidConfig};
use crate::events::{DeviceEvent, DropReason, EventBus};
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// What happened to an accepted report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "request_id", rename_all = "snake_case")]
pub enum SubmitStatus {
    /// Handed to the pending read with this id
    Delivered(RequestId),
    /// Buffered until the next read
    Buffered,
    /// Buffered; an older report was evicted to make room
    BufferedWithDrop,
    /// Accepted but refused by the overflow policy
    Dropped,
}

/// Result of a read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// A buffered report was available; the completion was not invoked
    Ready(Bytes),
    /// Parked; the completion fires exactly once later
    Pending(RequestId),
}

const OVERFLOW_LOG_KEY: &str = "queue_overflow";

struct DeviceState {
    mode: ModeController,
    queue: ReportQueue,
}

/// Emulated HID device
pub struct DeviceContext {
    attributes: HidAttributes,
    policies: QueueConfig,
    state: Mutex<DeviceState>,
    next_request_id: AtomicU64,
    events: Option<Arc<EventBus>>,
    throttler: LogThrottler,
}

impl DeviceContext {
    /// Create a device presenting `initial_mode`
    pub fn new(attributes: HidAttributes, initial_mode: DeviceMode, policies: QueueConfig) -> Self {
        info!(
            "Creating virtual HID device {:04x}:{:04x} v{:04x} in {} mode",
            attributes.vendor_id, attributes.product_id, attributes.version_number, initial_mode
        );
        let queue = ReportQueue::new(policies.policy_for(initial_mode));
        Self {
            attributes,
            policies,
            state: Mutex::new(DeviceState {
                mode: ModeController::new(initial_mode),
                queue,
            }),
            next_request_id: AtomicU64::new(1),
            events: None,
            throttler: LogThrottler::default(),
        }
    }

    /// Create a device from configuration
    ///
    /// The configuration is validated first, so settings assembled in code
    /// get the same checks as a loaded file.
    pub fn from_config(config: &VhidConfig) -> crate::error::Result<Self> {
        config.validate()?;
        let mut device = Self::new(
            config.device.attributes(),
            config.device.initial_mode,
            config.queue.clone(),
        );
        device.throttler = LogThrottler::with_secs(config.log.throttle_secs);
        Ok(device)
    }

    /// Attach an event bus for state notifications
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn attributes(&self) -> HidAttributes {
        self.attributes
    }

    /// Current mode
    pub fn mode(&self) -> DeviceMode {
        self.state.lock().mode.mode()
    }

    /// Number of mode transitions performed so far
    pub fn epoch(&self) -> u64 {
        self.state.lock().mode.epoch()
    }

    /// Report descriptor of the current mode
    pub fn report_descriptor(&self) -> &'static [u8] {
        self.state.lock().mode.descriptor()
    }

    /// HID class descriptor of the current mode
    pub fn hid_descriptor(&self) -> [u8; 9] {
        hid_descriptor(self.mode())
    }

    /// Switch the device to `mode`
    ///
    /// Every pending read completes with [`HidError::Reconfigured`] and every
    /// buffered report is discarded. Reports accepted after this returns are
    /// validated against `mode`.
    pub fn set_mode(&self, mode: DeviceMode) -> ModeTransition {
        let (transition, flushed, policy) = {
            let mut state = self.state.lock();
            let transition = state.mode.switch_to(mode);
            let flushed = state.queue.flush(self.policies.policy_for(mode));
            (transition, flushed, state.queue.policy())
        };

        info!(
            "Device mode {} -> {} (epoch {}): flushed {} pending reads, discarded {} reports",
            transition.from,
            transition.to,
            transition.epoch,
            flushed.reads.len(),
            flushed.discarded
        );
        debug!(
            "Queue policy for {}: capacity {}, {:?}",
            mode, policy.capacity, policy.overflow
        );
        // First overflow of a new epoch is always reported
        self.throttler.clear(OVERFLOW_LOG_KEY);

        let flushed_reads = flushed.reads.len();
        for read in flushed.reads {
            read.complete(Err(HidError::Reconfigured));
        }

        self.publish(DeviceEvent::ModeChanged {
            from: transition.from,
            to: transition.to,
            epoch: transition.epoch,
            flushed_reads,
            discarded_reports: flushed.discarded,
        });
        transition
    }

    /// Switch mode by wire tag; unknown tags fail with `InvalidMode`
    pub fn set_mode_tag(&self, tag: u8) -> Result<ModeTransition, HidError> {
        let mode = DeviceMode::try_from(tag)?;
        Ok(self.set_mode(mode))
    }

    /// Submit a typed report from the producer
    pub fn submit_report(&self, report: &InputReport) -> Result<SubmitStatus, HidError> {
        match report.to_bytes() {
            Ok(bytes) => self.submit_raw(report.mode(), bytes),
            Err(e) => {
                self.state.lock().queue.record_rejected();
                debug!("Rejected {} report: {}", report.mode(), e);
                Err(e)
            }
        }
    }

    /// Submit an encoded report tagged with the mode it was formed for
    pub fn submit_raw(&self, mode: DeviceMode, bytes: Bytes) -> Result<SubmitStatus, HidError> {
        let outcome = {
            let mut state = self.state.lock();
            if let Err(e) = state.mode.validate(mode, bytes.len()) {
                state.queue.record_rejected();
                drop(state);
                debug!("Rejected report: {}", e);
                return Err(e);
            }
            state.queue.push(bytes)
        };

        match outcome {
            PushOutcome::Deliver { read, result } => {
                let id = read.id;
                match &result {
                    Ok(bytes) => trace!(
                        "Delivered {} report to read {}: {:02X?}",
                        mode,
                        id,
                        &bytes[..]
                    ),
                    Err(e) => {
                        warn!("Dropped {} report for read {}: {}", mode, id, e);
                        self.publish(DeviceEvent::ReportDropped {
                            mode,
                            reason: DropReason::BufferTooSmall,
                        });
                    }
                }
                read.complete(result);
                Ok(SubmitStatus::Delivered(id))
            }
            PushOutcome::Buffered => {
                trace!("Buffered {} report", mode);
                Ok(SubmitStatus::Buffered)
            }
            PushOutcome::BufferedWithDrop => {
                self.report_overflow(mode);
                Ok(SubmitStatus::BufferedWithDrop)
            }
            PushOutcome::Dropped => {
                self.report_overflow(mode);
                Ok(SubmitStatus::Dropped)
            }
        }
    }

    /// Issue a read for the next report
    ///
    /// Returns the report immediately when one is buffered (the completion is
    /// dropped without being called). Otherwise the read is parked and
    /// `completion` fires exactly once: with the next report, or with
    /// `Canceled`, `Reconfigured` or `BufferTooSmall`.
    pub fn read_input_report(
        &self,
        capacity: usize,
        completion: ReadCompletion,
    ) -> Result<ReadStatus, HidError> {
        let mut state = self.state.lock();
        let required = report_byte_length(state.mode.mode());
        if capacity < required {
            return Err(HidError::BufferTooSmall { required, capacity });
        }

        if let Some(report) = state.queue.pop() {
            drop(state);
            trace!("Read satisfied from buffer: {:02X?}", &report[..]);
            return Ok(ReadStatus::Ready(report));
        }

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        state.queue.register(PendingRead::new(id, capacity, completion));
        drop(state);
        debug!("Read {} pending", id);
        Ok(ReadStatus::Pending(id))
    }

    /// Cancel a pending read
    ///
    /// Returns `true` when the read was still pending; its completion then
    /// fires with `Canceled`. Returns `false` when it had already been
    /// resolved, in which case nothing happens.
    pub fn cancel_read(&self, id: RequestId) -> bool {
        let read = self.state.lock().queue.cancel(id);
        match read {
            Some(read) => {
                debug!("Read {} canceled", id);
                read.complete(Err(HidError::Canceled));
                self.publish(DeviceEvent::ReadCanceled { request_id: id });
                true
            }
            None => {
                trace!("Cancel of read {} ignored, already resolved", id);
                false
            }
        }
    }

    /// Read the next report, waiting for the producer if necessary
    ///
    /// Dropping the returned future before it resolves cancels the read.
    pub async fn read_report(&self, capacity: usize) -> Result<Bytes, HidError> {
        let (tx, rx) = oneshot::channel();
        let completion: ReadCompletion = Box::new(move |result| {
            let _ = tx.send(result);
        });

        match self.read_input_report(capacity, completion)? {
            ReadStatus::Ready(report) => Ok(report),
            ReadStatus::Pending(id) => {
                let mut guard = CancelOnDrop {
                    device: self,
                    id,
                    armed: true,
                };
                let result = rx.await.unwrap_or(Err(HidError::Canceled));
                guard.armed = false;
                result
            }
        }
    }

    /// Snapshot of the queue counters
    pub fn stats(&self) -> QueueStats {
        self.state.lock().queue.stats()
    }

    /// Number of reads currently parked
    pub fn pending_reads(&self) -> usize {
        self.state.lock().queue.pending_len()
    }

    /// Number of reports currently buffered
    pub fn buffered_reports(&self) -> usize {
        self.state.lock().queue.buffered_len()
    }

    fn report_overflow(&self, mode: DeviceMode) {
        warn_throttled!(
            self.throttler,
            OVERFLOW_LOG_KEY,
            "Report queue full in {} mode, dropping report",
            mode
        );
        self.publish(DeviceEvent::ReportDropped {
            mode,
            reason: DropReason::Overflow,
        });
    }

    fn publish(&self, event: DeviceEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl Drop for DeviceContext {
    /// Device removal: every read still parked completes with `Canceled`
    fn drop(&mut self) {
        let reads = self.state.get_mut().queue.drain_pending();
        if reads.is_empty() {
            return;
        }
        info!("Device removed, canceling {} pending reads", reads.len());
        for read in reads {
            let id = read.id;
            read.complete(Err(HidError::Canceled));
            self.publish(DeviceEvent::ReadCanceled { request_id: id });
        }
    }
}

struct CancelOnDrop<'a> {
    device: &'a DeviceContext,
    id: RequestId,
    armed: bool,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.device.cancel_read(self.id);
        }
    }
}
