//! Report queue
//!
//! Rendezvous between the report producer and the consumer's read requests.
//! At any time at most one of the two lists is non-empty: either reads are
//! waiting for reports, or reports are waiting for reads.
//!
//! The queue never invokes a completion itself. Operations hand the resolved
//! [`PendingRead`]s back to the caller, which completes them after releasing
//! the device lock.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::error::HidError;
use super::types::{DeviceMode, RequestId};

/// Completion callback of a deferred read
pub type ReadCompletion = Box<dyn FnOnce(Result<Bytes, HidError>) + Send + 'static>;

/// A read request that arrived while no report was buffered
pub struct PendingRead {
    /// Request handle
    pub id: RequestId,
    /// Destination buffer capacity in bytes
    pub capacity: usize,
    completion: ReadCompletion,
}

impl PendingRead {
    pub fn new(id: RequestId, capacity: usize, completion: ReadCompletion) -> Self {
        Self {
            id,
            capacity,
            completion,
        }
    }

    /// Consume the request and invoke its completion
    ///
    /// Must be called without holding the device lock.
    pub fn complete(self, result: Result<Bytes, HidError>) {
        (self.completion)(result)
    }
}

impl fmt::Debug for PendingRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRead")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// What to do with a new report when the buffer is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Overwrite the newest buffered report
    LatestWins,
    /// Evict the oldest buffered report
    DropOldest,
    /// Refuse the incoming report
    DropNewest,
}

/// Buffering policy of one device mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    /// Maximum number of buffered reports (at least 1)
    pub capacity: usize,
    /// Overflow behaviour once `capacity` reports are buffered
    pub overflow: OverflowPolicy,
}

impl QueuePolicy {
    /// Default policy for `mode`
    ///
    /// Relative deltas should not accumulate latency, so the mouse keeps only
    /// the latest report. Touch modes keep a short FIFO and shed the oldest.
    pub fn default_for(mode: DeviceMode) -> Self {
        if mode.is_touch() {
            Self {
                capacity: 4,
                overflow: OverflowPolicy::DropOldest,
            }
        } else {
            Self {
                capacity: 1,
                overflow: OverflowPolicy::LatestWins,
            }
        }
    }
}

/// Queue counters (cumulative over the device lifetime)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Reports that passed validation
    pub accepted: u64,
    /// Reports handed to a consumer (immediately or deferred)
    pub delivered: u64,
    /// Reports that went into the buffer
    pub buffered: u64,
    /// Reports lost to the overflow policy
    pub overflow_drops: u64,
    /// Reports dropped because the pending read could not hold them
    pub too_small_drops: u64,
    /// Reports rejected by validation
    pub rejected: u64,
    /// Pending reads canceled by the consumer
    pub canceled: u64,
    /// Pending reads flushed by a mode transition
    pub reconfigured: u64,
}

/// Result of pushing a validated report
#[derive(Debug)]
pub enum PushOutcome {
    /// The oldest pending read was resolved; complete it with `result`
    Deliver {
        read: PendingRead,
        result: Result<Bytes, HidError>,
    },
    /// Stored in the buffer
    Buffered,
    /// Stored in the buffer after evicting an older report
    BufferedWithDrop,
    /// Refused by the overflow policy
    Dropped,
}

/// State flushed by a mode transition
#[derive(Debug, Default)]
pub struct Flushed {
    /// Pending reads to complete with `Reconfigured`
    pub reads: Vec<PendingRead>,
    /// Number of buffered reports discarded
    pub discarded: usize,
}

/// Report queue of one device
#[derive(Debug)]
pub struct ReportQueue {
    policy: QueuePolicy,
    buffered: VecDeque<Bytes>,
    pending: VecDeque<PendingRead>,
    stats: QueueStats,
}

impl ReportQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            buffered: VecDeque::with_capacity(policy.capacity),
            pending: VecDeque::new(),
            stats: QueueStats::default(),
        }
    }

    /// Active buffering policy
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Push a report that already passed validation
    pub fn push(&mut self, report: Bytes) -> PushOutcome {
        self.stats.accepted += 1;

        if let Some(read) = self.pending.pop_front() {
            if read.capacity < report.len() {
                self.stats.too_small_drops += 1;
                let required = report.len();
                let capacity = read.capacity;
                return PushOutcome::Deliver {
                    read,
                    result: Err(HidError::BufferTooSmall { required, capacity }),
                };
            }
            self.stats.delivered += 1;
            return PushOutcome::Deliver {
                read,
                result: Ok(report),
            };
        }

        if self.buffered.len() < self.policy.capacity {
            self.buffered.push_back(report);
            self.stats.buffered += 1;
            return PushOutcome::Buffered;
        }

        match self.policy.overflow {
            OverflowPolicy::LatestWins => {
                self.buffered.pop_back();
                self.buffered.push_back(report);
            }
            OverflowPolicy::DropOldest => {
                self.buffered.pop_front();
                self.buffered.push_back(report);
            }
            OverflowPolicy::DropNewest => {
                self.stats.overflow_drops += 1;
                return PushOutcome::Dropped;
            }
        }
        self.stats.overflow_drops += 1;
        self.stats.buffered += 1;
        PushOutcome::BufferedWithDrop
    }

    /// Take the next buffered report, if any
    pub fn pop(&mut self) -> Option<Bytes> {
        let report = self.buffered.pop_front()?;
        self.stats.delivered += 1;
        Some(report)
    }

    /// Park a read until a report arrives
    pub fn register(&mut self, read: PendingRead) {
        self.pending.push_back(read);
    }

    /// Remove a pending read; `None` if it was already resolved
    pub fn cancel(&mut self, id: RequestId) -> Option<PendingRead> {
        let index = self.pending.iter().position(|read| read.id == id)?;
        let read = self.pending.remove(index)?;
        self.stats.canceled += 1;
        Some(read)
    }

    /// Drop all in-flight state and switch to `policy`
    pub fn flush(&mut self, policy: QueuePolicy) -> Flushed {
        let discarded = self.buffered.len();
        self.buffered.clear();
        self.policy = policy;
        let reads: Vec<PendingRead> = self.pending.drain(..).collect();
        self.stats.reconfigured += reads.len() as u64;
        Flushed { reads, discarded }
    }

    /// Take every pending read, leaving buffered reports in place
    pub fn drain_pending(&mut self) -> Vec<PendingRead> {
        let reads: Vec<PendingRead> = self.pending.drain(..).collect();
        self.stats.canceled += reads.len() as u64;
        reads
    }

    /// Count a report that failed validation
    pub fn record_rejected(&mut self) {
        self.stats.rejected += 1;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}
