//! Device notifications
//!
//! The device publishes a [`DeviceEvent`] whenever in-flight state is thrown
//! away: a mode switch flushing reads and reports, a report dropped by the
//! overflow policy or a too-small read, a pending read canceled. The replay
//! harness logs them; embedders can subscribe to react to mode changes.

pub mod types;

pub use types::{DeviceEvent, DropReason};

use tokio::sync::broadcast;

/// Events kept for a slow subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of device events
///
/// Publishing never blocks and never fails, so the device calls it right
/// after releasing its lock, including from inside a completion callback
/// that re-entered the device.
///
/// ```no_run
/// use std::sync::Arc;
/// use vhid::config::VhidConfig;
/// use vhid::events::{DeviceEvent, EventBus};
/// use vhid::hid::{DeviceContext, DeviceMode};
///
/// # async fn run() -> vhid::Result<()> {
/// let bus = Arc::new(EventBus::new());
/// let mut rx = bus.subscribe();
/// let device = DeviceContext::from_config(&VhidConfig::default())?.with_event_bus(bus);
///
/// device.set_mode(DeviceMode::MultiTouch);
/// if let Ok(DeviceEvent::ModeChanged { to, epoch, .. }) = rx.recv().await {
///     assert_eq!((to, epoch), (DeviceMode::MultiTouch, 1));
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventBus {
    tx: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Send `event` to current subscribers; dropped when there are none
    pub fn publish(&self, event: DeviceEvent) {
        let _ = self.tx.send(event);
    }

    /// New receiver seeing events published from now on
    ///
    /// Falling more than the channel capacity behind yields `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::DeviceMode;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(DeviceEvent::ReadCanceled { request_id: 7 });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, DeviceEvent::ReadCanceled { request_id: 7 });
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DeviceEvent::ReportDropped {
            mode: DeviceMode::Mouse,
            reason: DropReason::Overflow,
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            DeviceEvent::ReportDropped { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            DeviceEvent::ReportDropped { .. }
        ));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(DeviceEvent::ReadCanceled { request_id: 1 });

        let mut rx = bus.subscribe();
        bus.publish(DeviceEvent::ReadCanceled { request_id: 2 });
        assert_eq!(
            rx.recv().await.unwrap(),
            DeviceEvent::ReadCanceled { request_id: 2 }
        );
    }
}
