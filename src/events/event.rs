//! # Runtime events emitted by the radiovisor components.
//!
//! The [`EventKind`] enum classifies event types across five categories:
//! - **Observer events**: subscriber worker health (overflow, panic)
//! - **Radio events**: readiness, scan commands and published status
//! - **Discovery feed events**: snapshot publication and consumer registration
//! - **Connection events**: connect/disconnect lifecycle
//! - **Service discovery events**: attempts, backoff, cache hits, results
//!
//! The [`Event`] struct carries additional metadata such as timestamps, peripheral id,
//! reasons, counters, and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use radiovisor::{Event, EventKind};
//! use radiovisor::driver::PeripheralId;
//!
//! let id = PeripheralId::new_v4();
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_peripheral(id)
//!     .with_reason("gatt error 133")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(6));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.peripheral, Some(id));
//! assert_eq!(ev.delay_ms, Some(6_000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::{RadioStatus, SubscriberId};
use crate::driver::PeripheralId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Observer events ===
    /// Observer panicked during event processing.
    ///
    /// Sets: `source` (observer name), `reason` (panic message).
    SubscriberPanicked,

    /// Observer dropped an event (queue full or worker closed).
    ///
    /// Sets: `source` (observer name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Radio events ===
    /// Driver reported a power/permission change.
    ///
    /// Sets: `reason` (rendered readiness).
    ReadinessChanged,

    /// Scan controller asked the driver to scan.
    ScanStartRequested,

    /// Scan controller asked the driver to stop scanning.
    ScanStopRequested,

    /// A driver command failed to issue (scan commands are not retried).
    ///
    /// Sets: `reason`, optionally `peripheral`.
    CommandFailed,

    /// Scan controller published a status record.
    ///
    /// Sets: `status`, `count` (subscriber count used for the decision).
    StatusPublished,

    // === Discovery feed events ===
    /// A new snapshot was delivered to all registered consumers.
    ///
    /// Sets: `count` (peripherals in snapshot).
    SnapshotPublished,

    /// A consumer registered with the discovery feed.
    ///
    /// Sets: `subscriber`, `count` (consumers after registration).
    DiscoverySubscribed,

    /// A consumer left the discovery feed.
    ///
    /// Sets: `subscriber`, `count` (consumers after removal).
    DiscoveryUnsubscribed,

    // === Connection events ===
    /// Connect command issued.
    ConnectRequested,
    /// Driver confirmed the connection.
    Connected,
    /// Connect failed (driver outcome or refused command).
    ///
    /// Sets: `reason`.
    ConnectFailed,
    /// Disconnect command issued.
    DisconnectRequested,
    /// Driver confirmed the disconnection.
    Disconnected,
    /// Disconnect failed.
    ///
    /// Sets: `reason`.
    DisconnectFailed,
    /// Driver outcome arrived with nobody waiting for it (late or duplicate).
    ///
    /// Sets: `peripheral`, `reason` (operation).
    OutcomeIgnored,

    // === Service discovery events ===
    /// Catalog served from the cache; no connection attempted.
    CacheHit,
    /// Service discovery attempt is starting.
    ///
    /// Sets: `peripheral`, `attempt` (1-based).
    DiscoveryStarting,
    /// Service discovery attempt failed.
    ///
    /// Sets: `peripheral`, `attempt`, `reason`.
    DiscoveryFailed,
    /// Attempt exceeded its time budget (always followed by `DiscoveryFailed`).
    ///
    /// Sets: `peripheral`, `attempt`, `timeout_ms`.
    TimeoutHit,
    /// Next attempt scheduled after a failure.
    ///
    /// Sets: `peripheral`, `attempt` (previous attempt), `delay_ms`, `reason`.
    BackoffScheduled,
    /// Catalog retrieved from the peripheral and stored in the cache.
    ///
    /// Sets: `peripheral`, `attempt`, `count` (services).
    ServicesDiscovered,

    // === Shutdown events ===
    /// `Central::shutdown` was called.
    ShutdownRequested,
    /// All background tasks stopped within the grace period.
    AllStoppedWithin,
    /// Grace period exceeded; remaining tasks were aborted.
    ///
    /// Sets: `reason` (stuck task names).
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Peripheral the event refers to.
    pub peripheral: Option<PeripheralId>,
    /// Discovery feed consumer the event refers to.
    pub subscriber: Option<SubscriberId>,
    /// Observer or background task name.
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Kind-specific counter (consumers, peripherals, services).
    pub count: Option<usize>,
    /// Published radio status.
    pub status: Option<RadioStatus>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            peripheral: None,
            subscriber: None,
            source: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            count: None,
            status: None,
        }
    }

    #[inline]
    pub fn with_peripheral(mut self, id: PeripheralId) -> Self {
        self.peripheral = Some(id);
        self
    }

    #[inline]
    pub fn with_subscriber(mut self, id: SubscriberId) -> Self {
        self.subscriber = Some(id);
        self
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    #[inline]
    pub fn with_status(mut self, status: RadioStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ScanStartRequested);
        let b = Event::new(EventKind::ScanStopRequested);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn durations_saturate_to_u32_millis() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn overflow_helper_sets_source() {
        let ev = Event::subscriber_overflow("metrics", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.source.as_deref(), Some("metrics"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=metrics reason=full"));
    }
}
