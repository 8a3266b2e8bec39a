//! # LogWriter: structured event logging
//!
//! A subscriber that renders incoming [`Event`]s through `tracing`.
//! Install any `tracing` subscriber in the host process to collect the output.
//!
//! ## Levels
//! - `warn`: failures (connect/disconnect/discovery/command), overflow, panics, grace exceeded
//! - `info`: connection changes, status changes, discovered catalogs, shutdown
//! - `debug`: everything else

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let peripheral = e.peripheral.map(|p| p.to_string());
        let peripheral = peripheral.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                tracing::warn!(
                    seq = e.seq,
                    subscriber = e.source.as_deref().unwrap_or("unknown"),
                    reason,
                    "{}",
                    label(e.kind)
                );
            }
            EventKind::CommandFailed
            | EventKind::ConnectFailed
            | EventKind::DisconnectFailed
            | EventKind::DiscoveryFailed
            | EventKind::TimeoutHit
            | EventKind::GraceExceeded => {
                tracing::warn!(
                    seq = e.seq,
                    peripheral,
                    attempt = e.attempt,
                    timeout_ms = e.timeout_ms,
                    reason,
                    "{}",
                    label(e.kind)
                );
            }
            EventKind::BackoffScheduled => {
                tracing::info!(
                    seq = e.seq,
                    peripheral,
                    delay_ms = e.delay_ms,
                    after_attempt = e.attempt,
                    reason,
                    "backoff"
                );
            }
            EventKind::StatusPublished => {
                if let Some(s) = e.status {
                    tracing::info!(
                        seq = e.seq,
                        authorized = s.authorized,
                        powered = s.powered,
                        scanning = s.scanning,
                        subscribers = e.count,
                        "status"
                    );
                }
            }
            EventKind::Connected
            | EventKind::Disconnected
            | EventKind::ServicesDiscovered
            | EventKind::ShutdownRequested
            | EventKind::AllStoppedWithin => {
                tracing::info!(
                    seq = e.seq,
                    peripheral,
                    attempt = e.attempt,
                    count = e.count,
                    "{}",
                    label(e.kind)
                );
            }
            _ => {
                tracing::debug!(
                    seq = e.seq,
                    peripheral,
                    subscriber = ?e.subscriber,
                    attempt = e.attempt,
                    count = e.count,
                    reason,
                    "{}",
                    label(e.kind)
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::SubscriberPanicked => "subscriber-panicked",
        EventKind::SubscriberOverflow => "subscriber-overflow",
        EventKind::ReadinessChanged => "readiness-changed",
        EventKind::ScanStartRequested => "scan-start",
        EventKind::ScanStopRequested => "scan-stop",
        EventKind::CommandFailed => "command-failed",
        EventKind::StatusPublished => "status",
        EventKind::SnapshotPublished => "snapshot",
        EventKind::DiscoverySubscribed => "feed-subscribed",
        EventKind::DiscoveryUnsubscribed => "feed-unsubscribed",
        EventKind::ConnectRequested => "connect-requested",
        EventKind::Connected => "connected",
        EventKind::ConnectFailed => "connect-failed",
        EventKind::DisconnectRequested => "disconnect-requested",
        EventKind::Disconnected => "disconnected",
        EventKind::DisconnectFailed => "disconnect-failed",
        EventKind::OutcomeIgnored => "outcome-ignored",
        EventKind::CacheHit => "cache-hit",
        EventKind::DiscoveryStarting => "discovery-starting",
        EventKind::DiscoveryFailed => "discovery-failed",
        EventKind::TimeoutHit => "timeout",
        EventKind::BackoffScheduled => "backoff",
        EventKind::ServicesDiscovered => "services-discovered",
        EventKind::ShutdownRequested => "shutdown-requested",
        EventKind::AllStoppedWithin => "all-stopped-within-grace",
        EventKind::GraceExceeded => "grace-exceeded",
    }
}
