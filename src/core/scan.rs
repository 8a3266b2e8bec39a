//! # Scan state controller.
//!
//! Keeps the physical scan in step with demand:
//!
//! ```text
//! scanning = powered && authorized && consumers > 0
//! ```
//!
//! The controller watches two inputs (driver readiness and the discovery feed's
//! consumer count) and re-evaluates on every change of either. Both inputs are
//! `watch` channels, so each evaluation combines the **latest** values and a
//! burst of changes collapses into one evaluation.
//!
//! ## Rules
//! - Every evaluation issues exactly one command (start or stop) and publishes
//!   one [`RadioStatus`], even if nothing changed. Redundant commands are
//!   assumed to be harmless at the driver.
//! - Late observers of the status get the latest value first.
//! - A failed scan command is reported on the bus and not retried.

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::radio::RadioHandle;
use crate::driver::Readiness;
use crate::events::{Bus, Event, EventKind};

/// Published radio status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RadioStatus {
    /// Permission to use the radio is granted.
    pub authorized: bool,
    /// Radio is powered on.
    pub powered: bool,
    /// Physical scan is requested.
    pub scanning: bool,
}

impl RadioStatus {
    /// Coarse state derived from the status flags.
    pub fn state(&self) -> RadioState {
        match (self.authorized && self.powered, self.scanning) {
            (false, _) => RadioState::NotReady,
            (true, false) => RadioState::ReadyIdle,
            (true, true) => RadioState::ReadyScanning,
        }
    }
}

/// Coarse radio state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioState {
    /// Powered off or not authorized.
    NotReady,
    /// Ready, nobody is consuming the discovery feed.
    ReadyIdle,
    /// Ready and scanning for at least one consumer.
    ReadyScanning,
}

/// Computes the status for the given inputs.
pub fn evaluate(readiness: Readiness, consumers: usize) -> RadioStatus {
    RadioStatus {
        authorized: readiness.authorized,
        powered: readiness.powered,
        scanning: readiness.is_ready() && consumers > 0,
    }
}

pub(crate) struct ScanController {
    radio: RadioHandle,
    readiness: watch::Receiver<Readiness>,
    consumers: watch::Receiver<usize>,
    status: watch::Sender<RadioStatus>,
    bus: Bus,
}

impl ScanController {
    pub fn new(
        radio: RadioHandle,
        readiness: watch::Receiver<Readiness>,
        consumers: watch::Receiver<usize>,
        status: watch::Sender<RadioStatus>,
        bus: Bus,
    ) -> Self {
        Self {
            radio,
            readiness,
            consumers,
            status,
            bus,
        }
    }

    /// Evaluates once, then on every input change until cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        self.apply().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = self.readiness.changed() => if res.is_err() { break },
                res = self.consumers.changed() => if res.is_err() { break },
            }
            self.apply().await;
        }
    }

    async fn apply(&mut self) {
        let readiness = *self.readiness.borrow_and_update();
        let consumers = *self.consumers.borrow_and_update();
        let status = evaluate(readiness, consumers);

        if status.scanning {
            self.bus.publish(Event::new(EventKind::ScanStartRequested).with_count(consumers));
            self.radio.start_scan().await;
        } else {
            self.bus.publish(Event::new(EventKind::ScanStopRequested).with_count(consumers));
            self.radio.stop_scan().await;
        }

        self.status.send_replace(status);
        self.bus.publish(
            Event::new(EventKind::StatusPublished)
                .with_status(status)
                .with_count(consumers),
        );
    }
}

/// Turns a status receiver into a stream that yields the current value first.
///
/// Intermediate values may be skipped when the observer is slower than the
/// controller; the latest value is never skipped. Ends when the controller stops.
pub(crate) fn status_stream(rx: watch::Receiver<RadioStatus>) -> BoxStream<'static, RadioStatus> {
    futures::stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let status = *rx.borrow_and_update();
        Some((status, (rx, false)))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Central;
    use crate::driver::mock::{Command, MockRadio};
    use crate::driver::channel;
    use crate::CentralConfig;

    fn readiness(powered: bool, authorized: bool) -> Readiness {
        Readiness {
            powered,
            authorized,
        }
    }

    #[test]
    fn scanning_requires_all_three_conditions() {
        for powered in [false, true] {
            for authorized in [false, true] {
                for consumers in [0usize, 1, 3] {
                    let s = evaluate(readiness(powered, authorized), consumers);
                    assert_eq!(s.scanning, powered && authorized && consumers > 0);
                    assert_eq!(s.powered, powered);
                    assert_eq!(s.authorized, authorized);
                }
            }
        }
    }

    #[test]
    fn state_is_derived_from_flags() {
        assert_eq!(evaluate(readiness(true, false), 1).state(), RadioState::NotReady);
        assert_eq!(evaluate(readiness(true, true), 0).state(), RadioState::ReadyIdle);
        assert_eq!(evaluate(readiness(true, true), 2).state(), RadioState::ReadyScanning);
    }

    #[tokio::test]
    async fn scan_follows_readiness_and_consumers() {
        let (tx, rx) = channel(64);
        let mock = MockRadio::new(tx);
        let central = Central::builder(CentralConfig::default()).build(mock.clone(), rx);
        let mut statuses = central.status_changes();

        assert_eq!(statuses.next().await.map(|s| s.scanning), Some(false));

        mock.set_readiness(true, true).await;
        let feed = central.subscribe_discovery();

        let mut last = RadioStatus::default();
        while !last.scanning {
            last = statuses.next().await.unwrap();
        }
        assert!(last.powered && last.authorized);
        mock.wait_for(|c| c.contains(&Command::StartScan)).await;

        drop(feed);
        while last.scanning {
            last = statuses.next().await.unwrap();
        }
        mock.wait_for(|c| c.last() == Some(&Command::StopScan)).await;

        // power loss with a consumer present: not scanning
        let _feed = central.subscribe_discovery();
        mock.set_readiness(false, true).await;
        let mut settled = false;
        while !settled {
            let s = statuses.next().await.unwrap();
            assert!(!s.scanning || s.powered);
            settled = !s.powered;
        }
        assert!(!central.status().scanning);
        assert_eq!(central.status().state(), RadioState::NotReady);

        central.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn late_observer_gets_latest_status_first() {
        let (tx, rx) = channel(64);
        let mock = MockRadio::new(tx);
        let central = Central::builder(CentralConfig::default()).build(mock.clone(), rx);

        mock.set_readiness(true, true).await;
        let mut early = central.status_changes();
        while !early.next().await.unwrap().powered {}

        let mut late = central.status_changes();
        let first = late.next().await.unwrap();
        assert!(first.powered && first.authorized);

        central.shutdown().await.unwrap();
    }
}
