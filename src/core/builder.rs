use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::CentralConfig;
use crate::driver::{DriverEvent, RadioDriver, Readiness};
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::broadcaster::DiscoveryBroadcaster;
use super::cache::DiscoveryCache;
use super::central::{Central, CentralParts};
use super::connection::ConnectionCoordinator;
use super::discovery::DiscoveryOrchestrator;
use super::expectation::ExpectationTable;
use super::radio::{RadioContext, RadioHandle};
use super::scan::{RadioStatus, ScanController};

/// Builder for constructing a [`Central`] with optional observers.
pub struct CentralBuilder {
    cfg: CentralConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl CentralBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: CentralConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event observers.
    ///
    /// Observers receive runtime events (scan commands, connection lifecycle,
    /// discovery attempts) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a single event observer.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the central and spawns its background tasks.
    ///
    /// `events` is the receiving half of the channel the driver reports through
    /// (see [`driver::channel`](crate::driver::channel)).
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(
        self,
        driver: Arc<dyn RadioDriver>,
        events: mpsc::Receiver<DriverEvent>,
    ) -> Arc<Central> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let observers = SubscriberSet::new(self.subscribers, bus.clone());
        let observed = bus.subscribe();
        let runtime_token = CancellationToken::new();

        let broadcaster = DiscoveryBroadcaster::new(bus.clone());
        let expectations = ExpectationTable::new();
        let (readiness_tx, readiness_rx) = watch::channel(Readiness::default());
        let (status_tx, status_rx) = watch::channel(RadioStatus::default());
        let (radio, commands) = RadioHandle::channel(self.cfg.command_capacity_clamped());

        let context = RadioContext::new(
            driver,
            commands,
            events,
            broadcaster.clone(),
            readiness_tx,
            Arc::clone(&expectations),
            bus.clone(),
        );
        let scan = ScanController::new(
            radio.clone(),
            readiness_rx,
            broadcaster.watch_count(),
            status_tx,
            bus.clone(),
        );

        let workers = vec![
            ("radio", tokio::spawn(context.run(runtime_token.clone()))),
            ("scan", tokio::spawn(scan.run(runtime_token.clone()))),
        ];

        let cache = DiscoveryCache::new();
        let connections = ConnectionCoordinator::new(radio.clone(), expectations, bus.clone());
        let discovery = DiscoveryOrchestrator::new(
            connections.clone(),
            radio,
            cache.clone(),
            self.cfg.retry,
            self.cfg.disconnect_grace,
            bus.clone(),
        );

        Arc::new(Central::new_internal(
            CentralParts {
                cfg: self.cfg,
                bus,
                broadcaster,
                status: status_rx,
                connections,
                discovery,
                cache,
                runtime_token,
                workers,
            },
            observers,
            observed,
        ))
    }
}
