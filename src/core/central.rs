//! # Central: the radio orchestration facade.
//!
//! [`Central`] owns the background tasks and exposes the operations of every
//! component behind one handle:
//!
//! ```text
//!                 ┌────────────────────────────── Central ──────────────────────────────┐
//! caller ──────►  │ subscribe_discovery ─► DiscoveryBroadcaster ─► DiscoveryStream      │
//!                 │ status / status_changes ◄── ScanController task ◄── readiness+count │
//!                 │ connect / disconnect ─► ConnectionCoordinator ─┐                    │
//!                 │ discover_services ─► DiscoveryOrchestrator ────┼─► RadioContext task│
//!                 │                                                │     (driver owner) │
//!                 │ bus ─► observer listener task ─► SubscriberSet                      │
//!                 └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shutdown
//! [`Central::shutdown`] publishes `ShutdownRequested`, cancels the radio and
//! scan tasks, waits for them up to `cfg.grace`, publishes `AllStoppedWithin` or
//! `GraceExceeded` (aborting the stragglers), then drains and stops observers.
//!
//! Dropping the last `Arc<Central>` cancels every background task.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use radiovisor::{Central, CentralConfig};
//! use radiovisor::driver::{self, PeripheralRef, RadioDriver};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run(driver: Arc<dyn RadioDriver>, events: tokio::sync::mpsc::Receiver<driver::DriverEvent>)
//!     -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let central = Central::builder(CentralConfig::default()).build(driver, events);
//!
//!     let mut feed = central.subscribe_discovery();
//!     while let Some(snapshot) = feed.recv().await {
//!         if let Some(p) = snapshot.first() {
//!             let ctx = CancellationToken::new();
//!             let services = central.discover_services(p, &ctx).await?;
//!             println!("{} exposes {} services", p.name(), services.len());
//!             break;
//!         }
//!     }
//!
//!     central.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Mutex, PoisonError};

use futures::stream::BoxStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::CentralConfig;
use crate::core::broadcaster::{DiscoveryBroadcaster, DiscoveryStream, SubscriberId};
use crate::core::builder::CentralBuilder;
use crate::core::cache::DiscoveryCache;
use crate::core::connection::ConnectionCoordinator;
use crate::core::discovery::{DiscoveryOptions, DiscoveryOrchestrator};
use crate::core::scan::{status_stream, RadioStatus};
use crate::driver::{DiscoverySnapshot, PeripheralRef, ServiceCatalog};
use crate::error::{CentralError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;

/// Named background task.
type Worker = (&'static str, JoinHandle<()>);

/// Radio orchestration facade; see the [module docs](self).
pub struct Central {
    cfg: CentralConfig,
    bus: Bus,
    broadcaster: DiscoveryBroadcaster,
    status: watch::Receiver<RadioStatus>,
    connections: ConnectionCoordinator,
    discovery: DiscoveryOrchestrator,
    cache: DiscoveryCache,
    runtime_token: CancellationToken,
    observer_token: CancellationToken,
    workers: Mutex<Vec<Worker>>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct CentralParts {
    pub cfg: CentralConfig,
    pub bus: Bus,
    pub broadcaster: DiscoveryBroadcaster,
    pub status: watch::Receiver<RadioStatus>,
    pub connections: ConnectionCoordinator,
    pub discovery: DiscoveryOrchestrator,
    pub cache: DiscoveryCache,
    pub runtime_token: CancellationToken,
    pub workers: Vec<Worker>,
}

impl Central {
    /// Starts building a central with the given configuration.
    pub fn builder(cfg: CentralConfig) -> CentralBuilder {
        CentralBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        parts: CentralParts,
        observers: SubscriberSet,
        events: broadcast::Receiver<Event>,
    ) -> Self {
        let observer_token = CancellationToken::new();
        let observer = spawn_observer_listener(events, observers, observer_token.clone());

        Self {
            cfg: parts.cfg,
            bus: parts.bus,
            broadcaster: parts.broadcaster,
            status: parts.status,
            connections: parts.connections,
            discovery: parts.discovery,
            cache: parts.cache,
            runtime_token: parts.runtime_token,
            observer_token,
            workers: Mutex::new(parts.workers),
            observer: Mutex::new(Some(observer)),
        }
    }

    /// Registers a discovery feed consumer.
    ///
    /// The first consumer makes the radio scan (when powered and authorized).
    pub fn subscribe_discovery(&self) -> DiscoveryStream {
        self.broadcaster.subscribe()
    }

    /// Removes a discovery feed consumer. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.broadcaster.unsubscribe(id);
    }

    /// Observable number of discovery feed consumers.
    pub fn subscriber_count(&self) -> watch::Receiver<usize> {
        self.broadcaster.watch_count()
    }

    /// Latest discovery snapshot.
    pub fn current_snapshot(&self) -> DiscoverySnapshot {
        self.broadcaster.current()
    }

    /// Latest published radio status.
    pub fn status(&self) -> RadioStatus {
        *self.status.borrow()
    }

    /// Stream of radio status records, starting with the latest one.
    pub fn status_changes(&self) -> BoxStream<'static, RadioStatus> {
        status_stream(self.status.clone())
    }

    /// See [`ConnectionCoordinator::connect`].
    pub async fn connect(
        &self,
        peripheral: &PeripheralRef,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        self.connections.connect(peripheral, ctx).await
    }

    /// See [`ConnectionCoordinator::disconnect`].
    pub async fn disconnect(
        &self,
        peripheral: &PeripheralRef,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        self.connections.disconnect(peripheral, ctx).await
    }

    /// Discovers services with the configured default options.
    pub async fn discover_services(
        &self,
        peripheral: &PeripheralRef,
        ctx: &CancellationToken,
    ) -> Result<ServiceCatalog, CentralError> {
        self.discovery
            .discover_services(peripheral, self.cfg.discovery, ctx)
            .await
    }

    /// Discovers services with explicit options.
    pub async fn discover_services_with(
        &self,
        peripheral: &PeripheralRef,
        options: DiscoveryOptions,
        ctx: &CancellationToken,
    ) -> Result<ServiceCatalog, CentralError> {
        self.discovery
            .discover_services(peripheral, options, ctx)
            .await
    }

    /// Connection coordinator shared with service discovery.
    pub fn connections(&self) -> &ConnectionCoordinator {
        &self.connections
    }

    /// Service catalog cache shared with service discovery.
    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    /// Runtime event bus (subscribe for raw events).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Configuration the central was built with.
    pub fn config(&self) -> &CentralConfig {
        &self.cfg
    }

    /// Stops the background tasks within `cfg.grace`.
    ///
    /// Calling it again is harmless: there is nothing left to stop.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let grace = self.cfg.grace;
        let deadline = time::Instant::now() + grace;

        let mut stuck = Vec::new();
        for (name, mut handle) in workers {
            if time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                stuck.push(name.to_string());
            }
        }

        let res = if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")),
            );
            Err(RuntimeError::GraceExceeded { grace, stuck })
        };

        self.observer_token.cancel();
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = observer {
            if time::timeout(grace, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        res
    }
}

impl Drop for Central {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        self.observer_token.cancel();
    }
}

/// Forwards bus events to the observers until cancelled, then drains them.
fn spawn_observer_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = token.cancelled() => break,
            }
        }
        set.shutdown().await;
    })
}
