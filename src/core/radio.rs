//! # Radio context: the single owner of the driver.
//!
//! All driver commands and all driver callbacks are handled by one task, so
//! component state touched from driver callbacks never races with commands.
//!
//! ```text
//! RadioHandle (clone per component)
//!     │  RadioCommand (mpsc, bounded)
//!     ▼
//! RadioContext::run ── select! ──┬─ command        → driver call (+ oneshot reply)
//!                                ├─ DriverEvent    → readiness watch / broadcaster / expectations
//!                                ├─ enumeration    → FuturesUnordered, reply when done
//!                                └─ cancellation   → exit
//! ```
//!
//! ## Rules
//! - Scan commands are fire-and-forget; failures are reported on the bus, never retried.
//! - Service enumeration runs concurrently inside the context (it can take seconds
//!   and must not block callbacks); every other driver call is awaited inline.
//! - Outcomes with no pending expectation are dropped with an `OutcomeIgnored` event.
//! - A closed context surfaces to callers as [`DriverError::context_closed`].

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::core::broadcaster::DiscoveryBroadcaster;
use crate::core::expectation::{ExpectationTable, Operation};
use crate::driver::{
    ConnectionState, DiscoverySnapshot, DriverEvent, PeripheralId, RadioDriver, Readiness,
    ServiceDescriptor,
};
use crate::error::DriverError;
use crate::events::{Bus, Event, EventKind};

type Reply<T> = oneshot::Sender<T>;

/// Request executed by the radio context.
pub(crate) enum RadioCommand {
    StartScan,
    StopScan,
    Connect {
        id: PeripheralId,
        reply: Reply<Result<(), DriverError>>,
    },
    Disconnect {
        id: PeripheralId,
        reply: Reply<Result<(), DriverError>>,
    },
    ConnectionState {
        id: PeripheralId,
        reply: Reply<ConnectionState>,
    },
    DiscoverServices {
        id: PeripheralId,
        reply: Reply<Result<Vec<ServiceDescriptor>, DriverError>>,
    },
}

/// Cloneable sender side of the radio context.
#[derive(Clone)]
pub(crate) struct RadioHandle {
    tx: mpsc::Sender<RadioCommand>,
}

impl RadioHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RadioCommand>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn start_scan(&self) {
        let _ = self.tx.send(RadioCommand::StartScan).await;
    }

    pub async fn stop_scan(&self) {
        let _ = self.tx.send(RadioCommand::StopScan).await;
    }

    /// Issues the connect command; `Ok` means issued, not connected.
    pub async fn connect(&self, id: PeripheralId) -> Result<(), DriverError> {
        self.request(|reply| RadioCommand::Connect { id, reply }).await?
    }

    /// Issues the disconnect command; `Ok` means issued, not disconnected.
    pub async fn disconnect(&self, id: PeripheralId) -> Result<(), DriverError> {
        self.request(|reply| RadioCommand::Disconnect { id, reply }).await?
    }

    pub async fn connection_state(&self, id: PeripheralId) -> Result<ConnectionState, DriverError> {
        self.request(|reply| RadioCommand::ConnectionState { id, reply }).await
    }

    pub async fn discover_services(
        &self,
        id: PeripheralId,
    ) -> Result<Vec<ServiceDescriptor>, DriverError> {
        self.request(|reply| RadioCommand::DiscoverServices { id, reply }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RadioCommand,
    ) -> Result<T, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| DriverError::context_closed())?;
        rx.await.map_err(|_| DriverError::context_closed())
    }
}

/// Task state of the radio context.
pub(crate) struct RadioContext {
    driver: Arc<dyn RadioDriver>,
    commands: mpsc::Receiver<RadioCommand>,
    events: mpsc::Receiver<DriverEvent>,
    broadcaster: DiscoveryBroadcaster,
    readiness: watch::Sender<Readiness>,
    expectations: Arc<ExpectationTable>,
    bus: Bus,
}

impl RadioContext {
    pub fn new(
        driver: Arc<dyn RadioDriver>,
        commands: mpsc::Receiver<RadioCommand>,
        events: mpsc::Receiver<DriverEvent>,
        broadcaster: DiscoveryBroadcaster,
        readiness: watch::Sender<Readiness>,
        expectations: Arc<ExpectationTable>,
        bus: Bus,
    ) -> Self {
        Self {
            driver,
            commands,
            events,
            broadcaster,
            readiness,
            expectations,
            bus,
        }
    }

    /// Runs until cancelled or until every [`RadioHandle`] is dropped.
    pub async fn run(mut self, token: CancellationToken) {
        let mut enumerations: FuturesUnordered<BoxFuture<'static, ()>> = FuturesUnordered::new();
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.execute(cmd, &mut enumerations).await,
                    None => break,
                },

                ev = self.events.recv(), if events_open => match ev {
                    Some(ev) => self.dispatch(ev),
                    None => events_open = false,
                },

                Some(()) = enumerations.next(), if !enumerations.is_empty() => {}
            }
        }
    }

    async fn execute(
        &self,
        cmd: RadioCommand,
        enumerations: &mut FuturesUnordered<BoxFuture<'static, ()>>,
    ) {
        match cmd {
            RadioCommand::StartScan => {
                if let Err(e) = self.driver.start_scan().await {
                    self.command_failed(None, "start scan", &e);
                }
            }
            RadioCommand::StopScan => {
                if let Err(e) = self.driver.stop_scan().await {
                    self.command_failed(None, "stop scan", &e);
                }
            }
            RadioCommand::Connect { id, reply } => {
                let res = self.driver.connect(id).await;
                if let Err(e) = &res {
                    self.command_failed(Some(id), "connect", e);
                }
                let _ = reply.send(res);
            }
            RadioCommand::Disconnect { id, reply } => {
                let res = self.driver.disconnect(id).await;
                if let Err(e) = &res {
                    self.command_failed(Some(id), "disconnect", e);
                }
                let _ = reply.send(res);
            }
            RadioCommand::ConnectionState { id, reply } => {
                let _ = reply.send(self.driver.connection_state(id).await);
            }
            RadioCommand::DiscoverServices { id, reply } => {
                let driver = Arc::clone(&self.driver);
                enumerations.push(
                    async move {
                        let res = driver.discover_services(id).await;
                        let _ = reply.send(res);
                    }
                    .boxed(),
                );
            }
        }
    }

    fn dispatch(&self, ev: DriverEvent) {
        match ev {
            DriverEvent::ReadinessChanged(r) => {
                self.readiness.send_replace(r);
                self.bus.publish(
                    Event::new(EventKind::ReadinessChanged)
                        .with_source(self.driver.name())
                        .with_reason(format!("powered={} authorized={}", r.powered, r.authorized)),
                );
            }
            DriverEvent::PeripheralsDiscovered(list) => {
                self.broadcaster.publish(DiscoverySnapshot::from(list));
            }
            DriverEvent::ConnectOutcome { id, result } => {
                self.resolve(id, Operation::Connect, result);
            }
            DriverEvent::DisconnectOutcome { id, result } => {
                self.resolve(id, Operation::Disconnect, result);
            }
        }
    }

    fn resolve(&self, id: PeripheralId, op: Operation, result: Result<(), DriverError>) {
        if !self.expectations.resolve(id, op, result) {
            self.bus.publish(
                Event::new(EventKind::OutcomeIgnored)
                    .with_peripheral(id)
                    .with_reason(op.to_string()),
            );
        }
    }

    fn command_failed(&self, id: Option<PeripheralId>, what: &str, err: &DriverError) {
        let mut ev = Event::new(EventKind::CommandFailed)
            .with_source(self.driver.name())
            .with_reason(format!("{what}: {err}"));
        if let Some(id) = id {
            ev = ev.with_peripheral(id);
        }
        self.bus.publish(ev);
    }
}
