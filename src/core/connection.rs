//! # Connection lifecycle coordinator.
//!
//! Turns the driver's callback-style connect/disconnect into awaitable operations.
//!
//! ```text
//! connect(p, ctx)
//!   ├─ live state == Connected ──────────────► Err(AlreadyConnected), no command
//!   ├─ ctx cancelled ───────────────────────► Err(Canceled)
//!   ├─ expectation already pending ─────────► Err(AlreadyInFlight)
//!   ├─ issue connect (refused) ─────────────► Err(Driver)
//!   └─ await outcome | ctx cancelled ───────► Ok / Err(Driver) / Err(Canceled)
//! ```
//!
//! `disconnect` is symmetric, refusing with `NotConnected` when the live state
//! is anything but `Connected`.
//!
//! Cancellation abandons the wait only; a command that was already issued is
//! not rolled back and its late outcome is ignored.
//!
//! [`teardown`](ConnectionCoordinator::teardown) is the internal counterpart of
//! `disconnect` used by service discovery: it also disconnects a link that is
//! still `Connecting`, so an abandoned connect cannot complete into an open link.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::expectation::{ExpectationTable, Operation};
use crate::core::radio::RadioHandle;
use crate::driver::{ConnectionState, PeripheralId, PeripheralRef};
use crate::error::CentralError;
use crate::events::{Bus, Event, EventKind};

/// Awaitable connect/disconnect over the radio context.
#[derive(Clone)]
pub struct ConnectionCoordinator {
    radio: RadioHandle,
    expectations: Arc<ExpectationTable>,
    bus: Bus,
}

impl ConnectionCoordinator {
    pub(crate) fn new(radio: RadioHandle, expectations: Arc<ExpectationTable>, bus: Bus) -> Self {
        Self {
            radio,
            expectations,
            bus,
        }
    }

    /// Connects to `peripheral` and waits for the driver to confirm.
    pub async fn connect(
        &self,
        peripheral: &PeripheralRef,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        self.transition(peripheral.id(), Operation::Connect, ctx).await
    }

    /// Disconnects `peripheral` and waits for the driver to confirm.
    pub async fn disconnect(
        &self,
        peripheral: &PeripheralRef,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        self.transition(peripheral.id(), Operation::Disconnect, ctx).await
    }

    /// Returns `true` if a `op` for `id` is waiting for its driver outcome.
    pub fn is_pending(&self, id: PeripheralId, op: Operation) -> bool {
        self.expectations.is_pending(id, op)
    }

    async fn transition(
        &self,
        id: PeripheralId,
        op: Operation,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        let state = self.radio.connection_state(id).await?;
        match (op, state) {
            (Operation::Connect, ConnectionState::Connected) => {
                return Err(CentralError::AlreadyConnected { id })
            }
            (Operation::Disconnect, s) if s != ConnectionState::Connected => {
                return Err(CentralError::NotConnected { id })
            }
            _ => {}
        }
        self.issue(id, op, ctx).await
    }

    /// Disconnects `id` if its link is `Connecting` or `Connected`.
    ///
    /// Refuses with `NotConnected` for any other state.
    pub(crate) async fn teardown(
        &self,
        id: PeripheralId,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        match self.radio.connection_state(id).await? {
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.issue(id, Operation::Disconnect, ctx).await
            }
            _ => Err(CentralError::NotConnected { id }),
        }
    }

    async fn issue(
        &self,
        id: PeripheralId,
        op: Operation,
        ctx: &CancellationToken,
    ) -> Result<(), CentralError> {
        if ctx.is_cancelled() {
            return Err(CentralError::Canceled);
        }
        let expectation = self.expectations.begin(id, op)?;
        if ctx.is_cancelled() {
            return Err(CentralError::Canceled);
        }

        let (requested, done, failed) = match op {
            Operation::Connect => (
                EventKind::ConnectRequested,
                EventKind::Connected,
                EventKind::ConnectFailed,
            ),
            Operation::Disconnect => (
                EventKind::DisconnectRequested,
                EventKind::Disconnected,
                EventKind::DisconnectFailed,
            ),
        };
        self.bus.publish(Event::new(requested).with_peripheral(id));

        let issued = match op {
            Operation::Connect => self.radio.connect(id).await,
            Operation::Disconnect => self.radio.disconnect(id).await,
        };
        let res = match issued {
            Ok(()) => expectation.wait(ctx).await,
            Err(e) => Err(e.into()),
        };

        match &res {
            Ok(()) => self.bus.publish(Event::new(done).with_peripheral(id)),
            Err(CentralError::Canceled) => {}
            Err(e) => self.bus.publish(
                Event::new(failed)
                    .with_peripheral(id)
                    .with_reason(e.to_string()),
            ),
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::Central;
    use crate::driver::mock::{Command, MockRadio};
    use crate::driver::{channel, DriverEvent};
    use crate::error::DriverError;
    use crate::CentralConfig;

    fn setup() -> (Arc<Central>, Arc<MockRadio>) {
        let (tx, rx) = channel(64);
        let mock = MockRadio::new(tx);
        let central = Central::builder(CentralConfig::default()).build(mock.clone(), rx);
        (central, mock)
    }

    #[tokio::test]
    async fn connect_waits_for_outcome() {
        let (central, mock) = setup();
        let p = PeripheralRef::new(PeripheralId::new_v4());

        central.connect(&p, &CancellationToken::new()).await.unwrap();
        assert_eq!(mock.state(p.id()), ConnectionState::Connected);
        assert_eq!(mock.count(&Command::Connect(p.id())), 1);

        central.disconnect(&p, &CancellationToken::new()).await.unwrap();
        assert_eq!(mock.state(p.id()), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn already_connected_issues_no_command() {
        let (central, mock) = setup();
        let p = PeripheralRef::new(PeripheralId::new_v4());
        mock.set_state(p.id(), ConnectionState::Connected);

        let err = central.connect(&p, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, CentralError::AlreadyConnected { id: p.id() });
        assert_eq!(mock.count(&Command::Connect(p.id())), 0);
    }

    #[tokio::test]
    async fn disconnect_requires_connected() {
        let (central, mock) = setup();
        let p = PeripheralRef::new(PeripheralId::new_v4());
        mock.set_state(p.id(), ConnectionState::Connecting);

        let err = central.disconnect(&p, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, CentralError::NotConnected { id: p.id() });
        assert_eq!(mock.count(&Command::Disconnect(p.id())), 0);
    }

    #[tokio::test]
    async fn teardown_covers_pending_link_only() {
        let (central, mock) = setup();
        let ctx = CancellationToken::new();
        let idle = PeripheralId::new_v4();
        let pending = PeripheralId::new_v4();
        mock.set_state(pending, ConnectionState::Connecting);

        let err = central.connections().teardown(idle, &ctx).await.unwrap_err();
        assert_eq!(err, CentralError::NotConnected { id: idle });
        assert_eq!(mock.count(&Command::Disconnect(idle)), 0);

        central.connections().teardown(pending, &ctx).await.unwrap();
        assert_eq!(mock.count(&Command::Disconnect(pending)), 1);
        assert_eq!(mock.state(pending), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn concurrent_connect_is_rejected() {
        let (central, mock) = setup();
        mock.manual_outcomes();
        let p = PeripheralRef::new(PeripheralId::new_v4());
        let id = p.id();

        let first = {
            let central = Arc::clone(&central);
            let p = p.clone();
            tokio::spawn(async move { central.connect(&p, &CancellationToken::new()).await })
        };
        mock.wait_for(|c| c.contains(&Command::Connect(id))).await;

        let err = central.connect(&p, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(
            err,
            CentralError::AlreadyInFlight {
                id,
                op: Operation::Connect
            }
        );

        mock.set_state(id, ConnectionState::Connected);
        mock.emit(DriverEvent::ConnectOutcome { id, result: Ok(()) }).await;
        assert_eq!(first.await.unwrap(), Ok(()));
        assert_eq!(mock.count(&Command::Connect(id)), 1);
    }

    #[tokio::test]
    async fn failed_outcome_is_reported() {
        let (central, mock) = setup();
        mock.fail_connects(1);
        let p = PeripheralRef::new(PeripheralId::new_v4());

        let err = central.connect(&p, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, CentralError::Driver(DriverError::new("connect failed")));
        assert!(!central.connections().is_pending(p.id(), Operation::Connect));
    }

    #[tokio::test]
    async fn cancelled_wait_ignores_late_outcome() {
        let (central, mock) = setup();
        mock.manual_outcomes();
        let mut events = central.bus().subscribe();
        let p = PeripheralRef::new(PeripheralId::new_v4());
        let id = p.id();
        let ctx = CancellationToken::new();

        let waiter = {
            let central = Arc::clone(&central);
            let p = p.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { central.connect(&p, &ctx).await })
        };
        mock.wait_for(|c| c.contains(&Command::Connect(id))).await;
        ctx.cancel();
        assert_eq!(waiter.await.unwrap(), Err(CentralError::Canceled));
        assert!(!central.connections().is_pending(id, Operation::Connect));

        mock.emit(DriverEvent::ConnectOutcome { id, result: Ok(()) }).await;
        loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::OutcomeIgnored {
                assert_eq!(ev.peripheral, Some(id));
                break;
            }
        }
    }

    #[tokio::test]
    async fn pre_cancelled_context_issues_nothing() {
        let (central, mock) = setup();
        let p = PeripheralRef::new(PeripheralId::new_v4());
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert_eq!(central.connect(&p, &ctx).await, Err(CentralError::Canceled));
        assert_eq!(mock.count(&Command::Connect(p.id())), 0);
    }
}
