//! Scripted in-memory radio used by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use super::{ConnectionState, DriverEvent, PeripheralId, RadioDriver, Readiness, ServiceDescriptor};
use crate::error::DriverError;

/// Command observed by the mock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    StartScan,
    StopScan,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    DiscoverServices(PeripheralId),
}

#[derive(Default)]
struct Script {
    commands: Vec<Command>,
    states: HashMap<PeripheralId, ConnectionState>,
    services: Vec<ServiceDescriptor>,
    /// Number of upcoming enumerations that fail.
    discover_failures: u32,
    /// Number of upcoming connect outcomes that fail.
    connect_failures: u32,
    /// When false, connect/disconnect outcomes are left to the test.
    manual_outcomes: bool,
    /// Enumeration never completes.
    hang_discovery: bool,
}

pub(crate) struct MockRadio {
    events: mpsc::Sender<DriverEvent>,
    script: Mutex<Script>,
    /// Notified on every recorded command.
    pub changed: Notify,
}

impl MockRadio {
    pub fn new(events: mpsc::Sender<DriverEvent>) -> Arc<Self> {
        Arc::new(Self {
            events,
            script: Mutex::new(Script::default()),
            changed: Notify::new(),
        })
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn set_services(&self, services: Vec<ServiceDescriptor>) {
        self.script().services = services;
    }

    pub fn fail_discoveries(&self, n: u32) {
        self.script().discover_failures = n;
    }

    pub fn fail_connects(&self, n: u32) {
        self.script().connect_failures = n;
    }

    pub fn manual_outcomes(&self) {
        self.script().manual_outcomes = true;
    }

    pub fn hang_discovery(&self) {
        self.script().hang_discovery = true;
    }

    pub fn set_state(&self, id: PeripheralId, state: ConnectionState) {
        self.script().states.insert(id, state);
    }

    pub fn state(&self, id: PeripheralId) -> ConnectionState {
        self.script().states.get(&id).copied().unwrap_or_default()
    }

    /// Recorded commands without scan start/stop.
    pub fn link_commands(&self) -> Vec<Command> {
        self.script()
            .commands
            .iter()
            .filter(|c| !matches!(c, Command::StartScan | Command::StopScan))
            .cloned()
            .collect()
    }

    pub fn count(&self, cmd: &Command) -> usize {
        self.script().commands.iter().filter(|c| *c == cmd).count()
    }

    /// Waits until `pred` holds for the recorded commands.
    pub async fn wait_for(&self, pred: impl Fn(&[Command]) -> bool) {
        loop {
            let notified = self.changed.notified();
            if pred(&self.script().commands) {
                return;
            }
            notified.await;
        }
    }

    pub async fn emit(&self, event: DriverEvent) {
        self.events.send(event).await.unwrap();
    }

    pub async fn set_readiness(&self, powered: bool, authorized: bool) {
        self.emit(DriverEvent::ReadinessChanged(Readiness {
            powered,
            authorized,
        }))
        .await;
    }

    fn record(&self, cmd: Command) {
        self.script().commands.push(cmd);
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl RadioDriver for MockRadio {
    async fn start_scan(&self) -> Result<(), DriverError> {
        self.record(Command::StartScan);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), DriverError> {
        self.record(Command::StopScan);
        Ok(())
    }

    async fn connect(&self, id: PeripheralId) -> Result<(), DriverError> {
        let outcome = {
            let mut s = self.script();
            if s.manual_outcomes {
                None
            } else if s.connect_failures > 0 {
                s.connect_failures -= 1;
                Some(Err(DriverError::new("connect failed")))
            } else {
                s.states.insert(id, ConnectionState::Connected);
                Some(Ok(()))
            }
        };
        self.record(Command::Connect(id));
        if let Some(result) = outcome {
            self.events
                .try_send(DriverEvent::ConnectOutcome { id, result })
                .unwrap();
        }
        Ok(())
    }

    async fn disconnect(&self, id: PeripheralId) -> Result<(), DriverError> {
        let manual = {
            let mut s = self.script();
            if !s.manual_outcomes {
                s.states.insert(id, ConnectionState::Disconnected);
            }
            s.manual_outcomes
        };
        self.record(Command::Disconnect(id));
        if !manual {
            self.events
                .try_send(DriverEvent::DisconnectOutcome { id, result: Ok(()) })
                .unwrap();
        }
        Ok(())
    }

    async fn connection_state(&self, id: PeripheralId) -> ConnectionState {
        self.state(id)
    }

    async fn discover_services(
        &self,
        id: PeripheralId,
    ) -> Result<Vec<ServiceDescriptor>, DriverError> {
        let (hang, result) = {
            let mut s = self.script();
            let result = if s.discover_failures > 0 {
                s.discover_failures -= 1;
                Err(DriverError::new("enumeration failed"))
            } else {
                Ok(s.services.clone())
            };
            (s.hang_discovery, result)
        };
        self.record(Command::DiscoverServices(id));
        if hang {
            std::future::pending::<()>().await;
        }
        result
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
