//! # Radio driver contract.
//!
//! [`RadioDriver`] is the command side of the boundary, [`DriverEvent`] the callback side.
//!
//! ## Rules
//! - The runtime calls the driver from a single task only (the radio context),
//!   so implementations may assume commands never overlap except for
//!   [`RadioDriver::discover_services`], which may be in flight while other
//!   commands are issued.
//! - `connect` / `disconnect` only **issue** the request. The outcome must be
//!   delivered later as [`DriverEvent::ConnectOutcome`] / [`DriverEvent::DisconnectOutcome`].
//!   Returning `Err` from the issue call means the request was refused outright.
//! - Duplicate or late outcome events are tolerated.
//! - Events are drained by the same task that issues commands. A command must
//!   not await capacity on the event channel (use `try_send` or hand off to a task).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::driver::types::{
    ConnectionState, PeripheralId, PeripheralRef, Readiness, ServiceDescriptor,
};
use crate::error::DriverError;

/// Event delivered by the radio driver.
#[derive(Clone, Debug)]
pub enum DriverEvent {
    /// Power or permission state changed.
    ReadinessChanged(Readiness),
    /// The full set of currently discovered peripherals.
    PeripheralsDiscovered(Vec<PeripheralRef>),
    /// Outcome of a previously issued connect request.
    ConnectOutcome {
        id: PeripheralId,
        result: Result<(), DriverError>,
    },
    /// Outcome of a previously issued disconnect request.
    DisconnectOutcome {
        id: PeripheralId,
        result: Result<(), DriverError>,
    },
}

/// Creates the channel a driver uses to deliver [`DriverEvent`]s to the runtime.
///
/// The minimum capacity is 1 (clamped).
pub fn channel(capacity: usize) -> (mpsc::Sender<DriverEvent>, mpsc::Receiver<DriverEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Platform radio stack, seen from the runtime.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use radiovisor::driver::{ConnectionState, PeripheralId, RadioDriver, ServiceDescriptor};
/// use radiovisor::DriverError;
///
/// struct NoRadio;
///
/// #[async_trait]
/// impl RadioDriver for NoRadio {
///     async fn start_scan(&self) -> Result<(), DriverError> { Err(DriverError::new("no radio")) }
///     async fn stop_scan(&self) -> Result<(), DriverError> { Ok(()) }
///     async fn connect(&self, _id: PeripheralId) -> Result<(), DriverError> {
///         Err(DriverError::new("no radio"))
///     }
///     async fn disconnect(&self, _id: PeripheralId) -> Result<(), DriverError> { Ok(()) }
///     async fn connection_state(&self, _id: PeripheralId) -> ConnectionState {
///         ConnectionState::Disconnected
///     }
///     async fn discover_services(
///         &self,
///         _id: PeripheralId,
///     ) -> Result<Vec<ServiceDescriptor>, DriverError> {
///         Err(DriverError::new("no radio"))
///     }
/// }
/// ```
#[async_trait]
pub trait RadioDriver: Send + Sync + 'static {
    /// Starts scanning for peripherals. Must be idempotent.
    async fn start_scan(&self) -> Result<(), DriverError>;

    /// Stops scanning. Must be idempotent.
    async fn stop_scan(&self) -> Result<(), DriverError>;

    /// Issues a connect request; the outcome arrives as [`DriverEvent::ConnectOutcome`].
    async fn connect(&self, id: PeripheralId) -> Result<(), DriverError>;

    /// Issues a disconnect request; the outcome arrives as [`DriverEvent::DisconnectOutcome`].
    async fn disconnect(&self, id: PeripheralId) -> Result<(), DriverError>;

    /// Returns the live link state of a peripheral.
    async fn connection_state(&self, id: PeripheralId) -> ConnectionState;

    /// Enumerates the services of a connected peripheral.
    async fn discover_services(&self, id: PeripheralId)
        -> Result<Vec<ServiceDescriptor>, DriverError>;

    /// Returns the driver name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
