//! Radio driver boundary.
//!
//! The radio driver (power state, physical scan, physical connect/disconnect,
//! service enumeration) is an external collaborator. This module defines the
//! contract the runtime consumes:
//!
//! - [`RadioDriver`] commands issued by the runtime
//! - [`DriverEvent`] events the driver delivers through [`channel`]
//! - the data model shared by both sides ([`PeripheralRef`], [`ServiceDescriptor`], ...)
//!
//! ## Wiring
//! ```text
//! let (events_tx, events_rx) = radiovisor::driver::channel(256);
//! let driver = MyDriver::new(events_tx);     // driver keeps the sender
//! Central::builder(cfg).build(driver, events_rx);
//! ```

mod radio;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use radio::{channel, DriverEvent, RadioDriver};
pub use types::{
    ConnectionState, DiscoverySnapshot, PeripheralId, PeripheralRef, Readiness, ServiceCatalog,
    ServiceDescriptor, UNKNOWN_NAME,
};
