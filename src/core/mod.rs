//! Runtime core: radio ownership, discovery feed, connections and service discovery.
//!
//! The public entry point is [`Central`], built with [`CentralBuilder`].
//! Components are also exported for callers that hold them directly
//! (through [`Central::connections`] or [`Central::cache`]).
//!
//! Internal modules:
//! - [`radio`]: the task that owns the driver and serializes commands and callbacks;
//! - [`broadcaster`]: discovery snapshot fan-out and consumer registry;
//! - [`scan`]: keeps the physical scan in step with readiness and demand;
//! - [`expectation`]: pending connect/disconnect outcomes;
//! - [`connection`]: awaitable connect/disconnect;
//! - [`cache`]: service catalog cache;
//! - [`attempt`]: one time-limited discovery attempt with event publishing;
//! - [`discovery`]: cache-first retrying service discovery;
//! - [`central`] / [`builder`]: wiring, facade and shutdown.

mod attempt;
mod broadcaster;
mod builder;
mod cache;
mod central;
mod connection;
mod discovery;
mod expectation;
mod radio;
mod scan;

pub use broadcaster::{DiscoveryBroadcaster, DiscoveryStream, SubscriberId};
pub use builder::CentralBuilder;
pub use cache::DiscoveryCache;
pub use central::Central;
pub use connection::ConnectionCoordinator;
pub use discovery::{DiscoveryOptions, DiscoveryOrchestrator};
pub use expectation::Operation;
pub use scan::{evaluate, RadioState, RadioStatus};
