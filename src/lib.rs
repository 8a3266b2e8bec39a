//! # radiovisor
//!
//! **Radiovisor** is an orchestration layer over a short-range radio (BLE central)
//! driver. It turns the driver's imperative, callback-based interface into
//! multi-consumer, cancellable async operations:
//!
//! - a **discovery feed** any number of consumers can join and leave;
//! - a **scan controller** that scans only while the radio is usable and someone listens;
//! - awaitable **connect / disconnect** with fail-fast duplicate detection;
//! - **service discovery** with a cache, bounded exponential retry and guaranteed cleanup.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   consumers / callers
//!     │ subscribe_discovery   │ connect / disconnect     │ discover_services
//!     ▼                       ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Central                                                              │
//! │  - DiscoveryBroadcaster (snapshot + consumer registry)                │
//! │  - ConnectionCoordinator (pending expectations)                       │
//! │  - DiscoveryOrchestrator (cache + RetryPolicy + disconnect guard)     │
//! │  - ScanController task (readiness × consumer count → scan on/off)     │
//! └──────┬───────────────────────────────────────────────────────┬────────┘
//!        │ RadioCommand (mpsc)                                   │ Event
//!        ▼                                                       ▼
//! ┌───────────────────────────────┐                 ┌──────────────────────────┐
//! │  RadioContext task            │                 │ Bus (broadcast channel)  │
//! │  owns Arc<dyn RadioDriver>    │ ◄── DriverEvent │  └► observer listener    │
//! │  commands, callbacks,         │     (mpsc)      │      └► SubscriberSet    │
//! │  concurrent enumerations      │                 │          └► LogWriter... │
//! └───────────────────────────────┘                 └──────────────────────────┘
//! ```
//!
//! ### Service discovery
//! ```text
//! discover_services(p, ctx)
//!   ├─► cache hit? ──────────────────────────────► catalog
//!   ├─► for delay in retry.delays():
//!   │     ├─ publish DiscoveryStarting{ attempt }
//!   │     ├─ connect → enumerate → store (under attempt timeout)
//!   │     ├─ Ok ─────────────────────────────────► catalog
//!   │     └─ Err ─► BackoffScheduled{ delay } ─► sleep (cancellable) ─► cache hit?
//!   ├─► final attempt ───────────────────────────► catalog or its error
//!   └─► disconnect p (bounded), whatever happened
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                           |
//! |-------------------|---------------------------------------------------------------|----------------------------------------------|
//! | **Driver**        | Contract implemented by the platform radio stack.             | [`driver::RadioDriver`], [`driver::DriverEvent`] |
//! | **Orchestration** | Facade over all components, background tasks and shutdown.    | [`Central`], [`CentralBuilder`]              |
//! | **Discovery feed**| Snapshot fan-out with per-consumer streams.                   | [`DiscoveryStream`], [`SubscriberId`]        |
//! | **Connections**   | Awaitable connect/disconnect.                                 | [`ConnectionCoordinator`]                    |
//! | **Services**      | Cache-first retrying service discovery.                       | [`DiscoveryCache`], [`DiscoveryOptions`]     |
//! | **Policies**      | Retry schedule and backoff/jitter.                            | [`RetryPolicy`], [`BackoffPolicy`]           |
//! | **Observer API**  | Hook into runtime events (logging, metrics, custom observers).| [`Subscribe`], [`Event`]                     |
//! | **Errors**        | Typed errors for operations and the runtime.                  | [`CentralError`], [`RuntimeError`]           |
//! | **Configuration** | Centralize runtime settings.                                  | [`CentralConfig`]                            |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] observer, rendering events via `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use radiovisor::{Central, CentralConfig};
//! use radiovisor::driver::{self, RadioDriver};
//!
//! fn platform_driver(events: tokio::sync::mpsc::Sender<driver::DriverEvent>) -> Arc<dyn RadioDriver> {
//!     unimplemented!("platform radio stack")
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = CentralConfig::default();
//!     let (events_tx, events_rx) = driver::channel(cfg.event_capacity);
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn radiovisor::Subscribe>> = vec![Arc::new(radiovisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn radiovisor::Subscribe>> = Vec::new();
//!
//!     let central = Central::builder(cfg)
//!         .with_subscribers(subs)
//!         .build(platform_driver(events_tx), events_rx);
//!
//!     let mut feed = central.subscribe_discovery();
//!     if let Some(snapshot) = feed.recv().await {
//!         for p in snapshot.iter() {
//!             println!("{} ({})", p.name(), p.id());
//!         }
//!     }
//!     drop(feed); // last consumer gone: scanning stops
//!
//!     central.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
pub mod driver;
mod error;
mod events;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use config::CentralConfig;
pub use core::{
    evaluate, Central, CentralBuilder, ConnectionCoordinator, DiscoveryBroadcaster, DiscoveryCache,
    DiscoveryOptions, DiscoveryOrchestrator, DiscoveryStream, Operation, RadioState, RadioStatus,
    SubscriberId,
};
pub use error::{CentralError, DriverError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RetryDelays, RetryPolicy};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the built-in tracing observer.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
