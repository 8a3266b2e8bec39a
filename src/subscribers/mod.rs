//! # Event observers for the radiovisor runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   component ── publish(Event) ──► Bus ──► observer_listener ──► SubscriberSet
//!                                                                     │
//!                                                           ┌─────────┼─────────┐
//!                                                           ▼         ▼         ▼
//!                                                       LogWriter  Metrics   Custom
//! ```
//!
//! Observers are passive: they react to events (logging, metrics, alerts) and
//! never influence radio behaviour.

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
