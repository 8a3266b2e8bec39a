//! Retry policies.
//!
//! This module groups the knobs that control **how often** service discovery is
//! retried and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]   attempt cap, pause budget, per-attempt timeout
//! - [`BackoffPolicy`] how pauses evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! CentralConfig { retry: RetryPolicy { backoff: BackoffPolicy, .. }, .. }
//!      └─► core::discovery::DiscoveryOrchestrator uses:
//!           - retry.delays() to pace attempts
//!           - retry.attempt_limit() to bound each attempt
//! ```

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryDelays, RetryPolicy};
