//! # Run a single service discovery attempt.
//!
//! Executes one attempt with an optional time limit and publishes its lifecycle to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! DiscoveryStarting ─► attempt(child) ─┬─ Ok(catalog)   → ServicesDiscovered
//!                                      ├─ Err(Canceled) → (nothing, caller gave up)
//!                                      ├─ Err(e)        → DiscoveryFailed
//!                                      └─ time limit    → cancel child → TimeoutHit
//!                                                       → Err(Timeout) → DiscoveryFailed
//! ```
//!
//! ## Rules
//! - Each attempt runs under a **child token**; expiry cancels the child only.
//! - `TimeoutHit` is published **in addition to** `DiscoveryFailed`.
//! - A time limit of zero is treated as unbounded.

use std::future::Future;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::driver::{PeripheralId, ServiceCatalog};
use crate::error::CentralError;
use crate::events::{Bus, Event, EventKind};

/// Executes attempt number `attempt` for `peripheral`.
pub(crate) async fn run_once<F, Fut>(
    peripheral: PeripheralId,
    attempt: u32,
    parent: &CancellationToken,
    limit: Option<Duration>,
    bus: &Bus,
    run: F,
) -> Result<ServiceCatalog, CentralError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<ServiceCatalog, CentralError>>,
{
    let child = parent.child_token();
    bus.publish(
        Event::new(EventKind::DiscoveryStarting)
            .with_peripheral(peripheral)
            .with_attempt(attempt),
    );

    let res = match limit.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, run(child.clone())).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_peripheral(peripheral)
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                Err(CentralError::Timeout { timeout: dur })
            }
        },
        None => run(child.clone()).await,
    };

    match &res {
        Ok(catalog) => bus.publish(
            Event::new(EventKind::ServicesDiscovered)
                .with_peripheral(peripheral)
                .with_attempt(attempt)
                .with_count(catalog.len()),
        ),
        Err(CentralError::Canceled) => {}
        Err(e) => bus.publish(
            Event::new(EventKind::DiscoveryFailed)
                .with_peripheral(peripheral)
                .with_attempt(attempt)
                .with_reason(e.to_string()),
        ),
    }
    res
}
