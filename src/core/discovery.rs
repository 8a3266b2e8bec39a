//! # Retrying service discovery.
//!
//! [`DiscoveryOrchestrator`] composes the cache, the connection coordinator and
//! the retry policy into one operation:
//!
//! ```text
//! discover_services(p, options, ctx)
//!   ├─ ctx cancelled ───────────────────────────────► Err(Canceled)
//!   ├─ arm disconnect guard (if disconnect_after)
//!   ├─ cache hit (if use_cache) ────────────────────► Ok(catalog)
//!   ├─ for delay in policy.delays():
//!   │     attempt ─ ok ─────────────────────────────► Ok(catalog)
//!   │             ─ Canceled ───────────────────────► Err(Canceled)
//!   │             ─ other error → sleep(delay) → cache hit? ► Ok(catalog)
//!   └─ final attempt ───────────────────────────────► its own result
//!   (guard: disconnect p, bounded by disconnect_grace, on every path)
//! ```
//!
//! An attempt is: connect (already connected counts as success) → enumerate → store.
//!
//! ## Rules
//! - Errors of non-final attempts are swallowed; only the final attempt's error is returned.
//! - `policy.timeout` is measured from the first attempt: a pause that would end past
//!   it is skipped and the final attempt runs at once. The whole call therefore ends
//!   within `timeout + attempt_timeout` (plus the bounded disconnect).
//! - After each pause the cache is consulted again, even when `use_cache` is false:
//!   a concurrent discovery of the same peripheral may have finished meanwhile.
//! - Cancellation is checked at every suspension point (connect wait, enumeration, pause).
//! - If the caller drops the future, the disconnect still runs on a detached task.
//! - The final disconnect also covers a link that is still `Connecting`: a connect
//!   abandoned by cancellation or an attempt timeout is torn down, not left to complete.
//! - Guards are per call, not per peripheral. When two calls discover the same
//!   peripheral concurrently, the first to finish disconnects it under the other;
//!   the other call sees a failed attempt and recovers through the cache re-check
//!   or a retry. Callers sharing a peripheral should pass `disconnect_after = false`
//!   to all but one of them.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::attempt::run_once;
use crate::core::cache::DiscoveryCache;
use crate::core::connection::ConnectionCoordinator;
use crate::core::radio::RadioHandle;
use crate::driver::{PeripheralId, PeripheralRef, ServiceCatalog};
use crate::error::CentralError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;

/// Per-call discovery options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Serve from the cache when an entry exists.
    pub use_cache: bool,
    /// Disconnect the peripheral when the operation ends, whatever the outcome.
    pub disconnect_after: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            disconnect_after: true,
        }
    }
}

/// Cache-first, retrying service discovery.
#[derive(Clone)]
pub struct DiscoveryOrchestrator {
    connections: ConnectionCoordinator,
    radio: RadioHandle,
    cache: DiscoveryCache,
    policy: RetryPolicy,
    disconnect_grace: Duration,
    bus: Bus,
}

impl DiscoveryOrchestrator {
    pub(crate) fn new(
        connections: ConnectionCoordinator,
        radio: RadioHandle,
        cache: DiscoveryCache,
        policy: RetryPolicy,
        disconnect_grace: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            connections,
            radio,
            cache,
            policy,
            disconnect_grace,
            bus,
        }
    }

    /// Returns the service catalog of `peripheral`.
    pub async fn discover_services(
        &self,
        peripheral: &PeripheralRef,
        options: DiscoveryOptions,
        ctx: &CancellationToken,
    ) -> Result<ServiceCatalog, CentralError> {
        if ctx.is_cancelled() {
            return Err(CentralError::Canceled);
        }

        let guard = options.disconnect_after.then(|| DisconnectGuard {
            connections: self.connections.clone(),
            peripheral: peripheral.clone(),
            grace: self.disconnect_grace,
            armed: true,
        });

        let res = self.discover(peripheral, options.use_cache, ctx).await;

        if let Some(guard) = guard {
            guard.release().await;
        }
        res
    }

    async fn discover(
        &self,
        peripheral: &PeripheralRef,
        use_cache: bool,
        ctx: &CancellationToken,
    ) -> Result<ServiceCatalog, CentralError> {
        let id = peripheral.id();
        if use_cache {
            if let Some(catalog) = self.cached(id) {
                return Ok(catalog);
            }
        }

        let deadline = time::Instant::now().checked_add(self.policy.timeout);
        let mut attempt = 0u32;
        for delay in self.policy.delays() {
            attempt += 1;
            match self.attempt(peripheral, attempt, ctx).await {
                Ok(catalog) => return Ok(catalog),
                Err(CentralError::Canceled) => return Err(CentralError::Canceled),
                Err(_) if overruns(deadline, delay) => break,
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::BackoffScheduled)
                            .with_peripheral(id)
                            .with_attempt(attempt)
                            .with_delay(delay)
                            .with_reason(e.to_string()),
                    );
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = ctx.cancelled() => return Err(CentralError::Canceled),
                    }
                    if let Some(catalog) = self.cached(id) {
                        return Ok(catalog);
                    }
                }
            }
        }

        self.attempt(peripheral, attempt + 1, ctx).await
    }

    fn cached(&self, id: PeripheralId) -> Option<ServiceCatalog> {
        let catalog = self.cache.fetch(id)?;
        self.bus.publish(
            Event::new(EventKind::CacheHit)
                .with_peripheral(id)
                .with_count(catalog.len()),
        );
        Some(catalog)
    }

    async fn attempt(
        &self,
        peripheral: &PeripheralRef,
        attempt: u32,
        ctx: &CancellationToken,
    ) -> Result<ServiceCatalog, CentralError> {
        let limit = self.policy.attempt_limit();
        run_once(peripheral.id(), attempt, ctx, limit, &self.bus, |child| async move {
            self.connect_and_enumerate(peripheral, &child).await
        })
        .await
    }

    async fn connect_and_enumerate(
        &self,
        peripheral: &PeripheralRef,
        ctx: &CancellationToken,
    ) -> Result<ServiceCatalog, CentralError> {
        match self.connections.connect(peripheral, ctx).await {
            Ok(()) | Err(CentralError::AlreadyConnected { .. }) => {}
            Err(e) => return Err(e),
        }

        let services = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(CentralError::Canceled),
            res = self.radio.discover_services(peripheral.id()) => res?,
        };

        let catalog = ServiceCatalog::from(services);
        self.cache.store(peripheral.id(), catalog.clone());
        Ok(catalog)
    }
}

/// Returns `true` if a pause of `delay` starting now would end past `deadline`.
fn overruns(deadline: Option<time::Instant>, delay: Duration) -> bool {
    let Some(deadline) = deadline else {
        return false;
    };
    time::Instant::now()
        .checked_add(delay)
        .map_or(true, |end| end > deadline)
}

/// Disconnects the peripheral when the discovery ends.
///
/// [`release`](Self::release) disconnects inline; dropping an armed guard
/// (caller dropped the future) disconnects on a detached task.
struct DisconnectGuard {
    connections: ConnectionCoordinator,
    peripheral: PeripheralRef,
    grace: Duration,
    armed: bool,
}

impl DisconnectGuard {
    async fn release(mut self) {
        self.armed = false;
        disconnect_within(&self.connections, &self.peripheral, self.grace).await;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(handle) = Handle::try_current() {
            let connections = self.connections.clone();
            let peripheral = self.peripheral.clone();
            let grace = self.grace;
            handle.spawn(async move {
                disconnect_within(&connections, &peripheral, grace).await;
            });
        }
    }
}

/// Best-effort teardown; failures are already on the bus, `NotConnected` is expected.
async fn disconnect_within(
    connections: &ConnectionCoordinator,
    peripheral: &PeripheralRef,
    grace: Duration,
) {
    let ctx = CancellationToken::new();
    let _ = time::timeout(grace, connections.teardown(peripheral.id(), &ctx)).await;
}
