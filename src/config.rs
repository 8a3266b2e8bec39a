//! # Runtime configuration.
//!
//! Provides [`CentralConfig`] centralized settings for a [`Central`](crate::Central).
//!
//! Config is used in two ways:
//! 1. **Central creation**: `Central::builder(config).build(driver, events)`
//! 2. **Per-call defaults**: `Central::discover_services` uses `config.discovery`
//!
//! ## Sentinel values
//! - `retry.attempt_timeout = Some(0s)` → no per-attempt timeout
//! - capacities of `0` are clamped to `1`

use std::time::Duration;

use crate::core::DiscoveryOptions;
use crate::policies::RetryPolicy;

/// Configuration for a [`Central`](crate::Central).
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `command_capacity`: queue between callers and the radio context (min 1)
/// - `event_capacity`: suggested driver event channel size for [`driver::channel`](crate::driver::channel)
/// - `retry`: service discovery retry schedule
/// - `discovery`: default `use_cache` / `disconnect_after` options
/// - `disconnect_grace`: bound on the disconnect issued after a discovery
/// - `grace`: bound on joining background tasks during shutdown
#[derive(Clone, Debug)]
pub struct CentralConfig {
    /// Capacity of the event bus broadcast channel.
    ///
    /// Observers lagging behind more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,

    /// Capacity of the command queue feeding the radio context.
    ///
    /// When full, callers wait for room (commands are never dropped).
    pub command_capacity: usize,

    /// Suggested capacity for the driver event channel.
    pub event_capacity: usize,

    /// Retry schedule for service discovery.
    pub retry: RetryPolicy,

    /// Default options for service discovery.
    pub discovery: DiscoveryOptions,

    /// Maximum wait for the disconnect that follows a discovery.
    ///
    /// If the driver does not confirm within this window, the discovery result
    /// is returned anyway and the disconnect outcome is ignored when it arrives.
    pub disconnect_grace: Duration,

    /// Maximum wait for background tasks during [`Central::shutdown`](crate::Central::shutdown).
    pub grace: Duration,
}

impl CentralConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }
}

impl Default for CentralConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `command_capacity = 64`
    /// - `event_capacity = 256`
    /// - `retry = RetryPolicy::default()` (3s doubling, 5 attempts, 15s budget)
    /// - `discovery = DiscoveryOptions::default()` (use cache, disconnect after)
    /// - `disconnect_grace = 5s`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            command_capacity: 64,
            event_capacity: 256,
            retry: RetryPolicy::default(),
            discovery: DiscoveryOptions::default(),
            disconnect_grace: Duration::from_secs(5),
            grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacities_are_clamped() {
        let cfg = CentralConfig {
            bus_capacity: 0,
            command_capacity: 0,
            ..CentralConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.command_capacity_clamped(), 1);
    }

    #[test]
    fn defaults_match_discovery_contract() {
        let cfg = CentralConfig::default();
        assert!(cfg.discovery.use_cache);
        assert!(cfg.discovery.disconnect_after);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.timeout, Duration::from_secs(15));
    }
}
