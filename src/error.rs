//! Error types used by the radiovisor runtime and its operations.
//!
//! This module defines three error types:
//!
//! - [`CentralError`]: errors returned by `connect`, `disconnect` and `discover_services`.
//! - [`RuntimeError`]: errors raised by the runtime itself (shutdown).
//! - [`DriverError`]: failures reported by the radio driver.
//!
//! Both enums provide helper methods (`as_label`, `as_message`) for logging/metrics
//! and [`CentralError::is_retryable`] tells transient failures from precondition violations.

use std::time::Duration;
use thiserror::Error;

use crate::core::Operation;
use crate::driver::PeripheralId;

/// # Failure reported by the radio driver.
///
/// The driver is an external collaborator, so its errors are carried as an
/// opaque message. The runtime also uses this type when the radio context has
/// already shut down and a command can no longer be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("radio driver error: {message}")]
pub struct DriverError {
    /// Human-readable description from the driver.
    pub message: String,
}

impl DriverError {
    /// Creates a driver error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error used when the radio context is gone (runtime shut down).
    pub(crate) fn context_closed() -> Self {
        Self::new("radio context closed")
    }
}

/// # Errors produced by the radiovisor runtime.
///
/// These represent failures in the orchestration system itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some background tasks had to be aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; aborting")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the background tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use radiovisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
        }
    }
}

/// # Errors produced by peripheral operations.
///
/// Precondition violations (`AlreadyConnected`, `NotConnected`, `AlreadyInFlight`)
/// fail fast. `Driver` and `Timeout` are transient and retried by service discovery.
/// `Canceled` always propagates immediately.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CentralError {
    /// `connect` was called for a peripheral the driver reports as connected.
    #[error("peripheral {id} is already connected")]
    AlreadyConnected {
        /// Target peripheral.
        id: PeripheralId,
    },

    /// `disconnect` was called for a peripheral that is not connected.
    #[error("peripheral {id} is not connected")]
    NotConnected {
        /// Target peripheral.
        id: PeripheralId,
    },

    /// Another request of the same kind is already waiting on this peripheral.
    #[error("{op} already in flight for peripheral {id}")]
    AlreadyInFlight {
        /// Target peripheral.
        id: PeripheralId,
        /// Operation that is pending.
        op: Operation,
    },

    /// The radio driver reported a failure.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The caller's context was cancelled.
    #[error("context cancelled")]
    Canceled,

    /// An attempt did not complete within its time budget.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The budget that was exceeded.
        timeout: Duration,
    },
}

impl CentralError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use radiovisor::CentralError;
    ///
    /// assert_eq!(CentralError::Canceled.as_label(), "canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CentralError::AlreadyConnected { .. } => "already_connected",
            CentralError::NotConnected { .. } => "not_connected",
            CentralError::AlreadyInFlight { .. } => "already_in_flight",
            CentralError::Driver(_) => "driver_failure",
            CentralError::Canceled => "canceled",
            CentralError::Timeout { .. } => "timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            CentralError::AlreadyConnected { id } => format!("already connected: {id}"),
            CentralError::NotConnected { id } => format!("not connected: {id}"),
            CentralError::AlreadyInFlight { id, op } => format!("{op} in flight: {id}"),
            CentralError::Driver(e) => format!("driver: {}", e.message),
            CentralError::Canceled => "context cancelled".to_string(),
            CentralError::Timeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// Indicates whether the error is transient.
    ///
    /// Returns `true` for [`CentralError::Driver`] and [`CentralError::Timeout`].
    ///
    /// # Example
    /// ```
    /// use radiovisor::{CentralError, DriverError};
    ///
    /// assert!(CentralError::from(DriverError::new("gatt 133")).is_retryable());
    /// assert!(!CentralError::Canceled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, CentralError::Driver(_) | CentralError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let id = PeripheralId::new_v4();
        assert_eq!(CentralError::AlreadyConnected { id }.as_label(), "already_connected");
        assert_eq!(CentralError::NotConnected { id }.as_label(), "not_connected");
        assert_eq!(
            CentralError::AlreadyInFlight {
                id,
                op: Operation::Connect
            }
            .as_label(),
            "already_in_flight"
        );
    }

    #[test]
    fn preconditions_are_not_retryable() {
        let id = PeripheralId::new_v4();
        assert!(!CentralError::AlreadyConnected { id }.is_retryable());
        assert!(!CentralError::NotConnected { id }.is_retryable());
        assert!(
            CentralError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
    }

    #[test]
    fn driver_error_displays_message() {
        let err = CentralError::from(DriverError::new("link lost"));
        assert_eq!(err.to_string(), "radio driver error: link lost");
        assert_eq!(err.as_message(), "driver: link lost");
    }
}
