//! # Pending connect/disconnect expectations.
//!
//! Bridges one-shot driver callbacks to awaiting callers.
//!
//! ```text
//! NoExpectation ──begin(id, op)──► AwaitingOutcome ──resolve(id, op, result)──► NoExpectation
//!                     │                    │
//!                     └─ AlreadyInFlight   └─ caller cancelled / dropped → entry released
//! ```
//!
//! ## Rules
//! - At most one entry per `(peripheral, operation)`; a second `begin` fails fast.
//! - `resolve` removes the entry before waking the caller, so a caller is resumed at most once.
//! - Resolving an unknown key is a no-op (late or duplicate driver callbacks).
//! - Dropping an [`Expectation`] releases its entry, but only if the entry is still its own
//!   (tickets keep a stale guard from removing a newer expectation).

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::driver::PeripheralId;
use crate::error::{CentralError, DriverError};

/// Kind of link transition a caller is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Disconnect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
        })
    }
}

type Outcome = Result<(), DriverError>;
type Key = (PeripheralId, Operation);

struct Pending {
    ticket: u64,
    tx: oneshot::Sender<Outcome>,
}

/// Table of in-flight expectations, guarded by a single lock.
#[derive(Default)]
pub(crate) struct ExpectationTable {
    pending: Mutex<HashMap<Key, Pending>>,
    next_ticket: AtomicU64,
}

impl ExpectationTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers an expectation for `(id, op)`.
    pub fn begin(
        self: &Arc<Self>,
        id: PeripheralId,
        op: Operation,
    ) -> Result<Expectation, CentralError> {
        let mut pending = self.lock();
        match pending.entry((id, op)) {
            Entry::Occupied(_) => Err(CentralError::AlreadyInFlight { id, op }),
            Entry::Vacant(slot) => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                slot.insert(Pending { ticket, tx });
                Ok(Expectation {
                    table: Arc::clone(self),
                    key: (id, op),
                    ticket,
                    rx,
                })
            }
        }
    }

    /// Resumes the caller waiting on `(id, op)`.
    ///
    /// Returns `false` if nobody was waiting.
    pub fn resolve(&self, id: PeripheralId, op: Operation, outcome: Outcome) -> bool {
        let entry = self.lock().remove(&(id, op));
        match entry {
            Some(pending) => {
                // receiver may already be gone (caller cancelled between remove and send)
                let _ = pending.tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: PeripheralId, op: Operation) -> bool {
        self.lock().contains_key(&(id, op))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, key: Key, ticket: u64) {
        let mut pending = self.lock();
        if pending.get(&key).is_some_and(|p| p.ticket == ticket) {
            pending.remove(&key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration guard returned by [`ExpectationTable::begin`].
pub(crate) struct Expectation {
    table: Arc<ExpectationTable>,
    key: Key,
    ticket: u64,
    rx: oneshot::Receiver<Outcome>,
}

impl Expectation {
    /// Suspends until the driver outcome arrives or `ctx` is cancelled.
    pub async fn wait(mut self, ctx: &CancellationToken) -> Result<(), CentralError> {
        tokio::select! {
            biased;
            res = &mut self.rx => match res {
                Ok(outcome) => outcome.map_err(CentralError::from),
                Err(_) => Err(DriverError::context_closed().into()),
            },
            _ = ctx.cancelled() => Err(CentralError::Canceled),
        }
    }
}

impl Drop for Expectation {
    fn drop(&mut self) {
        self.table.release(self.key, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_begin_fails_fast() {
        let table = ExpectationTable::new();
        let id = PeripheralId::new_v4();

        let _first = table.begin(id, Operation::Connect).unwrap();
        let second = table.begin(id, Operation::Connect);
        assert!(matches!(
            second,
            Err(CentralError::AlreadyInFlight { op: Operation::Connect, .. })
        ));

        // a different operation on the same peripheral is independent
        assert!(table.begin(id, Operation::Disconnect).is_ok());
    }

    #[tokio::test]
    async fn resolve_wakes_waiter_once_and_removes_entry() {
        let table = ExpectationTable::new();
        let id = PeripheralId::new_v4();
        let exp = table.begin(id, Operation::Connect).unwrap();

        assert!(table.resolve(id, Operation::Connect, Ok(())));
        assert!(!table.resolve(id, Operation::Connect, Err(DriverError::new("dup"))));
        assert!(!table.is_pending(id, Operation::Connect));

        let ctx = CancellationToken::new();
        assert_eq!(exp.wait(&ctx).await, Ok(()));
    }

    #[tokio::test]
    async fn driver_failure_is_propagated() {
        let table = ExpectationTable::new();
        let id = PeripheralId::new_v4();
        let exp = table.begin(id, Operation::Disconnect).unwrap();

        table.resolve(id, Operation::Disconnect, Err(DriverError::new("gatt 8")));
        let err = exp.wait(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, CentralError::Driver(DriverError::new("gatt 8")));
    }

    #[tokio::test]
    async fn cancellation_releases_entry() {
        let table = ExpectationTable::new();
        let id = PeripheralId::new_v4();
        let exp = table.begin(id, Operation::Connect).unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(exp.wait(&ctx).await, Err(CentralError::Canceled));
        assert_eq!(table.len(), 0);

        // late callback after cancellation is tolerated
        assert!(!table.resolve(id, Operation::Connect, Ok(())));
    }

    #[tokio::test]
    async fn stale_guard_does_not_release_newer_entry() {
        let table = ExpectationTable::new();
        let id = PeripheralId::new_v4();

        let old = table.begin(id, Operation::Connect).unwrap();
        table.resolve(id, Operation::Connect, Ok(()));
        let _new = table.begin(id, Operation::Connect).unwrap();

        drop(old);
        assert!(table.is_pending(id, Operation::Connect));
    }
}
