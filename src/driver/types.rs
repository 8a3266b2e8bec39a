//! Data model shared between the runtime and the radio driver.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use uuid::Uuid;

/// Name reported for peripherals that did not advertise one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Stable identifier of a peripheral, as assigned by the platform radio stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralId(Uuid);

impl PeripheralId {
    /// Wraps a platform UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generates a random identifier (useful for tests and simulated drivers).
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for PeripheralId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Link state of a peripheral as reported by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Handle to a discovered peripheral.
///
/// The driver owns the device; the runtime only refers to it by [`PeripheralId`].
/// `state` is the link state at the time the handle was produced. Operations
/// always re-query the driver for the live state before acting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeripheralRef {
    id: PeripheralId,
    name: Option<Arc<str>>,
    state: ConnectionState,
}

impl PeripheralRef {
    /// Creates a handle for a disconnected, unnamed peripheral.
    pub fn new(id: PeripheralId) -> Self {
        Self {
            id,
            name: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Attaches an advertised name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches the link state observed by the driver.
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = state;
        self
    }

    pub fn id(&self) -> PeripheralId {
        self.id
    }

    /// Advertised name, or [`UNKNOWN_NAME`].
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_NAME)
    }

    /// Link state at the time this handle was produced.
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// A service exposed by a connected peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ServiceDescriptor {
    /// Service UUID.
    pub uuid: Uuid,
    /// Whether this is a primary service.
    pub is_primary: bool,
}

impl ServiceDescriptor {
    /// Creates a primary service descriptor.
    pub fn primary(uuid: Uuid) -> Self {
        Self {
            uuid,
            is_primary: true,
        }
    }
}

/// Immutable catalog of services for one peripheral. Replaced wholesale, never edited.
pub type ServiceCatalog = Arc<[ServiceDescriptor]>;

/// Power and permission state of the radio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Radio is powered on.
    pub powered: bool,
    /// The process is allowed to use the radio.
    pub authorized: bool,
}

impl Readiness {
    /// Both powered and authorized.
    pub fn is_ready(&self) -> bool {
        self.powered && self.authorized
    }
}

/// The complete set of discovered peripherals at a point in time.
///
/// Cheap to clone (shared slice). Each snapshot supersedes the previous one;
/// there is no incremental diffing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoverySnapshot(Arc<[PeripheralRef]>);

impl DiscoverySnapshot {
    /// Looks up a peripheral by identifier.
    pub fn find(&self, id: PeripheralId) -> Option<&PeripheralRef> {
        self.0.iter().find(|p| p.id() == id)
    }
}

impl From<Vec<PeripheralRef>> for DiscoverySnapshot {
    fn from(peripherals: Vec<PeripheralRef>) -> Self {
        Self(peripherals.into())
    }
}

impl Deref for DiscoverySnapshot {
    type Target = [PeripheralRef];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_peripheral_uses_placeholder() {
        let p = PeripheralRef::new(PeripheralId::new_v4());
        assert_eq!(p.name(), UNKNOWN_NAME);
        assert_eq!(p.clone().with_name("thermo").name(), "thermo");
    }

    #[test]
    fn readiness_requires_power_and_permission() {
        assert!(!Readiness { powered: true, authorized: false }.is_ready());
        assert!(!Readiness { powered: false, authorized: true }.is_ready());
        assert!(Readiness { powered: true, authorized: true }.is_ready());
    }

    #[test]
    fn snapshot_find_by_id() {
        let a = PeripheralRef::new(PeripheralId::new_v4()).with_name("a");
        let b = PeripheralRef::new(PeripheralId::new_v4()).with_name("b");
        let snap = DiscoverySnapshot::from(vec![a.clone(), b.clone()]);

        assert_eq!(snap.len(), 2);
        assert_eq!(snap.find(b.id()), Some(&b));
        assert!(snap.find(PeripheralId::new_v4()).is_none());
        assert!(DiscoverySnapshot::default().is_empty());
    }
}
