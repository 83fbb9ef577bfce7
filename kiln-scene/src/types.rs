//! Core identifiers shared by the scene graph
//!
//! Object ids, component type keys and the per-tick context handed to
//! every update hook.

use std::any::TypeId;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide object id counter. Ids start at 1 and are never reused.
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique, monotonically increasing identifier of a scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate the next id from the process-wide counter
    pub(crate) fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an id from a raw value (used by tests and external tooling)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime identity of a concrete component type
///
/// Two keys are equal only when they name the same concrete type. The name
/// is carried for diagnostics and never takes part in comparisons.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name, for logs and error messages
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.short_name())
    }
}

/// Context of one logic tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Number of ticks run before this one
    pub index: u64,
    /// Time elapsed since the previous tick
    pub delta: Duration,
}

impl Tick {
    pub fn new(index: u64, delta: Duration) -> Self {
        Self { index, delta }
    }

    /// Delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

impl Default for Tick {
    fn default() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_object_ids_increase() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<Alpha>(), TypeKey::of::<Alpha>());
        assert_ne!(TypeKey::of::<Alpha>(), TypeKey::of::<Beta>());
        assert_eq!(TypeKey::of::<Alpha>().short_name(), "Alpha");
    }

    #[test]
    fn test_tick_delta_secs() {
        let tick = Tick::new(3, Duration::from_millis(500));
        assert_eq!(tick.delta_secs(), 0.5);
        assert_eq!(Tick::default().index, 0);
    }
}
