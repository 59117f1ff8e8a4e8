//! Typed identifiers for graph records
//!
//! Provides strongly-typed identifiers for entities, relations and
//! observations, plus the generator that assigns them at the store boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal numeric ID for efficient storage and lookup
pub type InternalId = u64;

/// Trait for store-assigned record identifiers
pub trait StoreId: Clone + Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display {
    /// Create from internal numeric ID
    fn from_internal(id: InternalId) -> Self;

    /// Get the internal numeric representation
    fn as_internal(&self) -> InternalId;
}

macro_rules! store_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(InternalId);

        impl StoreId for $name {
            fn from_internal(id: InternalId) -> Self {
                Self(id)
            }

            fn as_internal(&self) -> InternalId {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

store_id! {
    /// Identifier for an entity
    EntityId
}

store_id! {
    /// Identifier for a relation
    RelationId
}

store_id! {
    /// Identifier for an observation
    ObservationId
}

/// Identifier for a project scope
///
/// Derived deterministically from the project name so that all components
/// agree on the scope without coordination.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(InternalId);

impl ProjectId {
    /// Create a project ID from a name
    pub fn from_name(name: &str) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_64(name.as_bytes());
        Self(hash)
    }

    /// Create from internal numeric ID
    pub fn from_internal(id: InternalId) -> Self {
        Self(id)
    }

    /// Get the internal numeric representation
    pub fn as_internal(&self) -> InternalId {
        self.0
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier generator for sequential record IDs
#[derive(Debug)]
pub struct IdGenerator {
    next_entity_id: std::sync::atomic::AtomicU64,
    next_relation_id: std::sync::atomic::AtomicU64,
    next_observation_id: std::sync::atomic::AtomicU64,
}

impl IdGenerator {
    /// Create a new ID generator
    pub fn new() -> Self {
        Self::with_start(1, 1, 1)
    }

    /// Create with starting values (for recovery)
    pub fn with_start(entity_start: u64, relation_start: u64, observation_start: u64) -> Self {
        Self {
            next_entity_id: std::sync::atomic::AtomicU64::new(entity_start),
            next_relation_id: std::sync::atomic::AtomicU64::new(relation_start),
            next_observation_id: std::sync::atomic::AtomicU64::new(observation_start),
        }
    }

    /// Generate the next entity ID
    pub fn next_entity_id(&self) -> EntityId {
        let id = self
            .next_entity_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        EntityId::from_internal(id)
    }

    /// Generate the next relation ID
    pub fn next_relation_id(&self) -> RelationId {
        let id = self
            .next_relation_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        RelationId::from_internal(id)
    }

    /// Generate the next observation ID
    pub fn next_observation_id(&self) -> ObservationId {
        let id = self
            .next_observation_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        ObservationId::from_internal(id)
    }

    /// Get current counter values (entity, relation, observation)
    pub fn current(&self) -> (u64, u64, u64) {
        (
            self.next_entity_id.load(std::sync::atomic::Ordering::SeqCst),
            self.next_relation_id.load(std::sync::atomic::Ordering::SeqCst),
            self.next_observation_id
                .load(std::sync::atomic::Ordering::SeqCst),
        )
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_from_internal() {
        let id = EntityId::from_internal(42);
        assert_eq!(id.as_internal(), 42);
    }

    #[test]
    fn test_project_id_from_name() {
        let id1 = ProjectId::from_name("orion");
        let id2 = ProjectId::from_name("orion");
        let id3 = ProjectId::from_name("vega");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_id_generator() {
        let ids = IdGenerator::new();

        let e1 = ids.next_entity_id();
        let e2 = ids.next_entity_id();
        assert_ne!(e1, e2);
        assert_eq!(e1.as_internal() + 1, e2.as_internal());

        let r1 = ids.next_relation_id();
        let r2 = ids.next_relation_id();
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_id_generator_with_start() {
        let ids = IdGenerator::with_start(100, 200, 300);
        assert_eq!(ids.next_entity_id().as_internal(), 100);
        assert_eq!(ids.next_relation_id().as_internal(), 200);
        assert_eq!(ids.next_observation_id().as_internal(), 300);
    }
}
