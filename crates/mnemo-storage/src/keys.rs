//! Key encoding for storage operations
//!
//! Provides binary key encoding for all column families. Strings are
//! length-prefixed so composite keys stay prefix-scannable.

use mnemo_core::{EntityId, ObservationId, ProjectId, RelationId, StoreId};

/// Prefix bytes for different key types
pub mod prefix {
    pub const ENTITY: u8 = 0x01;
    pub const RELATION: u8 = 0x02;
    pub const OBSERVATION: u8 = 0x03;
    pub const NATURAL_KEY: u8 = 0x04;
    pub const ADJACENCY_OUT: u8 = 0x05;
    pub const ADJACENCY_IN: u8 = 0x06;
    pub const PROJECT_INDEX: u8 = 0x07;
    pub const ENTITY_OBSERVATIONS: u8 = 0x08;
    pub const META: u8 = 0x09;
}

/// Bucket value used for unscoped records in project-keyed indices
pub const NO_PROJECT_BUCKET: u64 = 0;

/// Map an optional project scope to its index bucket
pub fn project_bucket(project: Option<ProjectId>) -> u64 {
    project.map(|p| p.as_internal()).unwrap_or(NO_PROJECT_BUCKET)
}

/// Key builder for storage operations
#[derive(Debug)]
pub struct KeyBuilder {
    buffer: Vec<u8>,
}

impl KeyBuilder {
    /// Create a new key builder with estimated capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Key for an entity row
    pub fn entity(entity_id: EntityId) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::ENTITY);
        builder.push_u64(entity_id.as_internal());
        builder.finish()
    }

    /// Prefix for scanning all entity rows
    pub fn entity_prefix() -> Vec<u8> {
        vec![prefix::ENTITY]
    }

    /// Key for a relation row
    pub fn relation(rel_id: RelationId) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::RELATION);
        builder.push_u64(rel_id.as_internal());
        builder.finish()
    }

    /// Key for an observation row
    pub fn observation(obs_id: ObservationId) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::OBSERVATION);
        builder.push_u64(obs_id.as_internal());
        builder.finish()
    }

    /// Key for the `(type, name, project)` natural-key index
    pub fn natural_key(entity_type: &str, name: &str, project: Option<ProjectId>) -> Vec<u8> {
        let mut builder = Self::new(13 + entity_type.len() + name.len());
        builder.push_u8(prefix::NATURAL_KEY);
        builder.push_string(entity_type);
        builder.push_string(name);
        builder.push_u64(project_bucket(project));
        builder.finish()
    }

    /// Key for an outgoing adjacency entry
    pub fn adjacency_out(source: EntityId, rel_id: RelationId) -> Vec<u8> {
        let mut builder = Self::new(17);
        builder.push_u8(prefix::ADJACENCY_OUT);
        builder.push_u64(source.as_internal());
        builder.push_u64(rel_id.as_internal());
        builder.finish()
    }

    /// Prefix for scanning a node's outgoing adjacency
    pub fn adjacency_out_prefix(source: EntityId) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::ADJACENCY_OUT);
        builder.push_u64(source.as_internal());
        builder.finish()
    }

    /// Key for an incoming adjacency entry
    pub fn adjacency_in(target: EntityId, rel_id: RelationId) -> Vec<u8> {
        let mut builder = Self::new(17);
        builder.push_u8(prefix::ADJACENCY_IN);
        builder.push_u64(target.as_internal());
        builder.push_u64(rel_id.as_internal());
        builder.finish()
    }

    /// Prefix for scanning a node's incoming adjacency
    pub fn adjacency_in_prefix(target: EntityId) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::ADJACENCY_IN);
        builder.push_u64(target.as_internal());
        builder.finish()
    }

    /// Key for a project membership entry
    pub fn project_index(project: Option<ProjectId>, entity_id: EntityId) -> Vec<u8> {
        let mut builder = Self::new(17);
        builder.push_u8(prefix::PROJECT_INDEX);
        builder.push_u64(project_bucket(project));
        builder.push_u64(entity_id.as_internal());
        builder.finish()
    }

    /// Prefix for scanning a project's entities
    pub fn project_index_prefix(project: Option<ProjectId>) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::PROJECT_INDEX);
        builder.push_u64(project_bucket(project));
        builder.finish()
    }

    /// Key for an entity -> observation membership entry
    pub fn entity_observation(entity_id: EntityId, obs_id: ObservationId) -> Vec<u8> {
        let mut builder = Self::new(17);
        builder.push_u8(prefix::ENTITY_OBSERVATIONS);
        builder.push_u64(entity_id.as_internal());
        builder.push_u64(obs_id.as_internal());
        builder.finish()
    }

    /// Prefix for scanning an entity's observations
    pub fn entity_observation_prefix(entity_id: EntityId) -> Vec<u8> {
        let mut builder = Self::new(9);
        builder.push_u8(prefix::ENTITY_OBSERVATIONS);
        builder.push_u64(entity_id.as_internal());
        builder.finish()
    }

    /// Key for store metadata
    pub fn meta(key: &str) -> Vec<u8> {
        let mut builder = Self::new(3 + key.len());
        builder.push_u8(prefix::META);
        builder.push_string(key);
        builder.finish()
    }

    // Builder methods

    fn push_u8(&mut self, val: u8) {
        self.buffer.push(val);
    }

    fn push_u64(&mut self, val: u64) {
        self.buffer.extend_from_slice(&val.to_be_bytes());
    }

    fn push_string(&mut self, s: &str) {
        // Length-prefixed string
        let bytes = s.as_bytes();
        self.buffer
            .extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Extract the trailing u64 from a composite key
///
/// Adjacency, project-index and observation-membership keys all end with
/// the id of interest.
pub fn trailing_u64(key: &[u8]) -> Option<u64> {
    if key.len() < 8 {
        return None;
    }
    let bytes: [u8; 8] = key[key.len() - 8..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key() {
        let key = KeyBuilder::entity(EntityId::from_internal(42));
        assert_eq!(key[0], prefix::ENTITY);
        assert_eq!(key.len(), 9);
        assert_eq!(trailing_u64(&key), Some(42));
    }

    #[test]
    fn test_natural_key_distinguishes_projects() {
        let k1 = KeyBuilder::natural_key("task", "ship-v2", None);
        let k2 = KeyBuilder::natural_key("task", "ship-v2", Some(ProjectId::from_name("orion")));
        assert_ne!(k1, k2);

        let k3 = KeyBuilder::natural_key("task", "ship-v2", Some(ProjectId::from_name("orion")));
        assert_eq!(k2, k3);
    }

    #[test]
    fn test_natural_key_no_prefix_ambiguity() {
        // ("ab", "c") and ("a", "bc") must encode differently
        let k1 = KeyBuilder::natural_key("ab", "c", None);
        let k2 = KeyBuilder::natural_key("a", "bc", None);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_adjacency_prefix_scanning() {
        let source = EntityId::from_internal(1);
        let prefix = KeyBuilder::adjacency_out_prefix(source);
        let full_key = KeyBuilder::adjacency_out(source, RelationId::from_internal(100));

        assert!(full_key.starts_with(&prefix));
        assert_eq!(trailing_u64(&full_key), Some(100));
    }

    #[test]
    fn test_project_bucket() {
        assert_eq!(project_bucket(None), NO_PROJECT_BUCKET);
        assert_ne!(
            project_bucket(Some(ProjectId::from_name("orion"))),
            NO_PROJECT_BUCKET
        );
    }
}
