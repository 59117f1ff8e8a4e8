//! Buffered transactions over the storage engine
//!
//! A transaction accumulates operations in memory and applies them in a
//! single atomic batch at commit. Reads see the transaction's own pending
//! writes before falling through to the engine.

use crate::engine::StorageEngine;
use mnemo_core::{
    Entity, EntityId, Error, Observation, ObservationId, ProjectId, Relation, RelationId, Result,
};
use std::collections::HashMap;
use tracing::debug;

/// A single buffered mutation
#[derive(Debug, Clone)]
pub enum TransactionOperation {
    /// Insert a new entity, subject to the natural-key constraint
    InsertEntity(Entity),
    /// Store an entity unconditionally (update path)
    PutEntity(Entity),
    /// Delete an entity row and its index entries
    DeleteEntity(EntityId),
    /// Store a relation
    PutRelation(Relation),
    /// Delete a relation
    DeleteRelation(RelationId),
    /// Store an observation
    PutObservation(Observation),
    /// Delete an observation (entity-cascade path)
    DeleteObservation(ObservationId),
}

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A buffered transaction
///
/// Nothing reaches the engine until `commit`; a dropped or rolled-back
/// transaction leaves no trace.
pub struct Transaction {
    engine: StorageEngine,
    operations: Vec<TransactionOperation>,
    state: TransactionState,

    /// Read-through cache so repeated lookups inside the transaction
    /// don't hit the engine twice.
    entity_cache: HashMap<EntityId, Option<Entity>>,
}

impl Transaction {
    pub(crate) fn new(engine: StorageEngine) -> Self {
        Self {
            engine,
            operations: Vec::new(),
            state: TransactionState::Active,
            entity_cache: HashMap::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of buffered operations
    pub fn pending_operations(&self) -> usize {
        self.operations.len()
    }

    fn check_active(&self) -> Result<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            _ => Err(Error::TransactionAborted(format!(
                "transaction is {:?}",
                self.state
            ))),
        }
    }

    // ========== Buffered Writes ==========

    /// Stage a new-entity insert
    pub fn insert_entity(&mut self, entity: Entity) -> Result<()> {
        self.check_active()?;
        self.entity_cache.insert(entity.id, Some(entity.clone()));
        self.operations.push(TransactionOperation::InsertEntity(entity));
        Ok(())
    }

    /// Stage an entity update
    pub fn put_entity(&mut self, entity: Entity) -> Result<()> {
        self.check_active()?;
        self.entity_cache.insert(entity.id, Some(entity.clone()));
        self.operations.push(TransactionOperation::PutEntity(entity));
        Ok(())
    }

    /// Stage an entity delete
    pub fn delete_entity(&mut self, entity_id: EntityId) -> Result<()> {
        self.check_active()?;
        self.entity_cache.insert(entity_id, None);
        self.operations
            .push(TransactionOperation::DeleteEntity(entity_id));
        Ok(())
    }

    /// Stage a relation write
    pub fn put_relation(&mut self, rel: Relation) -> Result<()> {
        self.check_active()?;
        self.operations.push(TransactionOperation::PutRelation(rel));
        Ok(())
    }

    /// Stage a relation delete
    pub fn delete_relation(&mut self, rel_id: RelationId) -> Result<()> {
        self.check_active()?;
        self.operations
            .push(TransactionOperation::DeleteRelation(rel_id));
        Ok(())
    }

    /// Stage an observation write
    pub fn put_observation(&mut self, obs: Observation) -> Result<()> {
        self.check_active()?;
        self.operations
            .push(TransactionOperation::PutObservation(obs));
        Ok(())
    }

    /// Stage an observation delete
    pub fn delete_observation(&mut self, obs_id: ObservationId) -> Result<()> {
        self.check_active()?;
        self.operations
            .push(TransactionOperation::DeleteObservation(obs_id));
        Ok(())
    }

    // ========== Reads (pending-aware) ==========

    /// Get an entity, seeing this transaction's pending writes first
    pub fn get_entity(&mut self, entity_id: EntityId) -> Result<Option<Entity>> {
        self.check_active()?;

        if let Some(cached) = self.entity_cache.get(&entity_id) {
            return Ok(cached.clone());
        }

        let entity = self.engine.get_entity(entity_id)?;
        self.entity_cache.insert(entity_id, entity.clone());
        Ok(entity)
    }

    /// Look up an entity id by natural key, pending inserts included
    pub fn find_entity_id(
        &mut self,
        entity_type: &str,
        name: &str,
        project: Option<ProjectId>,
    ) -> Result<Option<EntityId>> {
        self.check_active()?;

        // Most recent pending write wins
        for op in self.operations.iter().rev() {
            match op {
                TransactionOperation::InsertEntity(e) | TransactionOperation::PutEntity(e) => {
                    if e.entity_type.as_str() == entity_type
                        && e.name == name
                        && e.project == project
                    {
                        return Ok(Some(e.id));
                    }
                }
                TransactionOperation::DeleteEntity(id) => {
                    if let Some(existing) =
                        self.engine.find_entity_id(entity_type, name, project)?
                    {
                        if existing == *id {
                            return Ok(None);
                        }
                    }
                }
                _ => {}
            }
        }

        self.engine.find_entity_id(entity_type, name, project)
    }

    // ========== Lifecycle ==========

    /// Commit all buffered operations atomically
    pub fn commit(mut self) -> Result<()> {
        self.check_active()?;

        let count = self.operations.len();
        self.engine.apply_batch(&self.operations)?;
        self.state = TransactionState::Committed;

        debug!("Committed transaction with {} operations", count);
        Ok(())
    }

    /// Discard all buffered operations
    pub fn rollback(mut self) {
        let count = self.operations.len();
        self.operations.clear();
        self.state = TransactionState::RolledBack;
        debug!("Rolled back transaction with {} operations", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StorageOptions;
    use mnemo_core::{EntityType, IdGenerator, ObservationType, RelationType};
    use tempfile::TempDir;

    fn create_test_engine() -> (StorageEngine, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(StorageOptions::for_testing(temp_dir.path())).unwrap();
        (engine, temp_dir)
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let (engine, _dir) = create_test_engine();
        let ids = IdGenerator::new();

        let entity = Entity::new(ids.next_entity_id(), "alpha", EntityType::Task, None);
        let mut txn = engine.begin_transaction();
        txn.insert_entity(entity.clone()).unwrap();

        // Not visible outside the transaction yet
        assert!(engine.get_entity(entity.id).unwrap().is_none());
        // But visible inside
        assert!(txn.get_entity(entity.id).unwrap().is_some());

        txn.commit().unwrap();
        assert!(engine.get_entity(entity.id).unwrap().is_some());
    }

    #[test]
    fn test_rollback_discards_everything() {
        let (engine, _dir) = create_test_engine();
        let ids = IdGenerator::new();

        let a = Entity::new(ids.next_entity_id(), "a", EntityType::Task, None);
        let b = Entity::new(ids.next_entity_id(), "b", EntityType::Task, None);
        let rel = Relation::new(ids.next_relation_id(), a.id, b.id, RelationType::DependsOn);

        let mut txn = engine.begin_transaction();
        txn.insert_entity(a.clone()).unwrap();
        txn.insert_entity(b.clone()).unwrap();
        txn.put_relation(rel.clone()).unwrap();
        txn.rollback();

        assert!(engine.get_entity(a.id).unwrap().is_none());
        assert!(engine.get_entity(b.id).unwrap().is_none());
        assert!(engine.get_relation(rel.id).unwrap().is_none());
    }

    #[test]
    fn test_failed_commit_leaves_no_state() {
        let (engine, _dir) = create_test_engine();
        let ids = IdGenerator::new();

        let existing = Entity::new(ids.next_entity_id(), "taken", EntityType::Task, None);
        engine.insert_entity(&existing).unwrap();

        let fresh = Entity::new(ids.next_entity_id(), "fresh", EntityType::Task, None);
        let clash = Entity::new(ids.next_entity_id(), "taken", EntityType::Task, None);

        let mut txn = engine.begin_transaction();
        txn.insert_entity(fresh.clone()).unwrap();
        txn.insert_entity(clash).unwrap();

        let err = txn.commit().unwrap_err();
        assert!(err.is_conflict());
        assert!(engine.get_entity(fresh.id).unwrap().is_none());
    }

    #[test]
    fn test_staged_observation_delete() {
        let (engine, _dir) = create_test_engine();
        let ids = IdGenerator::new();

        let entity = Entity::new(ids.next_entity_id(), "cache", EntityType::Component, None);
        engine.insert_entity(&entity).unwrap();
        let obs = Observation::new(
            ids.next_observation_id(),
            entity.id,
            "stale fact",
            ObservationType::Fact,
            "test",
        );
        engine.put_observation(&obs).unwrap();

        let mut txn = engine.begin_transaction();
        txn.delete_observation(obs.id).unwrap();

        // Buffered until commit
        assert!(engine.get_observation(obs.id).unwrap().is_some());
        txn.commit().unwrap();
        assert!(engine.get_observation(obs.id).unwrap().is_none());
        assert!(engine.get_observations_for_entity(entity.id).unwrap().is_empty());
    }

    #[test]
    fn test_find_entity_id_sees_pending_insert() {
        let (engine, _dir) = create_test_engine();
        let ids = IdGenerator::new();

        let entity = Entity::new(ids.next_entity_id(), "pending", EntityType::Concept, None);
        let mut txn = engine.begin_transaction();
        txn.insert_entity(entity.clone()).unwrap();

        let found = txn.find_entity_id("concept", "pending", None).unwrap();
        assert_eq!(found, Some(entity.id));
    }

    #[test]
    fn test_find_entity_id_sees_pending_delete() {
        let (engine, _dir) = create_test_engine();
        let ids = IdGenerator::new();

        let entity = Entity::new(ids.next_entity_id(), "doomed", EntityType::Concept, None);
        engine.insert_entity(&entity).unwrap();

        let mut txn = engine.begin_transaction();
        txn.delete_entity(entity.id).unwrap();

        assert!(txn.find_entity_id("concept", "doomed", None).unwrap().is_none());
    }

    #[test]
    fn test_state_transitions() {
        let (engine, _dir) = create_test_engine();

        let txn = engine.begin_transaction();
        assert_eq!(txn.state(), TransactionState::Active);
        assert_eq!(txn.pending_operations(), 0);
        txn.commit().unwrap();

        let txn = engine.begin_transaction();
        txn.rollback();
    }
}
