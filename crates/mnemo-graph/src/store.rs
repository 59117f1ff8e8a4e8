//! Graph store: entity/relation/observation CRUD over the storage engine
//!
//! The store owns id assignment and upsert semantics. `create_entity` is
//! idempotent on the `(name, type, project)` natural key: a second call
//! merges metadata into the existing entity instead of failing.

use crate::snapshot::GraphSnapshot;
use mnemo_core::{
    Direction, Entity, EntityId, EntityType, Error, IdGenerator, Metadata, Observation,
    ObservationId, ObservationType, ProjectId, Relation, RelationType, Result, Timestamp,
};
use mnemo_storage::{StorageEngine, StorageOptions, Transaction, TransactionOperation};
use std::sync::Arc;
use tracing::{debug, info, warn};

const ID_COUNTERS_META_KEY: &str = "id_counters";

/// The knowledge-graph store
///
/// Cheap to clone; clones share the underlying engine and id generator.
#[derive(Clone)]
pub struct GraphStore {
    engine: StorageEngine,
    ids: Arc<IdGenerator>,
}

impl GraphStore {
    /// Open or create a graph store
    ///
    /// Id counters are recovered from store metadata so restarts never
    /// reissue an id.
    pub fn open(options: StorageOptions) -> Result<Self> {
        let engine = StorageEngine::open(options)?;

        let ids = match engine.get_meta(ID_COUNTERS_META_KEY)? {
            Some(bytes) => {
                let (e, r, o): (u64, u64, u64) = bincode::deserialize(&bytes)
                    .map_err(|err| Error::Deserialization(err.to_string()))?;
                info!("Recovered id counters: entity={} relation={} observation={}", e, r, o);
                IdGenerator::with_start(e, r, o)
            }
            None => IdGenerator::new(),
        };

        Ok(Self {
            engine,
            ids: Arc::new(ids),
        })
    }

    /// Access the underlying storage engine
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    fn persist_id_counters(&self) -> Result<()> {
        let counters = self.ids.current();
        let bytes = bincode::serialize(&counters)
            .map_err(|err| Error::Serialization(err.to_string()))?;
        self.engine.put_meta(ID_COUNTERS_META_KEY, &bytes)
    }

    // ========== Entity Operations ==========

    /// Create an entity, or return the existing one for the same natural key
    ///
    /// On upsert the provided metadata is merged over the stored metadata
    /// and `updated_at` is bumped; name, type and project never change.
    pub fn create_entity(
        &self,
        name: &str,
        entity_type: EntityType,
        project: Option<ProjectId>,
        metadata: Metadata,
    ) -> Result<Entity> {
        if let Some(existing_id) = self.engine.find_entity_id(entity_type.as_str(), name, project)?
        {
            return self.merge_into_existing(existing_id, &metadata);
        }

        let entity = Entity::new(self.ids.next_entity_id(), name, entity_type, project)
            .with_metadata(metadata.clone());
        entity.validate()?;

        match self.engine.insert_entity(&entity) {
            Ok(()) => {
                self.persist_id_counters()?;
                debug!("Created entity {:?} '{}'", entity.id, entity.name);
                Ok(entity)
            }
            // Lost the race to a concurrent insert of the same key; the
            // winner's row is the canonical one.
            Err(err) if err.is_conflict() => {
                warn!("Insert race on '{}', merging into winner", name);
                let existing_id = self
                    .engine
                    .find_entity_id(entity_type.as_str(), name, project)?
                    .ok_or_else(|| {
                        Error::Internal(format!("conflict on '{name}' but no row found"))
                    })?;
                self.merge_into_existing(existing_id, &metadata)
            }
            Err(err) => Err(err),
        }
    }

    fn merge_into_existing(&self, entity_id: EntityId, metadata: &Metadata) -> Result<Entity> {
        let mut entity = self
            .engine
            .get_entity(entity_id)?
            .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))?;

        entity.metadata.merge(metadata);
        entity.updated_at = Timestamp::now();
        self.engine.put_entity(&entity)?;

        debug!("Upserted entity {:?} '{}'", entity.id, entity.name);
        Ok(entity)
    }

    /// Get an entity by id
    pub fn get_entity(&self, entity_id: EntityId) -> Result<Entity> {
        self.engine
            .get_entity(entity_id)?
            .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))
    }

    /// Find an entity by natural key
    pub fn find_entity(
        &self,
        entity_type: EntityType,
        name: &str,
        project: Option<ProjectId>,
    ) -> Result<Option<Entity>> {
        match self.engine.find_entity_id(entity_type.as_str(), name, project)? {
            Some(id) => Ok(self.engine.get_entity(id)?),
            None => Ok(None),
        }
    }

    /// Delete an entity, cascading to incident relations and observations
    pub fn delete_entity(&self, entity_id: EntityId) -> Result<bool> {
        if self.engine.get_entity(entity_id)?.is_none() {
            return Ok(false);
        }

        let mut ops = Vec::new();
        for rel in self.engine.get_outgoing_relations(entity_id)? {
            ops.push(TransactionOperation::DeleteRelation(rel.id));
        }
        for rel in self.engine.get_incoming_relations(entity_id)? {
            ops.push(TransactionOperation::DeleteRelation(rel.id));
        }
        for obs in self.engine.get_observations_for_entity(entity_id)? {
            ops.push(TransactionOperation::DeleteObservation(obs.id));
        }
        ops.push(TransactionOperation::DeleteEntity(entity_id));
        self.engine.apply_batch(&ops)?;

        debug!("Deleted entity {:?} with cascade", entity_id);
        Ok(true)
    }

    // ========== Relation Operations ==========

    /// Create a relation between two existing entities
    ///
    /// Parallel edges are allowed: calling this twice with the same
    /// arguments records two relations.
    pub fn create_relation(
        &self,
        from: EntityId,
        to: EntityId,
        rel_type: RelationType,
        strength: f64,
        confidence: f64,
        metadata: Metadata,
    ) -> Result<Relation> {
        if self.engine.get_entity(from)?.is_none() {
            return Err(Error::EntityNotFound(from.to_string()));
        }
        if self.engine.get_entity(to)?.is_none() {
            return Err(Error::EntityNotFound(to.to_string()));
        }

        let rel = Relation::new(self.ids.next_relation_id(), from, to, rel_type)
            .with_weights(strength, confidence)
            .with_metadata(metadata);
        rel.validate()?;

        self.engine.put_relation(&rel)?;
        self.persist_id_counters()?;
        Ok(rel)
    }

    /// Delete a relation
    pub fn delete_relation(&self, rel_id: mnemo_core::RelationId) -> Result<bool> {
        self.engine.delete_relation(rel_id)
    }

    /// Get the relations incident to an entity with the other endpoint resolved
    pub fn get_entity_relations(
        &self,
        entity_id: EntityId,
        direction: Direction,
    ) -> Result<Vec<(Relation, Entity)>> {
        if self.engine.get_entity(entity_id)?.is_none() {
            return Err(Error::EntityNotFound(entity_id.to_string()));
        }

        let mut relations = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            relations.extend(self.engine.get_outgoing_relations(entity_id)?);
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            relations.extend(self.engine.get_incoming_relations(entity_id)?);
        }

        let mut resolved = Vec::with_capacity(relations.len());
        for rel in relations {
            let other_id = rel.other(entity_id).ok_or_else(|| {
                Error::DataCorruption(format!(
                    "adjacency entry for {:?} points at relation {:?} which does not touch it",
                    entity_id, rel.id
                ))
            })?;
            let other = self
                .engine
                .get_entity(other_id)?
                .ok_or_else(|| Error::EntityNotFound(other_id.to_string()))?;
            resolved.push((rel, other));
        }
        Ok(resolved)
    }

    // ========== Observation Operations ==========

    /// Append an observation to an entity
    pub fn add_observation(
        &self,
        entity_id: EntityId,
        content: &str,
        observation_type: ObservationType,
        confidence: f64,
        source: &str,
    ) -> Result<Observation> {
        if self.engine.get_entity(entity_id)?.is_none() {
            return Err(Error::EntityNotFound(entity_id.to_string()));
        }

        let obs = Observation::new(
            self.ids.next_observation_id(),
            entity_id,
            content,
            observation_type,
            source,
        )
        .with_confidence(confidence);
        obs.validate()?;

        self.engine.put_observation(&obs)?;
        self.persist_id_counters()?;
        Ok(obs)
    }

    /// Record a new observation that supersedes an older one
    ///
    /// The old observation stays in the store (observations are
    /// append-only) but its `superseded_by` pointer marks it stale. An
    /// already-superseded observation cannot be superseded again, which
    /// keeps supersession chains linear and acyclic.
    pub fn supersede_observation(
        &self,
        old_id: ObservationId,
        content: &str,
        observation_type: ObservationType,
        confidence: f64,
        source: &str,
    ) -> Result<Observation> {
        let mut old = self
            .engine
            .get_observation(old_id)?
            .ok_or_else(|| Error::ObservationNotFound(old_id.to_string()))?;

        if !old.is_current() {
            return Err(Error::InvalidGraphOperation(format!(
                "observation {old_id} is already superseded"
            )));
        }

        let new_obs = Observation::new(
            self.ids.next_observation_id(),
            old.entity,
            content,
            observation_type,
            source,
        )
        .with_confidence(confidence);
        new_obs.validate()?;

        if new_obs.observed_at < old.observed_at {
            return Err(Error::InvalidGraphOperation(
                "superseding observation predates the original".to_string(),
            ));
        }

        old.superseded_by = Some(new_obs.id);
        self.engine.put_observation(&new_obs)?;
        self.engine.put_observation(&old)?;
        self.persist_id_counters()?;
        Ok(new_obs)
    }

    /// All observations for an entity, oldest first
    pub fn get_observations(&self, entity_id: EntityId) -> Result<Vec<Observation>> {
        if self.engine.get_entity(entity_id)?.is_none() {
            return Err(Error::EntityNotFound(entity_id.to_string()));
        }
        self.engine.get_observations_for_entity(entity_id)
    }

    /// Only the observations not yet superseded, oldest first
    pub fn get_current_observations(&self, entity_id: EntityId) -> Result<Vec<Observation>> {
        Ok(self
            .get_observations(entity_id)?
            .into_iter()
            .filter(|o| o.is_current())
            .collect())
    }

    // ========== Snapshots ==========

    /// Read a point-in-time snapshot of the graph
    ///
    /// With a project scope, only that project's entities and the
    /// relations fully inside the scope are included.
    pub fn read_graph(&self, project: Option<ProjectId>) -> Result<GraphSnapshot> {
        let entities = match project {
            Some(p) => self.engine.get_entities_by_project(Some(p))?,
            None => self.engine.get_all_entities()?,
        };

        let mut relations = Vec::new();
        for entity in &entities {
            relations.extend(self.engine.get_outgoing_relations(entity.id)?);
        }

        debug!(
            "Snapshot: {} entities, {} relations (project={:?})",
            entities.len(),
            relations.len(),
            project
        );
        Ok(GraphSnapshot::from_parts(entities, relations))
    }

    /// Count entities and relations, optionally scoped to a project
    pub fn stats(&self, project: Option<ProjectId>) -> Result<GraphStats> {
        let snapshot = self.read_graph(project)?;
        Ok(GraphStats {
            entity_count: snapshot.entity_count(),
            relation_count: snapshot.relation_count(),
        })
    }

    // ========== Transactions ==========

    /// Begin a buffered graph transaction
    pub fn begin_transaction(&self) -> GraphTransaction {
        GraphTransaction {
            txn: self.engine.begin_transaction(),
            store: self.clone(),
        }
    }
}

/// Store-level size counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relation_count: usize,
}

/// A buffered graph transaction with the same upsert and validation
/// semantics as the store, committed as one atomic batch.
pub struct GraphTransaction {
    txn: Transaction,
    store: GraphStore,
}

impl GraphTransaction {
    /// Look up an entity id by natural key, staged writes included
    pub fn find_entity_id(
        &mut self,
        entity_type: EntityType,
        name: &str,
        project: Option<ProjectId>,
    ) -> Result<Option<EntityId>> {
        self.txn.find_entity_id(entity_type.as_str(), name, project)
    }

    /// Stage an entity upsert; returns the (possibly pre-existing) entity
    pub fn create_entity(
        &mut self,
        name: &str,
        entity_type: EntityType,
        project: Option<ProjectId>,
        metadata: Metadata,
    ) -> Result<Entity> {
        if let Some(existing_id) = self.txn.find_entity_id(entity_type.as_str(), name, project)? {
            let mut entity = self
                .txn
                .get_entity(existing_id)?
                .ok_or_else(|| Error::EntityNotFound(existing_id.to_string()))?;
            entity.metadata.merge(&metadata);
            entity.updated_at = Timestamp::now();
            self.txn.put_entity(entity.clone())?;
            return Ok(entity);
        }

        let entity = Entity::new(self.store.ids.next_entity_id(), name, entity_type, project)
            .with_metadata(metadata);
        entity.validate()?;
        self.txn.insert_entity(entity.clone())?;
        Ok(entity)
    }

    /// Stage a relation between entities visible to this transaction
    pub fn create_relation(
        &mut self,
        from: EntityId,
        to: EntityId,
        rel_type: RelationType,
        strength: f64,
        confidence: f64,
        metadata: Metadata,
    ) -> Result<Relation> {
        if self.txn.get_entity(from)?.is_none() {
            return Err(Error::EntityNotFound(from.to_string()));
        }
        if self.txn.get_entity(to)?.is_none() {
            return Err(Error::EntityNotFound(to.to_string()));
        }

        let rel = Relation::new(self.store.ids.next_relation_id(), from, to, rel_type)
            .with_weights(strength, confidence)
            .with_metadata(metadata);
        rel.validate()?;
        self.txn.put_relation(rel.clone())?;
        Ok(rel)
    }

    /// Stage an observation append
    pub fn add_observation(
        &mut self,
        entity_id: EntityId,
        content: &str,
        observation_type: ObservationType,
        confidence: f64,
        source: &str,
    ) -> Result<Observation> {
        if self.txn.get_entity(entity_id)?.is_none() {
            return Err(Error::EntityNotFound(entity_id.to_string()));
        }

        let obs = Observation::new(
            self.store.ids.next_observation_id(),
            entity_id,
            content,
            observation_type,
            source,
        )
        .with_confidence(confidence);
        obs.validate()?;
        self.txn.put_observation(obs.clone())?;
        Ok(obs)
    }

    /// Number of staged operations
    pub fn pending_operations(&self) -> usize {
        self.txn.pending_operations()
    }

    /// Commit everything atomically
    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        self.store.persist_id_counters()
    }

    /// Discard everything
    pub fn rollback(self) {
        self.txn.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::StoreId;
    use tempfile::TempDir;

    fn create_test_store() -> (GraphStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = GraphStore::open(StorageOptions::for_testing(temp_dir.path())).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_create_entity_is_idempotent() {
        let (store, _dir) = create_test_store();

        let first = store
            .create_entity(
                "auth-service",
                EntityType::Component,
                None,
                Metadata::new().with("lang", "rust"),
            )
            .unwrap();
        let second = store
            .create_entity(
                "auth-service",
                EntityType::Component,
                None,
                Metadata::new().with("owner", "platform"),
            )
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.metadata.get("lang").and_then(|v| v.as_str()), Some("rust"));
        assert_eq!(
            second.metadata.get("owner").and_then(|v| v.as_str()),
            Some("platform")
        );
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.read_graph(None).unwrap().entity_count(), 1);
    }

    #[test]
    fn test_same_name_different_scope_creates_distinct_entities() {
        let (store, _dir) = create_test_store();

        let unscoped = store
            .create_entity("parser", EntityType::Component, None, Metadata::new())
            .unwrap();
        let scoped = store
            .create_entity(
                "parser",
                EntityType::Component,
                Some(ProjectId::from_name("orion")),
                Metadata::new(),
            )
            .unwrap();
        let other_type = store
            .create_entity("parser", EntityType::File, None, Metadata::new())
            .unwrap();

        assert_ne!(unscoped.id, scoped.id);
        assert_ne!(unscoped.id, other_type.id);
    }

    #[test]
    fn test_create_relation_requires_endpoints() {
        let (store, _dir) = create_test_store();

        let a = store
            .create_entity("a", EntityType::Task, None, Metadata::new())
            .unwrap();
        let ghost = EntityId::from_internal(9_999_999);

        let err = store
            .create_relation(a.id, ghost, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parallel_edges_are_kept() {
        let (store, _dir) = create_test_store();

        let a = store
            .create_entity("a", EntityType::Task, None, Metadata::new())
            .unwrap();
        let b = store
            .create_entity("b", EntityType::Task, None, Metadata::new())
            .unwrap();

        store
            .create_relation(a.id, b.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();
        store
            .create_relation(a.id, b.id, RelationType::DependsOn, 0.5, 0.9, Metadata::new())
            .unwrap();

        let relations = store.get_entity_relations(a.id, Direction::Outgoing).unwrap();
        assert_eq!(relations.len(), 2);
    }

    #[test]
    fn test_relation_weight_validation() {
        let (store, _dir) = create_test_store();

        let a = store
            .create_entity("a", EntityType::Task, None, Metadata::new())
            .unwrap();
        let b = store
            .create_entity("b", EntityType::Task, None, Metadata::new())
            .unwrap();

        let err = store
            .create_relation(a.id, b.id, RelationType::DependsOn, 1.5, 1.0, Metadata::new())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_get_entity_relations_directions() {
        let (store, _dir) = create_test_store();

        let hub = store
            .create_entity("hub", EntityType::Component, None, Metadata::new())
            .unwrap();
        let up = store
            .create_entity("up", EntityType::Component, None, Metadata::new())
            .unwrap();
        let down = store
            .create_entity("down", EntityType::Component, None, Metadata::new())
            .unwrap();

        store
            .create_relation(up.id, hub.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();
        store
            .create_relation(hub.id, down.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();

        let outgoing = store.get_entity_relations(hub.id, Direction::Outgoing).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].1.name, "down");

        let incoming = store.get_entity_relations(hub.id, Direction::Incoming).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].1.name, "up");

        let both = store.get_entity_relations(hub.id, Direction::Both).unwrap();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_observation_supersession() {
        let (store, _dir) = create_test_store();

        let entity = store
            .create_entity("cache", EntityType::Component, None, Metadata::new())
            .unwrap();

        let old = store
            .add_observation(entity.id, "hit rate ~80%", ObservationType::Outcome, 0.9, "metrics")
            .unwrap();
        let new = store
            .supersede_observation(old.id, "hit rate ~92%", ObservationType::Outcome, 0.9, "metrics")
            .unwrap();

        let all = store.get_observations(entity.id).unwrap();
        assert_eq!(all.len(), 2);

        let current = store.get_current_observations(entity.id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, new.id);

        // The chain stays linear
        let err = store
            .supersede_observation(old.id, "again", ObservationType::Outcome, 0.9, "metrics")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGraphOperation(_)));
    }

    #[test]
    fn test_read_graph_project_scope() {
        let (store, _dir) = create_test_store();
        let orion = Some(ProjectId::from_name("orion"));

        let a = store
            .create_entity("a", EntityType::Task, orion, Metadata::new())
            .unwrap();
        let b = store
            .create_entity("b", EntityType::Task, orion, Metadata::new())
            .unwrap();
        let outside = store
            .create_entity("outside", EntityType::Task, None, Metadata::new())
            .unwrap();

        store
            .create_relation(a.id, b.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();
        store
            .create_relation(a.id, outside.id, RelationType::RelatesTo, 1.0, 1.0, Metadata::new())
            .unwrap();

        let scoped = store.read_graph(orion).unwrap();
        assert_eq!(scoped.entity_count(), 2);
        // Cross-scope relations are excluded
        assert_eq!(scoped.relation_count(), 1);

        let full = store.read_graph(None).unwrap();
        assert_eq!(full.entity_count(), 3);
        assert_eq!(full.relation_count(), 2);
    }

    #[test]
    fn test_stats_respect_project_scope() {
        let (store, _dir) = create_test_store();
        let orion = Some(ProjectId::from_name("orion"));

        let a = store
            .create_entity("a", EntityType::Task, orion, Metadata::new())
            .unwrap();
        let b = store
            .create_entity("b", EntityType::Task, orion, Metadata::new())
            .unwrap();
        store
            .create_entity("c", EntityType::Task, None, Metadata::new())
            .unwrap();
        store
            .create_relation(a.id, b.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();

        let scoped = store.stats(orion).unwrap();
        assert_eq!(scoped, GraphStats { entity_count: 2, relation_count: 1 });

        let full = store.stats(None).unwrap();
        assert_eq!(full.entity_count, 3);
    }

    #[test]
    fn test_delete_entity_cascades() {
        let (store, _dir) = create_test_store();

        let a = store
            .create_entity("a", EntityType::Task, None, Metadata::new())
            .unwrap();
        let b = store
            .create_entity("b", EntityType::Task, None, Metadata::new())
            .unwrap();
        store
            .create_relation(a.id, b.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();
        let obs = store
            .add_observation(a.id, "obsolete", ObservationType::Fact, 1.0, "test")
            .unwrap();

        assert!(store.delete_entity(a.id).unwrap());
        assert!(store.get_entity(a.id).is_err());
        assert!(store.get_entity_relations(b.id, Direction::Both).unwrap().is_empty());
        // Observation rows and their membership index entries go with it
        assert!(store.engine().get_observation(obs.id).unwrap().is_none());
        assert!(store.engine().get_observations_for_entity(a.id).unwrap().is_empty());
        // Re-creating under the same name yields a fresh entity
        let again = store
            .create_entity("a", EntityType::Task, None, Metadata::new())
            .unwrap();
        assert_ne!(again.id, a.id);
    }

    #[test]
    fn test_id_counters_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let first_id;
        {
            let store = GraphStore::open(StorageOptions::for_testing(temp_dir.path())).unwrap();
            first_id = store
                .create_entity("a", EntityType::Task, None, Metadata::new())
                .unwrap()
                .id;
        }
        let store = GraphStore::open(StorageOptions::for_testing(temp_dir.path())).unwrap();
        let next = store
            .create_entity("b", EntityType::Task, None, Metadata::new())
            .unwrap();
        assert!(next.id > first_id);
    }

    #[test]
    fn test_transaction_upsert_and_rollback() {
        let (store, _dir) = create_test_store();

        let existing = store
            .create_entity("shared", EntityType::Concept, None, Metadata::new())
            .unwrap();

        let mut txn = store.begin_transaction();
        let seen = txn
            .create_entity("shared", EntityType::Concept, None, Metadata::new())
            .unwrap();
        assert_eq!(seen.id, existing.id);

        let fresh = txn
            .create_entity("fresh", EntityType::Concept, None, Metadata::new())
            .unwrap();
        txn.create_relation(seen.id, fresh.id, RelationType::RelatesTo, 1.0, 1.0, Metadata::new())
            .unwrap();
        txn.rollback();

        assert!(store.find_entity(EntityType::Concept, "fresh", None).unwrap().is_none());
        assert!(store
            .get_entity_relations(existing.id, Direction::Both)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_transaction_commit_is_atomic() {
        let (store, _dir) = create_test_store();

        let mut txn = store.begin_transaction();
        let a = txn
            .create_entity("a", EntityType::Task, None, Metadata::new())
            .unwrap();
        let b = txn
            .create_entity("b", EntityType::Task, None, Metadata::new())
            .unwrap();
        txn.create_relation(a.id, b.id, RelationType::DependsOn, 1.0, 1.0, Metadata::new())
            .unwrap();
        txn.add_observation(a.id, "staged", ObservationType::Fact, 1.0, "test")
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(store.read_graph(None).unwrap().entity_count(), 2);
        assert_eq!(store.get_observations(a.id).unwrap().len(), 1);
    }
}
