//! Storage engine implementation using RocksDB

use crate::keys::{trailing_u64, KeyBuilder};
use crate::options::StorageOptions;
use crate::transaction::{Transaction, TransactionOperation};
use mnemo_core::{
    Entity, EntityId, Error, Observation, ObservationId, ProjectId, Relation, RelationId, Result,
    StoreId,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Column family names
pub mod cf {
    pub const ENTITIES: &str = "entities";
    pub const RELATIONS: &str = "relations";
    pub const OBSERVATIONS: &str = "observations";
    pub const NATURAL_KEYS: &str = "natural_keys";
    pub const ADJACENCY_OUT: &str = "adjacency_out";
    pub const ADJACENCY_IN: &str = "adjacency_in";
    pub const PROJECT_INDEX: &str = "project_index";
    pub const ENTITY_OBSERVATIONS: &str = "entity_observations";
    pub const META: &str = "meta";
}

/// All column families used by the engine
pub const COLUMN_FAMILIES: &[&str] = &[
    cf::ENTITIES,
    cf::RELATIONS,
    cf::OBSERVATIONS,
    cf::NATURAL_KEYS,
    cf::ADJACENCY_OUT,
    cf::ADJACENCY_IN,
    cf::PROJECT_INDEX,
    cf::ENTITY_OBSERVATIONS,
    cf::META,
];

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

/// The storage engine backing the graph store
///
/// All multi-row mutations go through RocksDB `WriteBatch`es, so a single
/// logical operation (or a committed transaction) is visible entirely or
/// not at all.
pub struct StorageEngine {
    db: Arc<DB>,
    #[allow(dead_code)]
    options: StorageOptions,

    /// Serializes natural-key check-then-insert so concurrent upserts on
    /// the same key resolve deterministically to a conflict, not a
    /// double-insert.
    natural_key_guard: Arc<Mutex<()>>,
}

impl StorageEngine {
    /// Open or create a storage engine
    pub fn open(options: StorageOptions) -> Result<Self> {
        info!("Opening storage engine at {:?}", options.path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(options.create_if_missing);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(options.write_buffer_size);
        db_opts.set_max_write_buffer_number(options.max_write_buffer_number);
        db_opts.set_max_background_jobs(options.max_background_jobs);

        if options.enable_compression {
            db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if options.enable_bloom_filter {
                    let mut block_opts = rocksdb::BlockBasedOptions::default();
                    block_opts.set_bloom_filter(options.bloom_filter_bits_per_key as f64, false);
                    cf_opts.set_block_based_table_factory(&block_opts);
                }
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, &options.path, cf_descriptors)
            .map_err(|e| Error::Storage(e.to_string()))?;

        info!("Storage engine opened successfully");

        Ok(Self {
            db: Arc::new(db),
            options,
            natural_key_guard: Arc::new(Mutex::new(())),
        })
    }

    /// Get a reference to a column family
    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Internal(format!("Column family not found: {}", name)))
    }

    // ========== Entity Operations ==========

    /// Insert a new entity, enforcing the natural-key constraint
    ///
    /// Returns `UniqueConflict` if `(name, type, project)` already maps to
    /// a different entity id.
    pub fn insert_entity(&self, entity: &Entity) -> Result<()> {
        let guard = self.natural_key_guard.clone();
        let _lock = guard
            .lock()
            .map_err(|_| Error::Internal("natural key guard poisoned".to_string()))?;

        if let Some(existing) =
            self.find_entity_id(entity.entity_type.as_str(), &entity.name, entity.project)?
        {
            if existing != entity.id {
                return Err(Error::UniqueConflict {
                    name: entity.name.clone(),
                    entity_type: entity.entity_type.as_str().to_string(),
                });
            }
        }

        let mut batch = WriteBatch::default();
        self.stage_put_entity(&mut batch, entity)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("Inserted entity {:?} '{}'", entity.id, entity.name);
        Ok(())
    }

    /// Store an entity unconditionally (used for metadata/timestamp updates)
    ///
    /// The natural key of an existing entity never changes, so the index
    /// entry is simply rewritten.
    pub fn put_entity(&self, entity: &Entity) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_put_entity(&mut batch, entity)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("Stored entity {:?}", entity.id);
        Ok(())
    }

    fn stage_put_entity(&self, batch: &mut WriteBatch, entity: &Entity) -> Result<()> {
        let key = KeyBuilder::entity(entity.id);
        let value = encode(entity)?;
        batch.put_cf(self.cf(cf::ENTITIES)?, &key, &value);

        let nat_key =
            KeyBuilder::natural_key(entity.entity_type.as_str(), &entity.name, entity.project);
        batch.put_cf(
            self.cf(cf::NATURAL_KEYS)?,
            &nat_key,
            entity.id.as_internal().to_be_bytes(),
        );

        let proj_key = KeyBuilder::project_index(entity.project, entity.id);
        batch.put_cf(self.cf(cf::PROJECT_INDEX)?, &proj_key, []);

        Ok(())
    }

    /// Get an entity by ID
    pub fn get_entity(&self, entity_id: EntityId) -> Result<Option<Entity>> {
        let key = KeyBuilder::entity(entity_id);
        match self.db.get_cf(self.cf(cf::ENTITIES)?, &key) {
            Ok(Some(value)) => Ok(Some(decode(&value)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    /// Look up an entity id by natural key
    pub fn find_entity_id(
        &self,
        entity_type: &str,
        name: &str,
        project: Option<ProjectId>,
    ) -> Result<Option<EntityId>> {
        let key = KeyBuilder::natural_key(entity_type, name, project);
        match self.db.get_cf(self.cf(cf::NATURAL_KEYS)?, &key) {
            Ok(Some(value)) => {
                let bytes: [u8; 8] = value.as_slice().try_into().map_err(|_| {
                    Error::DataCorruption("natural key value is not an 8-byte id".to_string())
                })?;
                Ok(Some(EntityId::from_internal(u64::from_be_bytes(bytes))))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    /// Delete an entity row and its index entries
    ///
    /// Incident relations and observations are cascaded by the graph store
    /// before this is called.
    pub fn delete_entity(&self, entity_id: EntityId) -> Result<bool> {
        let entity = match self.get_entity(entity_id)? {
            Some(e) => e,
            None => return Ok(false),
        };

        let mut batch = WriteBatch::default();
        self.stage_delete_entity(&mut batch, &entity)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("Deleted entity {:?}", entity_id);
        Ok(true)
    }

    fn stage_delete_entity(&self, batch: &mut WriteBatch, entity: &Entity) -> Result<()> {
        batch.delete_cf(self.cf(cf::ENTITIES)?, KeyBuilder::entity(entity.id));
        batch.delete_cf(
            self.cf(cf::NATURAL_KEYS)?,
            KeyBuilder::natural_key(entity.entity_type.as_str(), &entity.name, entity.project),
        );
        batch.delete_cf(
            self.cf(cf::PROJECT_INDEX)?,
            KeyBuilder::project_index(entity.project, entity.id),
        );
        Ok(())
    }

    /// Get all entities in the store
    pub fn get_all_entities(&self) -> Result<Vec<Entity>> {
        let prefix = KeyBuilder::entity_prefix();
        let cf = self.cf(cf::ENTITIES)?;

        let mut entities = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, &prefix) {
            let (key, value) = item.map_err(|e| Error::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            entities.push(decode(&value)?);
        }
        Ok(entities)
    }

    /// Get all entities in a project scope
    pub fn get_entities_by_project(&self, project: Option<ProjectId>) -> Result<Vec<Entity>> {
        let prefix = KeyBuilder::project_index_prefix(project);
        let cf = self.cf(cf::PROJECT_INDEX)?;

        let mut entities = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, &prefix) {
            let (key, _) = item.map_err(|e| Error::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(id) = trailing_u64(&key) {
                if let Some(entity) = self.get_entity(EntityId::from_internal(id))? {
                    entities.push(entity);
                }
            }
        }
        Ok(entities)
    }

    // ========== Relation Operations ==========

    /// Store a relation with both adjacency entries
    pub fn put_relation(&self, rel: &Relation) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_put_relation(&mut batch, rel)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!(
            "Stored relation {:?} ({:?})-[:{}]->({:?})",
            rel.id,
            rel.from,
            rel.rel_type.as_str(),
            rel.to
        );
        Ok(())
    }

    fn stage_put_relation(&self, batch: &mut WriteBatch, rel: &Relation) -> Result<()> {
        let key = KeyBuilder::relation(rel.id);
        let value = encode(rel)?;
        batch.put_cf(self.cf(cf::RELATIONS)?, &key, &value);

        batch.put_cf(
            self.cf(cf::ADJACENCY_OUT)?,
            KeyBuilder::adjacency_out(rel.from, rel.id),
            rel.to.as_internal().to_be_bytes(),
        );
        batch.put_cf(
            self.cf(cf::ADJACENCY_IN)?,
            KeyBuilder::adjacency_in(rel.to, rel.id),
            rel.from.as_internal().to_be_bytes(),
        );
        Ok(())
    }

    /// Get a relation by ID
    pub fn get_relation(&self, rel_id: RelationId) -> Result<Option<Relation>> {
        let key = KeyBuilder::relation(rel_id);
        match self.db.get_cf(self.cf(cf::RELATIONS)?, &key) {
            Ok(Some(value)) => Ok(Some(decode(&value)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    /// Delete a relation and its adjacency entries
    pub fn delete_relation(&self, rel_id: RelationId) -> Result<bool> {
        let rel = match self.get_relation(rel_id)? {
            Some(r) => r,
            None => return Ok(false),
        };

        let mut batch = WriteBatch::default();
        self.stage_delete_relation(&mut batch, &rel)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("Deleted relation {:?}", rel_id);
        Ok(true)
    }

    fn stage_delete_relation(&self, batch: &mut WriteBatch, rel: &Relation) -> Result<()> {
        batch.delete_cf(self.cf(cf::RELATIONS)?, KeyBuilder::relation(rel.id));
        batch.delete_cf(
            self.cf(cf::ADJACENCY_OUT)?,
            KeyBuilder::adjacency_out(rel.from, rel.id),
        );
        batch.delete_cf(
            self.cf(cf::ADJACENCY_IN)?,
            KeyBuilder::adjacency_in(rel.to, rel.id),
        );
        Ok(())
    }

    /// Get outgoing relations from an entity
    pub fn get_outgoing_relations(&self, entity_id: EntityId) -> Result<Vec<Relation>> {
        self.scan_adjacency(cf::ADJACENCY_OUT, KeyBuilder::adjacency_out_prefix(entity_id))
    }

    /// Get incoming relations to an entity
    pub fn get_incoming_relations(&self, entity_id: EntityId) -> Result<Vec<Relation>> {
        self.scan_adjacency(cf::ADJACENCY_IN, KeyBuilder::adjacency_in_prefix(entity_id))
    }

    fn scan_adjacency(&self, cf_name: &str, prefix: Vec<u8>) -> Result<Vec<Relation>> {
        let cf = self.cf(cf_name)?;
        let mut relations = Vec::new();

        for item in self.db.prefix_iterator_cf(cf, &prefix) {
            let (key, _) = item.map_err(|e| Error::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(rel_id) = trailing_u64(&key) {
                if let Some(rel) = self.get_relation(RelationId::from_internal(rel_id))? {
                    relations.push(rel);
                }
            }
        }
        Ok(relations)
    }

    // ========== Observation Operations ==========

    /// Store an observation with its entity-membership entry
    pub fn put_observation(&self, obs: &Observation) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_put_observation(&mut batch, obs)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("Stored observation {:?} for entity {:?}", obs.id, obs.entity);
        Ok(())
    }

    fn stage_put_observation(&self, batch: &mut WriteBatch, obs: &Observation) -> Result<()> {
        let key = KeyBuilder::observation(obs.id);
        let value = encode(obs)?;
        batch.put_cf(self.cf(cf::OBSERVATIONS)?, &key, &value);
        batch.put_cf(
            self.cf(cf::ENTITY_OBSERVATIONS)?,
            KeyBuilder::entity_observation(obs.entity, obs.id),
            [],
        );
        Ok(())
    }

    /// Get an observation by ID
    pub fn get_observation(&self, obs_id: ObservationId) -> Result<Option<Observation>> {
        let key = KeyBuilder::observation(obs_id);
        match self.db.get_cf(self.cf(cf::OBSERVATIONS)?, &key) {
            Ok(Some(value)) => Ok(Some(decode(&value)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    /// Get all observations for an entity, oldest first
    pub fn get_observations_for_entity(&self, entity_id: EntityId) -> Result<Vec<Observation>> {
        let prefix = KeyBuilder::entity_observation_prefix(entity_id);
        let cf = self.cf(cf::ENTITY_OBSERVATIONS)?;

        let mut observations = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, &prefix) {
            let (key, _) = item.map_err(|e| Error::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(obs_id) = trailing_u64(&key) {
                if let Some(obs) = self.get_observation(ObservationId::from_internal(obs_id))? {
                    observations.push(obs);
                }
            }
        }
        observations.sort_by_key(|o| (o.observed_at, o.id));
        Ok(observations)
    }

    /// Delete an observation row and its entity-membership entry
    pub fn delete_observation(&self, obs_id: ObservationId) -> Result<bool> {
        let obs = match self.get_observation(obs_id)? {
            Some(o) => o,
            None => return Ok(false),
        };

        let mut batch = WriteBatch::default();
        self.stage_delete_observation(&mut batch, &obs)?;
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(true)
    }

    fn stage_delete_observation(&self, batch: &mut WriteBatch, obs: &Observation) -> Result<()> {
        batch.delete_cf(self.cf(cf::OBSERVATIONS)?, KeyBuilder::observation(obs.id));
        batch.delete_cf(
            self.cf(cf::ENTITY_OBSERVATIONS)?,
            KeyBuilder::entity_observation(obs.entity, obs.id),
        );
        Ok(())
    }

    // ========== Metadata Operations ==========

    /// Store metadata
    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<()> {
        let storage_key = KeyBuilder::meta(key);
        self.db
            .put_cf(self.cf(cf::META)?, &storage_key, value)
            .map_err(|e| Error::Storage(e.to_string()))
    }

    /// Get metadata
    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let storage_key = KeyBuilder::meta(key);
        self.db
            .get_cf(self.cf(cf::META)?, &storage_key)
            .map_err(|e| Error::Storage(e.to_string()))
    }

    // ========== Transaction Operations ==========

    /// Begin a new buffered transaction
    pub fn begin_transaction(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    /// Apply a batch of transaction operations atomically
    ///
    /// All natural-key checks run up front under the insert guard; the
    /// resulting `WriteBatch` hits RocksDB in one write, so a failed batch
    /// leaves no partial state.
    pub fn apply_batch(&self, operations: &[TransactionOperation]) -> Result<()> {
        let guard = self.natural_key_guard.clone();
        let _lock = guard
            .lock()
            .map_err(|_| Error::Internal("natural key guard poisoned".to_string()))?;

        // Pre-validate inserts against the store and against the batch itself.
        let mut pending_keys: HashMap<Vec<u8>, EntityId> = HashMap::new();
        for op in operations {
            if let TransactionOperation::InsertEntity(entity) = op {
                let nat_key = KeyBuilder::natural_key(
                    entity.entity_type.as_str(),
                    &entity.name,
                    entity.project,
                );
                let conflict = match pending_keys.get(&nat_key) {
                    Some(id) => *id != entity.id,
                    None => self
                        .find_entity_id(entity.entity_type.as_str(), &entity.name, entity.project)?
                        .is_some_and(|id| id != entity.id),
                };
                if conflict {
                    return Err(Error::UniqueConflict {
                        name: entity.name.clone(),
                        entity_type: entity.entity_type.as_str().to_string(),
                    });
                }
                pending_keys.insert(nat_key, entity.id);
            }
        }

        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                TransactionOperation::InsertEntity(entity)
                | TransactionOperation::PutEntity(entity) => {
                    self.stage_put_entity(&mut batch, entity)?;
                }
                TransactionOperation::DeleteEntity(entity_id) => {
                    if let Some(entity) = self.get_entity(*entity_id)? {
                        self.stage_delete_entity(&mut batch, &entity)?;
                    }
                }
                TransactionOperation::PutRelation(rel) => {
                    self.stage_put_relation(&mut batch, rel)?;
                }
                TransactionOperation::DeleteRelation(rel_id) => {
                    if let Some(rel) = self.get_relation(*rel_id)? {
                        self.stage_delete_relation(&mut batch, &rel)?;
                    }
                }
                TransactionOperation::PutObservation(obs) => {
                    self.stage_put_observation(&mut batch, obs)?;
                }
                TransactionOperation::DeleteObservation(obs_id) => {
                    if let Some(obs) = self.get_observation(*obs_id)? {
                        self.stage_delete_observation(&mut batch, &obs)?;
                    }
                }
            }
        }

        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("Applied transaction batch of {} operations", operations.len());
        Ok(())
    }

    // ========== Utility Operations ==========

    /// Flush all in-memory data to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| Error::Storage(e.to_string()))?;
        info!("Storage engine flushed");
        Ok(())
    }
}

impl Clone for StorageEngine {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            options: self.options.clone(),
            natural_key_guard: Arc::clone(&self.natural_key_guard),
        }
    }
}
