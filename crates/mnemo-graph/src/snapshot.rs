//! In-memory graph snapshots
//!
//! A snapshot is a point-in-time copy of a (possibly project-scoped)
//! subgraph, used as the input to analytics and reporting. Mutations made
//! after the snapshot was taken are not reflected in it.

use mnemo_core::{Entity, EntityId, Relation};
use std::collections::HashMap;

/// A point-in-time copy of a subgraph
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    /// All entities in the snapshot, by id
    pub entities: HashMap<EntityId, Entity>,

    /// All relations whose endpoints are both in `entities`
    pub relations: Vec<Relation>,
}

impl GraphSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from parts
    pub fn from_parts(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        let entities: HashMap<EntityId, Entity> =
            entities.into_iter().map(|e| (e.id, e)).collect();
        let relations = relations
            .into_iter()
            .filter(|r| entities.contains_key(&r.from) && entities.contains_key(&r.to))
            .collect();
        Self { entities, relations }
    }

    /// Number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of relations (parallel edges counted individually)
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Whether the snapshot holds no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether the snapshot contains an entity
    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entities.contains_key(&entity_id)
    }

    /// Entity ids in ascending order, for deterministic iteration
    pub fn sorted_entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Collapse parallel edges into a single undirected weighted edge
    ///
    /// Multiple relations between the same pair keep only the strongest
    /// `strength x confidence` weight; direction is discarded. Keys are
    /// normalized as `(min, max)`.
    pub fn collapsed_undirected_edges(&self) -> HashMap<(EntityId, EntityId), f64> {
        let mut edges: HashMap<(EntityId, EntityId), f64> = HashMap::new();
        for rel in &self.relations {
            if rel.from == rel.to {
                continue;
            }
            let key = if rel.from < rel.to {
                (rel.from, rel.to)
            } else {
                (rel.to, rel.from)
            };
            let weight = rel.weight();
            edges
                .entry(key)
                .and_modify(|w| {
                    if weight > *w {
                        *w = weight;
                    }
                })
                .or_insert(weight);
        }
        edges
    }
}
