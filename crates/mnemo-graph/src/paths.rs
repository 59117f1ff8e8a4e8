//! Pathfinding over the persisted graph
//!
//! The pathfinder reads adjacency from storage and memoizes neighbor
//! lists per `(entity, direction)`, so repeated queries over the same
//! region touch the engine once. The cache does not observe writes made
//! after it was populated; call `clear_cache` between write batches.

use crate::store::GraphStore;
use mnemo_core::{
    Direction, Entity, EntityId, Error, Relation, RelationId, Result,
};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// Floor applied to relation strength when computing traversal cost, so
/// near-zero strengths don't produce unbounded costs.
const STRENGTH_FLOOR: f64 = 0.1;

/// Traversal cost of one relation
///
/// Strong, confident relations are cheap; weak or doubtful ones are
/// expensive. Always >= 1, so cost never undercuts hop count.
pub fn edge_cost(strength: f64, confidence: f64) -> f64 {
    (1.0 / strength.max(STRENGTH_FLOOR)) * (2.0 - confidence)
}

/// One hop of a resolved path
#[derive(Debug, Clone)]
pub struct PathSegment {
    /// The entity at this position
    pub entity: Entity,

    /// The relation leading to the next position; None on the last hop
    pub relation_to_next: Option<Relation>,
}

#[derive(Debug, Clone, Copy)]
struct CachedEdge {
    to: EntityId,
    relation: RelationId,
    strength: f64,
    confidence: f64,
}

/// Pathfinding engine with a per-query adjacency cache
pub struct PathFinder {
    store: GraphStore,
    cache: HashMap<(EntityId, Direction), Vec<CachedEdge>>,
}

impl PathFinder {
    /// Create a pathfinder over a store
    pub fn new(store: GraphStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    /// Drop all memoized adjacency
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of cached adjacency lists
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn neighbors(&mut self, entity_id: EntityId, direction: Direction) -> Result<Vec<CachedEdge>> {
        if let Some(edges) = self.cache.get(&(entity_id, direction)) {
            return Ok(edges.clone());
        }

        let mut edges = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for rel in self.store.engine().get_outgoing_relations(entity_id)? {
                edges.push(CachedEdge {
                    to: rel.to,
                    relation: rel.id,
                    strength: rel.strength,
                    confidence: rel.confidence,
                });
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for rel in self.store.engine().get_incoming_relations(entity_id)? {
                edges.push(CachedEdge {
                    to: rel.from,
                    relation: rel.id,
                    strength: rel.strength,
                    confidence: rel.confidence,
                });
            }
        }
        edges.sort_by_key(|e| (e.to, e.relation));

        self.cache.insert((entity_id, direction), edges.clone());
        Ok(edges)
    }

    fn entity_exists(&self, entity_id: EntityId) -> Result<bool> {
        Ok(self.store.engine().get_entity(entity_id)?.is_some())
    }

    // ========== Queries ==========

    /// Find a shortest path by hop count
    ///
    /// Returns the path and its length. `from == to` yields the trivial
    /// path of length 0; an unreachable or unknown endpoint yields
    /// `(None, -1)`.
    pub fn shortest_path(
        &mut self,
        from: EntityId,
        to: EntityId,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Result<(Option<Vec<EntityId>>, i64)> {
        if !self.entity_exists(from)? || !self.entity_exists(to)? {
            return Ok((None, -1));
        }

        if from == to {
            return Ok((Some(vec![from]), 0));
        }

        let mut parent: HashMap<EntityId, EntityId> = HashMap::new();
        let mut depth: HashMap<EntityId, usize> = HashMap::new();
        depth.insert(from, 0);

        let mut queue = VecDeque::new();
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let current_depth = depth[&current];
            if max_depth.is_some_and(|limit| current_depth >= limit) {
                continue;
            }

            for edge in self.neighbors(current, direction)? {
                if depth.contains_key(&edge.to) {
                    continue;
                }
                depth.insert(edge.to, current_depth + 1);
                parent.insert(edge.to, current);

                if edge.to == to {
                    let mut path = vec![to];
                    let mut node = to;
                    while let Some(&p) = parent.get(&node) {
                        path.push(p);
                        node = p;
                    }
                    path.reverse();
                    let length = (path.len() - 1) as i64;
                    return Ok((Some(path), length));
                }
                queue.push_back(edge.to);
            }
        }

        Ok((None, -1))
    }

    /// Enumerate all simple paths between two entities
    ///
    /// `max_depth` bounds path length in hops and is mandatory; without
    /// it, dense graphs explode combinatorially. An unknown endpoint
    /// yields no paths.
    pub fn all_paths(
        &mut self,
        from: EntityId,
        to: EntityId,
        direction: Direction,
        max_depth: usize,
    ) -> Result<Vec<Vec<EntityId>>> {
        if !self.entity_exists(from)? || !self.entity_exists(to)? {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut current = vec![from];
        let mut visited: HashSet<EntityId> = HashSet::from([from]);
        self.dfs_paths(from, to, direction, max_depth, &mut current, &mut visited, &mut results)?;

        results.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs_paths(
        &mut self,
        current: EntityId,
        to: EntityId,
        direction: Direction,
        max_depth: usize,
        path: &mut Vec<EntityId>,
        visited: &mut HashSet<EntityId>,
        results: &mut Vec<Vec<EntityId>>,
    ) -> Result<()> {
        if current == to {
            results.push(path.clone());
            return Ok(());
        }
        if path.len() > max_depth {
            return Ok(());
        }

        for edge in self.neighbors(current, direction)? {
            if visited.contains(&edge.to) {
                continue;
            }
            visited.insert(edge.to);
            path.push(edge.to);
            self.dfs_paths(edge.to, to, direction, max_depth, path, visited, results)?;
            path.pop();
            visited.remove(&edge.to);
        }
        Ok(())
    }

    /// Find the cheapest path by relation quality
    ///
    /// Dijkstra over bicriteria labels, no heuristic. Edge cost is
    /// `(1 / max(strength, 0.1)) * (2 - confidence)`, so the result
    /// prefers strong, confident relations over short hops. `max_depth`
    /// bounds path length in hops. Unreachable targets and unknown
    /// endpoints yield `(None, -1.0)`.
    pub fn weighted_path(
        &mut self,
        from: EntityId,
        to: EntityId,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Result<(Option<Vec<EntityId>>, f64)> {
        if !self.entity_exists(from)? || !self.entity_exists(to)? {
            return Ok((None, -1.0));
        }

        if from == to {
            return Ok((Some(vec![from]), 0.0));
        }

        // A label survives only while no other known route to its node is
        // both cheaper and shorter in hops. Keeping the whole Pareto front
        // means a cheap-but-deep route cannot shadow a costlier route
        // that still fits the hop cap. At most one label exists per
        // (node, hops), so parents key on that pair.
        let mut labels: HashMap<EntityId, Vec<(f64, usize)>> = HashMap::new();
        let mut parent: HashMap<(EntityId, usize), (EntityId, usize)> = HashMap::new();
        labels.insert(from, vec![(0.0, 0)]);

        let mut heap = BinaryHeap::new();
        heap.push(HeapEntry { cost: 0.0, hops: 0, node: from });

        while let Some(HeapEntry { cost, hops, node }) = heap.pop() {
            // Dropped label: a dominating route was found after this
            // entry was queued
            if !labels.get(&node).is_some_and(|ls| ls.contains(&(cost, hops))) {
                continue;
            }
            if node == to {
                let mut path = vec![to];
                let mut state = (to, hops);
                while let Some(&p) = parent.get(&state) {
                    path.push(p.0);
                    state = p;
                }
                path.reverse();
                return Ok((Some(path), cost));
            }
            if max_depth.is_some_and(|limit| hops >= limit) {
                continue;
            }

            for edge in self.neighbors(node, direction)? {
                let next_cost = cost + edge_cost(edge.strength, edge.confidence);
                let next_hops = hops + 1;
                let entry = labels.entry(edge.to).or_default();
                if entry.iter().any(|&(c, h)| c <= next_cost && h <= next_hops) {
                    continue;
                }
                entry.retain(|&(c, h)| c < next_cost || h < next_hops);
                entry.push((next_cost, next_hops));
                parent.insert((edge.to, next_hops), (node, hops));
                heap.push(HeapEntry { cost: next_cost, hops: next_hops, node: edge.to });
            }
        }

        Ok((None, -1.0))
    }

    /// Resolve a path into its entities and connecting relations
    ///
    /// When consecutive entities are joined by parallel relations, the one
    /// with the highest `strength x confidence` is reported.
    pub fn get_path_details(&mut self, path: &[EntityId]) -> Result<Vec<PathSegment>> {
        let mut segments = Vec::with_capacity(path.len());
        for (i, &entity_id) in path.iter().enumerate() {
            let entity = self.store.get_entity(entity_id)?;

            let relation_to_next = match path.get(i + 1) {
                Some(&next) => {
                    let edges = self.neighbors(entity_id, Direction::Both)?;
                    let mut best: Option<CachedEdge> = None;
                    for edge in edges {
                        if edge.to != next {
                            continue;
                        }
                        let weight = edge.strength * edge.confidence;
                        if best.is_none_or(|b| weight > b.strength * b.confidence) {
                            best = Some(edge);
                        }
                    }
                    let edge = best.ok_or_else(|| {
                        Error::InvalidGraphOperation(format!(
                            "no relation between consecutive path entities {entity_id} and {next}"
                        ))
                    })?;
                    Some(
                        self.store
                            .engine()
                            .get_relation(edge.relation)?
                            .ok_or_else(|| Error::RelationNotFound(edge.relation.to_string()))?,
                    )
                }
                None => None,
            };

            segments.push(PathSegment { entity, relation_to_next });
        }
        Ok(segments)
    }
}

/// Min-heap entry for Dijkstra; ordering is reversed on cost.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    cost: f64,
    hops: usize,
    node: EntityId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}
