//! Graph analytics over snapshots
//!
//! Centrality measures, clustering, community detection and the combined
//! analytics report. All algorithms run on an arena-indexed copy of the
//! snapshot: entity ids are mapped to dense `usize` indices once, and
//! every traversal works on `Vec`s instead of hash maps.
//!
//! Analytics treat the graph as undirected; parallel relations between a
//! pair collapse to one edge (strongest `strength x confidence` weight).

use crate::snapshot::GraphSnapshot;
use mnemo_core::EntityId;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Default resolution for community detection
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Maximum local-move sweeps before community detection gives up
const MAX_SWEEPS: usize = 100;

/// Importance blend weights: betweenness, degree, closeness
const IMPORTANCE_BETWEENNESS: f64 = 0.5;
const IMPORTANCE_DEGREE: f64 = 0.3;
const IMPORTANCE_CLOSENESS: f64 = 0.2;

/// Number of BFS sources used for the diameter estimate
const DIAMETER_SAMPLES: usize = 10;

/// A detected community
#[derive(Debug, Clone)]
pub struct Community {
    /// Stable index within the result set
    pub id: usize,

    /// Member entity ids, ascending
    pub members: Vec<EntityId>,

    /// Number of members
    pub size: usize,

    /// Collapsed edges with both endpoints inside the community
    pub internal_edges: usize,

    /// Collapsed edges with exactly one endpoint inside
    pub external_edges: usize,

    /// `internal_edges / (size choose 2)`; 0 for singletons
    pub density: f64,

    /// `internal / (internal + external)`; 0 when the community has no edges
    pub cohesion: f64,
}

/// Summary report over a whole snapshot
#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub entity_count: usize,
    pub relation_count: usize,

    /// Collapsed undirected edge count
    pub edge_count: usize,

    /// `2E / (n(n-1))` over collapsed edges
    pub density: f64,

    pub average_degree: f64,
    pub average_clustering: f64,

    /// Longest shortest path seen from the sampled BFS sources
    pub approximate_diameter: usize,

    /// Entity ids with no relations at all, ascending
    pub isolated_entities: Vec<EntityId>,

    /// Top entities by composite importance, descending
    pub top_entities: Vec<(EntityId, f64)>,

    pub communities: Vec<Community>,
}

/// Analytics engine over one snapshot
pub struct GraphAnalyzer {
    /// Dense index -> entity id
    nodes: Vec<EntityId>,

    /// Entity id -> dense index
    index: HashMap<EntityId, usize>,

    /// Undirected adjacency, deduplicated, sorted
    adj: Vec<Vec<usize>>,

    /// Collapsed edge weights aligned with `adj`
    weights: Vec<Vec<f64>>,

    /// Number of relations before collapsing
    relation_count: usize,
}

impl GraphAnalyzer {
    /// Build the arena from a snapshot
    pub fn new(snapshot: &GraphSnapshot) -> Self {
        let nodes = snapshot.sorted_entity_ids();
        let index: HashMap<EntityId, usize> =
            nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut weights: Vec<Vec<f64>> = vec![Vec::new(); nodes.len()];
        for ((a, b), w) in snapshot.collapsed_undirected_edges() {
            let (ia, ib) = (index[&a], index[&b]);
            adj[ia].push(ib);
            weights[ia].push(w);
            adj[ib].push(ia);
            weights[ib].push(w);
        }
        for i in 0..nodes.len() {
            let mut paired: Vec<(usize, f64)> =
                adj[i].iter().copied().zip(weights[i].iter().copied()).collect();
            paired.sort_by(|x, y| x.0.cmp(&y.0));
            adj[i] = paired.iter().map(|p| p.0).collect();
            weights[i] = paired.iter().map(|p| p.1).collect();
        }

        Self {
            nodes,
            index,
            adj,
            weights,
            relation_count: snapshot.relation_count(),
        }
    }

    /// Number of nodes in the arena
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of collapsed undirected edges
    pub fn edge_count(&self) -> usize {
        self.adj.iter().map(|n| n.len()).sum::<usize>() / 2
    }

    // ========== Centrality ==========

    /// Betweenness centrality (Brandes), normalized by `2/((n-1)(n-2))`
    ///
    /// Graphs with two or fewer nodes have no intermediate positions, so
    /// every score is 0.
    pub fn betweenness_centrality(&self) -> HashMap<EntityId, f64> {
        let n = self.nodes.len();
        let mut centrality = vec![0.0f64; n];

        if n > 2 {
            let mut stack: Vec<usize> = Vec::with_capacity(n);
            let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0f64; n];
            let mut dist = vec![-1i64; n];
            let mut delta = vec![0.0f64; n];

            for s in 0..n {
                stack.clear();
                for v in 0..n {
                    preds[v].clear();
                    sigma[v] = 0.0;
                    dist[v] = -1;
                    delta[v] = 0.0;
                }
                sigma[s] = 1.0;
                dist[s] = 0;

                let mut queue = VecDeque::new();
                queue.push_back(s);
                while let Some(v) = queue.pop_front() {
                    stack.push(v);
                    for &w in &self.adj[v] {
                        if dist[w] < 0 {
                            dist[w] = dist[v] + 1;
                            queue.push_back(w);
                        }
                        if dist[w] == dist[v] + 1 {
                            sigma[w] += sigma[v];
                            preds[w].push(v);
                        }
                    }
                }

                while let Some(w) = stack.pop() {
                    for &v in &preds[w] {
                        delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
                    }
                    if w != s {
                        centrality[w] += delta[w];
                    }
                }
            }

            // Undirected accumulation counts each pair twice, so the
            // pair-count and normalization factors combine to 1/((n-1)(n-2)).
            let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
            for c in centrality.iter_mut() {
                *c *= scale;
            }
        }

        self.to_entity_map(centrality)
    }

    /// Closeness centrality: `reachable / distance_sum`
    ///
    /// Isolated nodes score 0.
    pub fn closeness_centrality(&self) -> HashMap<EntityId, f64> {
        let n = self.nodes.len();
        let mut scores = vec![0.0f64; n];

        for s in 0..n {
            let dist = self.bfs_distances(s);
            let mut reachable = 0u64;
            let mut total = 0u64;
            for (v, &d) in dist.iter().enumerate() {
                if v != s && d >= 0 {
                    reachable += 1;
                    total += d as u64;
                }
            }
            if total > 0 {
                scores[s] = reachable as f64 / total as f64;
            }
        }

        self.to_entity_map(scores)
    }

    /// Degree centrality: `degree / (n - 1)` over collapsed edges
    pub fn degree_centrality(&self) -> HashMap<EntityId, f64> {
        let n = self.nodes.len();
        let scores = if n <= 1 {
            vec![0.0; n]
        } else {
            self.adj
                .iter()
                .map(|neighbors| neighbors.len() as f64 / (n - 1) as f64)
                .collect()
        };
        self.to_entity_map(scores)
    }

    /// Local clustering coefficient per node
    ///
    /// Fraction of a node's neighbor pairs that are themselves connected;
    /// nodes with fewer than two neighbors score 0.
    pub fn clustering_coefficients(&self) -> HashMap<EntityId, f64> {
        let neighbor_sets: Vec<HashSet<usize>> = self
            .adj
            .iter()
            .map(|neighbors| neighbors.iter().copied().collect())
            .collect();

        let mut scores = vec![0.0f64; self.nodes.len()];
        for (v, neighbors) in self.adj.iter().enumerate() {
            let k = neighbors.len();
            if k < 2 {
                continue;
            }
            let mut links = 0usize;
            for i in 0..k {
                for j in (i + 1)..k {
                    if neighbor_sets[neighbors[i]].contains(&neighbors[j]) {
                        links += 1;
                    }
                }
            }
            scores[v] = 2.0 * links as f64 / (k as f64 * (k - 1) as f64);
        }

        self.to_entity_map(scores)
    }

    /// Composite importance: `0.5 betweenness + 0.3 degree + 0.2 closeness`
    pub fn importance_scores(&self) -> HashMap<EntityId, f64> {
        let betweenness = self.betweenness_centrality();
        let degree = self.degree_centrality();
        let closeness = self.closeness_centrality();

        self.nodes
            .iter()
            .map(|id| {
                let score = IMPORTANCE_BETWEENNESS * betweenness[id]
                    + IMPORTANCE_DEGREE * degree[id]
                    + IMPORTANCE_CLOSENESS * closeness[id];
                (*id, score)
            })
            .collect()
    }

    // ========== Community Detection ==========

    /// Detect communities by modularity-driven local moves
    ///
    /// Every node starts in its own community; nodes are repeatedly moved
    /// (in ascending entity-id order, for determinism) to the neighboring
    /// community with the best positive modularity gain, until a full
    /// sweep makes no move or the sweep cap is hit. Higher `resolution`
    /// favors more, smaller communities.
    pub fn detect_communities(&self, resolution: f64) -> Vec<Community> {
        let n = self.nodes.len();
        if n == 0 {
            return Vec::new();
        }

        let two_m: f64 = self
            .weights
            .iter()
            .map(|ws| ws.iter().sum::<f64>())
            .sum::<f64>();
        let node_weight: Vec<f64> = self.weights.iter().map(|ws| ws.iter().sum()).collect();

        let mut community: Vec<usize> = (0..n).collect();
        let mut community_weight: Vec<f64> = node_weight.clone();

        if two_m > 0.0 {
            for sweep in 0..MAX_SWEEPS {
                let mut moved = false;

                for v in 0..n {
                    let current = community[v];
                    community_weight[current] -= node_weight[v];

                    // Weight from v into each neighboring community
                    let mut link_weight: HashMap<usize, f64> = HashMap::new();
                    for (&w, &weight) in self.adj[v].iter().zip(self.weights[v].iter()) {
                        *link_weight.entry(community[w]).or_insert(0.0) += weight;
                    }

                    let gain = |c: usize| {
                        let links = link_weight.get(&c).copied().unwrap_or(0.0);
                        links - resolution * node_weight[v] * community_weight[c] / two_m
                    };

                    let mut best = current;
                    let mut best_gain = gain(current);
                    let mut candidates: Vec<usize> = link_weight.keys().copied().collect();
                    candidates.sort_unstable();
                    for c in candidates {
                        let g = gain(c);
                        if g > best_gain + 1e-12 {
                            best = c;
                            best_gain = g;
                        }
                    }

                    community_weight[best] += node_weight[v];
                    if best != current {
                        community[v] = best;
                        moved = true;
                    }
                }

                if !moved {
                    debug!("Community detection converged after {} sweeps", sweep + 1);
                    break;
                }
            }
        }

        self.build_communities(&community)
    }

    fn build_communities(&self, assignment: &[usize]) -> Vec<Community> {
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (v, &c) in assignment.iter().enumerate() {
            groups.entry(c).or_default().push(v);
        }

        let mut keys: Vec<usize> = groups.keys().copied().collect();
        keys.sort_unstable();

        let mut communities = Vec::with_capacity(keys.len());
        for (id, key) in keys.into_iter().enumerate() {
            let nodes = &groups[&key];
            let node_set: HashSet<usize> = nodes.iter().copied().collect();

            let mut internal = 0usize;
            let mut external = 0usize;
            for &v in nodes {
                for &w in &self.adj[v] {
                    if node_set.contains(&w) {
                        internal += 1; // counted from both ends
                    } else {
                        external += 1;
                    }
                }
            }
            let internal = internal / 2;

            let size = nodes.len();
            let possible = size * size.saturating_sub(1) / 2;
            let density = if possible > 0 {
                internal as f64 / possible as f64
            } else {
                0.0
            };
            let total_edges = internal + external;
            let cohesion = if total_edges > 0 {
                internal as f64 / total_edges as f64
            } else {
                0.0
            };

            let mut members: Vec<EntityId> = nodes.iter().map(|&v| self.nodes[v]).collect();
            members.sort();

            communities.push(Community {
                id,
                members,
                size,
                internal_edges: internal,
                external_edges: external,
                density,
                cohesion,
            });
        }
        communities
    }

    // ========== Whole-Graph Measures ==========

    /// Estimate the diameter by running BFS from a sample of sources
    ///
    /// A lower bound on the true diameter; exact when the sample covers
    /// the graph.
    pub fn approximate_diameter(&self) -> usize {
        let n = self.nodes.len();
        let samples = n.min(DIAMETER_SAMPLES);

        let mut diameter = 0usize;
        for s in 0..samples {
            for &d in &self.bfs_distances(s) {
                if d > 0 {
                    diameter = diameter.max(d as usize);
                }
            }
        }
        diameter
    }

    /// Run all analytics and assemble a report
    pub fn compute_all_analytics(&self, top_k: usize) -> AnalyticsReport {
        let n = self.nodes.len();
        let edge_count = self.edge_count();

        let density = if n > 1 {
            2.0 * edge_count as f64 / (n as f64 * (n - 1) as f64)
        } else {
            0.0
        };
        let average_degree = if n > 0 {
            2.0 * edge_count as f64 / n as f64
        } else {
            0.0
        };

        let clustering = self.clustering_coefficients();
        let average_clustering = if n > 0 {
            clustering.values().sum::<f64>() / n as f64
        } else {
            0.0
        };

        // `nodes` is sorted, so the isolated list comes out sorted too
        let isolated_entities: Vec<EntityId> = self
            .adj
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_empty())
            .map(|(i, _)| self.nodes[i])
            .collect();

        let mut top_entities: Vec<(EntityId, f64)> = self.importance_scores().into_iter().collect();
        top_entities.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        top_entities.truncate(top_k);

        AnalyticsReport {
            entity_count: n,
            relation_count: self.relation_count,
            edge_count,
            density,
            average_degree,
            average_clustering,
            approximate_diameter: self.approximate_diameter(),
            isolated_entities,
            top_entities,
            communities: self.detect_communities(DEFAULT_RESOLUTION),
        }
    }

    // ========== Helpers ==========

    fn bfs_distances(&self, source: usize) -> Vec<i64> {
        let mut dist = vec![-1i64; self.nodes.len()];
        dist[source] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            for &w in &self.adj[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
            }
        }
        dist
    }

    fn to_entity_map(&self, scores: Vec<f64>) -> HashMap<EntityId, f64> {
        self.nodes.iter().copied().zip(scores).collect()
    }

    /// Dense index for an entity, if present
    pub fn index_of(&self, entity_id: EntityId) -> Option<usize> {
        self.index.get(&entity_id).copied()
    }
}
