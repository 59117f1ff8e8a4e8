//! Mnemograph Graph Layer
//!
//! The graph store plus the read-side machinery built on top of it:
//! point-in-time snapshots, centrality/community analytics and
//! pathfinding.
//!
//! # Modules
//!
//! - `store` - Entity/relation/observation CRUD with upsert semantics
//! - `snapshot` - Point-in-time subgraph copies
//! - `analytics` - Centrality, clustering, communities, reports
//! - `paths` - Shortest/all/weighted paths with adjacency caching

pub mod analytics;
pub mod paths;
pub mod snapshot;
pub mod store;

pub use analytics::{AnalyticsReport, Community, GraphAnalyzer, DEFAULT_RESOLUTION};
pub use paths::{edge_cost, PathFinder, PathSegment};
pub use snapshot::GraphSnapshot;
pub use store::{GraphStats, GraphStore, GraphTransaction};
