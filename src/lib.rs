//! Mnemograph - Knowledge-graph engine for AI agent memory
//!
//! This is the main library crate that re-exports all Mnemograph components.

pub use mnemo_bridge as bridge;
pub use mnemo_core as core;
pub use mnemo_graph as graph;
pub use mnemo_storage as storage;

// Re-export commonly used types
pub use mnemo_core::{
    Direction, Entity, EntityId, EntityType, Error, IdGenerator, Metadata, MetadataValue,
    Observation, ObservationId, ObservationType, ProjectId, Relation, RelationId, RelationType,
    Result, Timestamp, ValidityWindow,
};

pub use mnemo_graph::{
    AnalyticsReport, Community, GraphAnalyzer, GraphSnapshot, GraphStats, GraphStore, PathFinder,
    PathSegment,
};

pub use mnemo_bridge::{
    BridgeConfig, CausalLink, CausalityChain, CausalityDetector, CausalityType,
    EpisodicGraphBridge, EventId, EventOutcome, EventRecord, IntegrationReport,
};

pub use mnemo_storage::{StorageEngine, StorageOptions};
