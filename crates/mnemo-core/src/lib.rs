//! Mnemograph Core Library
//!
//! Fundamental types, identifiers and error handling for the Mnemograph
//! knowledge-graph engine.
//!
//! # Overview
//!
//! Mnemograph is a knowledge-graph engine for AI-agent memory: entities,
//! relations and observations with graph analytics, pathfinding and a
//! temporal causality synthesizer on top.
//!
//! # Modules
//!
//! - `types` - Entity/Relation/Observation records and closed type enums
//! - `error` - Error types and result alias
//! - `id` - Typed identifiers and generation
//! - `metadata` - String-keyed metadata maps
//! - `temporal` - Timestamps and validity windows

pub mod error;
pub mod id;
pub mod metadata;
pub mod temporal;
pub mod types;

pub use error::{Error, Result};
pub use id::{EntityId, IdGenerator, ObservationId, ProjectId, RelationId, StoreId};
pub use metadata::{Metadata, MetadataValue};
pub use temporal::{Timestamp, ValidityWindow};
pub use types::{
    Direction, Entity, EntityType, Observation, ObservationType, Relation, RelationType,
};
