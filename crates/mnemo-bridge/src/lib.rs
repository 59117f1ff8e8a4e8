//! Mnemograph Episodic Bridge
//!
//! Connects an external episodic event store to the knowledge graph:
//! events become entities, and scored causal links between them become
//! `resulted_in` relations carrying their scoring breakdown as metadata.
//!
//! # Modules
//!
//! - `events` - Event records, source and lock traits, in-process impls
//! - `causality` - Temporal/context/code-signal causality scoring
//! - `bridge` - Transactional integration and chain queries

pub mod bridge;
pub mod causality;
pub mod events;

pub use bridge::{
    entity_type_for_event, BridgeConfig, CausalityChain, ChainNode, EpisodicGraphBridge,
    IntegrationReport,
};
pub use causality::{CausalLink, CausalityDetector, CausalityType};
pub use events::{
    AdvisoryLock, EpisodeSource, EventId, EventOutcome, EventRecord, InMemoryEpisodeSource,
    LocalAdvisoryLock,
};
