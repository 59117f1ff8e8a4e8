//! Mnemograph Storage Layer
//!
//! RocksDB-backed persistence for the knowledge graph: entity, relation
//! and observation rows in dedicated column families, plus natural-key,
//! adjacency and project-membership indices.
//!
//! All multi-row writes go through `WriteBatch`, so both single
//! operations and committed transactions are atomic.
//!
//! # Modules
//!
//! - `engine` - Column families, CRUD and batch application
//! - `keys` - Binary key encoding
//! - `options` - Tuning knobs
//! - `transaction` - Buffered transactions with pending-aware reads

pub mod engine;
pub mod keys;
pub mod options;
pub mod transaction;

pub use engine::{StorageEngine, COLUMN_FAMILIES};
pub use keys::KeyBuilder;
pub use options::StorageOptions;
pub use transaction::{Transaction, TransactionOperation, TransactionState};
