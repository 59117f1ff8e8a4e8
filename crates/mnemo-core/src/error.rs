//! Error types for Mnemograph
//!
//! Provides the error hierarchy shared by all engine components.

use thiserror::Error;

/// The main error type for Mnemograph operations
#[derive(Error, Debug)]
pub enum Error {
    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    // ========== Not-Found Errors ==========
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Observation not found: {0}")]
    ObservationNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    // ========== Validation Errors ==========
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid graph operation: {0}")]
    InvalidGraphOperation(String),

    // ========== Constraint Errors ==========
    /// Natural-key race on `(name, type, project)`. Callers are expected to
    /// catch this, re-fetch and return the existing entity id.
    #[error("Unique key conflict: {entity_type} '{name}' already exists")]
    UniqueConflict { name: String, entity_type: String },

    // ========== Transaction Errors ==========
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    // ========== Connectivity Errors ==========
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    // ========== Serialization Errors ==========
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ========== IO Errors ==========
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Mnemograph operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if the caller may safely retry the failed operation later.
    ///
    /// Retries are never performed inside the engine; the classification is
    /// surfaced so callers can decide.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Connectivity(_) | Error::LockTimeout(_))
    }

    /// Returns true if this error indicates a missing entity/relation/event
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::EntityNotFound(_)
                | Error::RelationNotFound(_)
                | Error::ObservationNotFound(_)
                | Error::EventNotFound(_)
        )
    }

    /// Returns true if this error is a unique-key conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::UniqueConflict { .. })
    }

    /// Returns true if this error indicates data corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::DataCorruption(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EntityNotFound("42".to_string());
        assert_eq!(err.to_string(), "Entity not found: 42");
    }

    #[test]
    fn test_error_retriable() {
        assert!(Error::Connectivity("backend unreachable".to_string()).is_retriable());
        assert!(Error::LockTimeout("integration:project-1".to_string()).is_retriable());
        assert!(!Error::Validation("strength out of range".to_string()).is_retriable());
        assert!(!Error::EntityNotFound("42".to_string()).is_retriable());
    }

    #[test]
    fn test_error_conflict() {
        let err = Error::UniqueConflict {
            name: "auth-service".to_string(),
            entity_type: "Component".to_string(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_not_found() {
        assert!(Error::RelationNotFound("7".to_string()).is_not_found());
        assert!(!Error::Storage("disk full".to_string()).is_not_found());
    }
}
