//! Core graph record types
//!
//! Defines the closed entity/relation type enums and the entity, relation
//! and observation records they classify. Row-to-model mapping at the
//! storage boundary goes through the exhaustive `as_str`/`parse` pairs
//! here; there is no dynamic dispatch on type names.

use crate::error::{Error, Result};
use crate::id::{EntityId, ObservationId, ProjectId, RelationId};
use crate::metadata::Metadata;
use crate::temporal::{Timestamp, ValidityWindow};
use serde::{Deserialize, Serialize};

/// Direction of a relation traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Relations leaving the entity (`from == entity`)
    Outgoing,
    /// Relations arriving at the entity (`to == entity`)
    Incoming,
    /// Both directions
    Both,
}

impl Direction {
    /// Returns the opposite direction
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Both => Direction::Both,
        }
    }
}

/// The closed set of entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Project,
    Phase,
    Task,
    File,
    Function,
    Concept,
    Component,
    Person,
    Decision,
    Pattern,
    Agent,
    Skill,
}

impl EntityType {
    /// Stable storage name for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::Phase => "phase",
            EntityType::Task => "task",
            EntityType::File => "file",
            EntityType::Function => "function",
            EntityType::Concept => "concept",
            EntityType::Component => "component",
            EntityType::Person => "person",
            EntityType::Decision => "decision",
            EntityType::Pattern => "pattern",
            EntityType::Agent => "agent",
            EntityType::Skill => "skill",
        }
    }

    /// Parse a storage name back into an entity type
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "project" => Ok(EntityType::Project),
            "phase" => Ok(EntityType::Phase),
            "task" => Ok(EntityType::Task),
            "file" => Ok(EntityType::File),
            "function" => Ok(EntityType::Function),
            "concept" => Ok(EntityType::Concept),
            "component" => Ok(EntityType::Component),
            "person" => Ok(EntityType::Person),
            "decision" => Ok(EntityType::Decision),
            "pattern" => Ok(EntityType::Pattern),
            "agent" => Ok(EntityType::Agent),
            "skill" => Ok(EntityType::Skill),
            other => Err(Error::Validation(format!("unknown entity type '{other}'"))),
        }
    }

    /// All entity types, in declaration order
    pub fn all() -> &'static [EntityType] {
        &[
            EntityType::Project,
            EntityType::Phase,
            EntityType::Task,
            EntityType::File,
            EntityType::Function,
            EntityType::Concept,
            EntityType::Component,
            EntityType::Person,
            EntityType::Decision,
            EntityType::Pattern,
            EntityType::Agent,
            EntityType::Skill,
        ]
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of relation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    Contains,
    DependsOn,
    Implements,
    Tests,
    CausedBy,
    ResultedIn,
    RelatesTo,
    ActiveIn,
    AssignedTo,
    HasSkill,
}

impl RelationType {
    /// Stable storage name for this relation type
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Contains => "contains",
            RelationType::DependsOn => "depends_on",
            RelationType::Implements => "implements",
            RelationType::Tests => "tests",
            RelationType::CausedBy => "caused_by",
            RelationType::ResultedIn => "resulted_in",
            RelationType::RelatesTo => "relates_to",
            RelationType::ActiveIn => "active_in",
            RelationType::AssignedTo => "assigned_to",
            RelationType::HasSkill => "has_skill",
        }
    }

    /// Parse a storage name back into a relation type
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "contains" => Ok(RelationType::Contains),
            "depends_on" => Ok(RelationType::DependsOn),
            "implements" => Ok(RelationType::Implements),
            "tests" => Ok(RelationType::Tests),
            "caused_by" => Ok(RelationType::CausedBy),
            "resulted_in" => Ok(RelationType::ResultedIn),
            "relates_to" => Ok(RelationType::RelatesTo),
            "active_in" => Ok(RelationType::ActiveIn),
            "assigned_to" => Ok(RelationType::AssignedTo),
            "has_skill" => Ok(RelationType::HasSkill),
            other => Err(Error::Validation(format!("unknown relation type '{other}'"))),
        }
    }

    /// Whether this relation type asserts causality (cause -> effect or back)
    pub fn is_causal(&self) -> bool {
        matches!(self, RelationType::CausedBy | RelationType::ResultedIn)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entity in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Store-assigned identifier
    pub id: EntityId,

    /// Entity name; `(name, entity_type, project)` is the unique natural key
    pub name: String,

    /// Entity kind
    pub entity_type: EntityType,

    /// Optional project scope
    pub project: Option<ProjectId>,

    /// When this entity was created
    pub created_at: Timestamp,

    /// When this entity was last updated
    pub updated_at: Timestamp,

    /// Additional metadata
    pub metadata: Metadata,
}

impl Entity {
    /// Create a new entity record
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        entity_type: EntityType,
        project: Option<ProjectId>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            name: name.into(),
            entity_type,
            project,
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
        }
    }

    /// Builder: attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate the record before insert
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("entity name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// A directed relation between two entities
///
/// Immutable once created: there is no update path, only deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Store-assigned identifier
    pub id: RelationId,

    /// Source entity
    pub from: EntityId,

    /// Target entity
    pub to: EntityId,

    /// Relation kind
    pub rel_type: RelationType,

    /// Strength of the relation, in [0, 1]
    pub strength: f64,

    /// Confidence in the relation, in [0, 1]
    pub confidence: f64,

    /// When this relation was created
    pub created_at: Timestamp,

    /// Optional validity window
    pub validity: Option<ValidityWindow>,

    /// Additional metadata
    pub metadata: Metadata,
}

impl Relation {
    /// Create a new relation record with full strength and confidence
    pub fn new(id: RelationId, from: EntityId, to: EntityId, rel_type: RelationType) -> Self {
        Self {
            id,
            from,
            to,
            rel_type,
            strength: 1.0,
            confidence: 1.0,
            created_at: Timestamp::now(),
            validity: None,
            metadata: Metadata::new(),
        }
    }

    /// Builder: set strength and confidence
    pub fn with_weights(mut self, strength: f64, confidence: f64) -> Self {
        self.strength = strength;
        self.confidence = confidence;
        self
    }

    /// Builder: attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builder: set a validity window
    pub fn with_validity(mut self, validity: ValidityWindow) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Get the entity at the other end of the relation
    pub fn other(&self, entity_id: EntityId) -> Option<EntityId> {
        if self.from == entity_id {
            Some(self.to)
        } else if self.to == entity_id {
            Some(self.from)
        } else {
            None
        }
    }

    /// Check if this relation touches an entity
    pub fn connects(&self, entity_id: EntityId) -> bool {
        self.from == entity_id || self.to == entity_id
    }

    /// Undirected analytics weight: strength x confidence
    pub fn weight(&self) -> f64 {
        self.strength * self.confidence
    }

    /// Validate the record before insert
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(Error::Validation(format!(
                "relation strength {} outside [0, 1]",
                self.strength
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Validation(format!(
                "relation confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.from == self.to {
            return Err(Error::Validation("relation endpoints must differ".to_string()));
        }
        Ok(())
    }
}

/// The kind of an observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationType {
    /// Free-form fact about the entity
    Fact,
    /// Behavior seen at runtime
    Behavior,
    /// Decision context
    Context,
    /// Measured outcome
    Outcome,
    /// Custom observation kind
    Custom(String),
}

impl ObservationType {
    /// Stable storage name for this observation type
    pub fn as_str(&self) -> &str {
        match self {
            ObservationType::Fact => "fact",
            ObservationType::Behavior => "behavior",
            ObservationType::Context => "context",
            ObservationType::Outcome => "outcome",
            ObservationType::Custom(s) => s,
        }
    }
}

/// An append-only observation attached to an entity
///
/// Observations are never deleted; newer observations may supersede
/// older ones via the `superseded_by` pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Store-assigned identifier
    pub id: ObservationId,

    /// Entity this observation is about
    pub entity: EntityId,

    /// Free-text content
    pub content: String,

    /// Observation kind
    pub observation_type: ObservationType,

    /// Confidence in the observation, in [0, 1]
    pub confidence: f64,

    /// Where the observation came from
    pub source: String,

    /// When the observation was made
    pub observed_at: Timestamp,

    /// Newer observation that supersedes this one, if any
    pub superseded_by: Option<ObservationId>,
}

impl Observation {
    /// Create a new observation record
    pub fn new(
        id: ObservationId,
        entity: EntityId,
        content: impl Into<String>,
        observation_type: ObservationType,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id,
            entity,
            content: content.into(),
            observation_type,
            confidence: 1.0,
            source: source.into(),
            observed_at: Timestamp::now(),
            superseded_by: None,
        }
    }

    /// Builder: set confidence
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Whether this observation is still current
    pub fn is_current(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// Validate the record before insert
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Validation(format!(
                "observation confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{IdGenerator, StoreId};

    #[test]
    fn test_direction_reverse() {
        assert_eq!(Direction::Outgoing.reverse(), Direction::Incoming);
        assert_eq!(Direction::Incoming.reverse(), Direction::Outgoing);
        assert_eq!(Direction::Both.reverse(), Direction::Both);
    }

    #[test]
    fn test_entity_type_roundtrip() {
        for ty in EntityType::all() {
            assert_eq!(EntityType::parse(ty.as_str()).unwrap(), *ty);
        }
        assert!(EntityType::parse("widget").is_err());
    }

    #[test]
    fn test_relation_type_roundtrip() {
        for s in [
            "contains",
            "depends_on",
            "implements",
            "tests",
            "caused_by",
            "resulted_in",
            "relates_to",
            "active_in",
            "assigned_to",
            "has_skill",
        ] {
            assert_eq!(RelationType::parse(s).unwrap().as_str(), s);
        }
        assert!(RelationType::parse("near").is_err());
    }

    #[test]
    fn test_entity_validation() {
        let ids = IdGenerator::new();
        let entity = Entity::new(ids.next_entity_id(), "auth-service", EntityType::Component, None);
        assert!(entity.validate().is_ok());

        let blank = Entity::new(ids.next_entity_id(), "   ", EntityType::Component, None);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_relation_weight_and_validation() {
        let ids = IdGenerator::new();
        let a = ids.next_entity_id();
        let b = ids.next_entity_id();

        let rel = Relation::new(ids.next_relation_id(), a, b, RelationType::DependsOn)
            .with_weights(0.8, 0.5);
        assert!((rel.weight() - 0.4).abs() < 1e-12);
        assert!(rel.validate().is_ok());

        let bad = Relation::new(ids.next_relation_id(), a, b, RelationType::DependsOn)
            .with_weights(1.5, 0.5);
        assert!(bad.validate().is_err());

        let self_loop = Relation::new(ids.next_relation_id(), a, a, RelationType::RelatesTo);
        assert!(self_loop.validate().is_err());
    }

    #[test]
    fn test_relation_other() {
        let a = EntityId::from_internal(1);
        let b = EntityId::from_internal(2);
        let c = EntityId::from_internal(3);

        let rel = Relation::new(RelationId::from_internal(1), a, b, RelationType::Contains);
        assert_eq!(rel.other(a), Some(b));
        assert_eq!(rel.other(b), Some(a));
        assert_eq!(rel.other(c), None);
        assert!(rel.connects(a));
        assert!(!rel.connects(c));
    }

    #[test]
    fn test_observation_supersession_flag() {
        let ids = IdGenerator::new();
        let entity = ids.next_entity_id();

        let mut obs = Observation::new(
            ids.next_observation_id(),
            entity,
            "uses retry with backoff",
            ObservationType::Behavior,
            "trace-analyzer",
        );
        assert!(obs.is_current());

        obs.superseded_by = Some(ids.next_observation_id());
        assert!(!obs.is_current());
    }

    #[test]
    fn test_observation_confidence_validation() {
        let ids = IdGenerator::new();
        let obs = Observation::new(
            ids.next_observation_id(),
            ids.next_entity_id(),
            "x",
            ObservationType::Fact,
            "test",
        )
        .with_confidence(1.2);
        assert!(obs.validate().is_err());
    }
}
