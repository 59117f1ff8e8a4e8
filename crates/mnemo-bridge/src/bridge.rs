//! Episodic-to-graph integration
//!
//! Pulls events from the episodic source, runs causality detection, and
//! writes event entities plus causal relations into the graph in one
//! transaction. A per-project advisory lock keeps concurrent integration
//! runs from double-writing the same batch.

use crate::causality::{CausalLink, CausalityDetector};
use crate::events::{AdvisoryLock, EpisodeSource, EventId, EventRecord};
use mnemo_core::{
    Entity, EntityId, EntityType, Error, Metadata, ObservationType, ProjectId, RelationType,
    Result,
};
use mnemo_graph::GraphStore;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Map an episodic event type onto a graph entity type
///
/// The mapping is closed on purpose: an unknown event type means the
/// producer and the graph schema disagree, and silently guessing would
/// poison the graph. Integration aborts instead.
pub fn entity_type_for_event(event_type: &str) -> Result<EntityType> {
    match event_type {
        "code_change" => Ok(EntityType::File),
        "test_run" | "task_complete" => Ok(EntityType::Task),
        "error" => Ok(EntityType::Concept),
        "decision" => Ok(EntityType::Decision),
        "phase_change" => Ok(EntityType::Phase),
        "agent_message" => Ok(EntityType::Agent),
        "skill_invocation" => Ok(EntityType::Skill),
        "pattern_detected" => Ok(EntityType::Pattern),
        other => Err(Error::Validation(format!(
            "no entity mapping for event type '{other}'"
        ))),
    }
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum events pulled per integration run
    pub batch_limit: usize,

    /// How long to wait for the integration lock
    pub lock_timeout: Duration,

    /// Lock owner identity, unique per bridge instance
    pub owner: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            batch_limit: 100,
            lock_timeout: Duration::from_secs(10),
            owner: format!("bridge-{}", uuid::Uuid::new_v4()),
        }
    }
}

/// Outcome of one integration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationReport {
    pub events_processed: usize,
    pub entities_created: usize,
    pub relations_created: usize,
    pub links_detected: usize,
}

/// One hop in a causality chain
#[derive(Debug, Clone)]
pub struct ChainNode {
    pub entity: Entity,

    /// Hops from the chain root
    pub depth: usize,

    /// Strength of the causal relation on the final hop
    pub strength: f64,
}

/// Causes and effects around one event entity
#[derive(Debug, Clone)]
pub struct CausalityChain {
    pub root: Entity,
    pub causes: Vec<ChainNode>,
    pub effects: Vec<ChainNode>,
}

/// The episodic-graph bridge
pub struct EpisodicGraphBridge<S, L> {
    store: GraphStore,
    source: S,
    lock: L,
    detector: CausalityDetector,
    config: BridgeConfig,
}

impl<S: EpisodeSource, L: AdvisoryLock> EpisodicGraphBridge<S, L> {
    pub fn new(store: GraphStore, source: S, lock: L, config: BridgeConfig) -> Self {
        Self {
            store,
            source,
            lock,
            detector: CausalityDetector::new(),
            config,
        }
    }

    /// Integrate episodic events into the graph
    ///
    /// With `event_ids`, exactly those events are fetched; otherwise the
    /// next unintegrated batch for `project`, at most `limit` events
    /// (defaulting to the configured batch limit). All writes for the
    /// batch land in one transaction: a malformed event anywhere in the
    /// batch leaves the graph untouched. Events are marked integrated
    /// only after the transaction commits, so a crash between commit and
    /// mark re-integrates (idempotently) rather than losing events.
    pub async fn integrate_events_to_graph(
        &self,
        event_ids: Option<&[EventId]>,
        project: Option<ProjectId>,
        limit: Option<usize>,
    ) -> Result<IntegrationReport> {
        let lock_key = match project {
            Some(p) => format!("integration/{p}"),
            None => "integration/global".to_string(),
        };

        let acquired = self
            .lock
            .acquire(&lock_key, &self.config.owner, self.config.lock_timeout)
            .await?;
        if !acquired {
            return Err(Error::LockTimeout(lock_key));
        }

        let result = self.integrate_locked(event_ids, project, limit).await;

        if let Err(err) = self.lock.release(&lock_key, &self.config.owner).await {
            warn!("Failed to release integration lock {}: {}", lock_key, err);
        }
        result
    }

    async fn integrate_locked(
        &self,
        event_ids: Option<&[EventId]>,
        project: Option<ProjectId>,
        limit: Option<usize>,
    ) -> Result<IntegrationReport> {
        let events = match event_ids {
            Some(ids) => self.source.get_events(ids).await?,
            None => {
                self.source
                    .get_unintegrated_events(project, limit.unwrap_or(self.config.batch_limit))
                    .await?
            }
        };

        if events.is_empty() {
            debug!("No events to integrate");
            return Ok(IntegrationReport::default());
        }

        let links = self.detector.detect(&events);
        let mut report = IntegrationReport {
            events_processed: events.len(),
            links_detected: links.len(),
            ..Default::default()
        };

        let mut txn = self.store.begin_transaction();
        let mut entity_for_event: HashMap<EventId, EntityId> = HashMap::new();

        for event in &events {
            let entity_type = match entity_type_for_event(&event.event_type) {
                Ok(t) => t,
                Err(err) => {
                    warn!("Aborting integration batch: {}", err);
                    txn.rollback();
                    return Err(err);
                }
            };

            let name = format!("event/{}", event.id);
            let existed = txn.find_entity_id(entity_type, &name, event.project)?.is_some();
            let entity = txn.create_entity(
                &name,
                entity_type,
                event.project,
                event_metadata(event),
            )?;
            if !existed {
                report.entities_created += 1;
                txn.add_observation(
                    entity.id,
                    &observation_content(event),
                    ObservationType::Context,
                    1.0,
                    "episodic-bridge",
                )?;
            }
            entity_for_event.insert(event.id, entity.id);
        }

        for link in &links {
            let (Some(&cause), Some(&effect)) = (
                entity_for_event.get(&link.cause),
                entity_for_event.get(&link.effect),
            ) else {
                continue;
            };
            txn.create_relation(
                cause,
                effect,
                RelationType::ResultedIn,
                link.confidence,
                link.confidence,
                link_metadata(link),
            )?;
            report.relations_created += 1;
        }

        txn.commit()?;

        let integrated: Vec<EventId> = events.iter().map(|e| e.id).collect();
        self.source.mark_integrated(&integrated).await?;

        info!(
            "Integrated {} events: {} entities, {} causal relations",
            report.events_processed, report.entities_created, report.relations_created
        );
        Ok(report)
    }

    /// Walk the causal neighborhood of an event entity
    ///
    /// `project` must match the scope the event was integrated under:
    /// event entities live in their event's project bucket. Follows
    /// causal relations up to `max_depth` hops in each direction. Causes
    /// are entities whose causal relations point at the root
    /// (transitively); effects point away from it.
    pub fn query_event_causality_chain(
        &self,
        event_id: EventId,
        project: Option<ProjectId>,
        max_depth: usize,
    ) -> Result<CausalityChain> {
        let root = self
            .find_event_entity(event_id, project)?
            .ok_or_else(|| Error::EventNotFound(event_id.to_string()))?;

        let causes = self.walk_causal(root.id, max_depth, true)?;
        let effects = self.walk_causal(root.id, max_depth, false)?;

        Ok(CausalityChain { root, causes, effects })
    }

    fn find_event_entity(
        &self,
        event_id: EventId,
        project: Option<ProjectId>,
    ) -> Result<Option<Entity>> {
        let name = format!("event/{event_id}");
        // The original event type is not recorded on the query side, so
        // probe every type bucket; event names are unique across them.
        for entity_type in EntityType::all() {
            if let Some(entity) = self.store.find_entity(*entity_type, &name, project)? {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    fn walk_causal(
        &self,
        root: EntityId,
        max_depth: usize,
        toward_causes: bool,
    ) -> Result<Vec<ChainNode>> {
        use mnemo_core::Direction;
        use std::collections::{HashSet, VecDeque};

        let mut seen: HashSet<EntityId> = HashSet::from([root]);
        let mut queue: VecDeque<(EntityId, usize)> = VecDeque::from([(root, 0)]);
        let mut nodes = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (rel, other) in self.store.get_entity_relations(current, Direction::Both)? {
                if !rel.rel_type.is_causal() {
                    continue;
                }
                // ResultedIn points cause -> effect; CausedBy points
                // effect -> cause.
                let other_is_cause = match rel.rel_type {
                    RelationType::ResultedIn => rel.to == current,
                    RelationType::CausedBy => rel.from == current,
                    _ => continue,
                };
                if other_is_cause != toward_causes || !seen.insert(other.id) {
                    continue;
                }
                nodes.push(ChainNode {
                    entity: other.clone(),
                    depth: depth + 1,
                    strength: rel.strength,
                });
                queue.push_back((other.id, depth + 1));
            }
        }

        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.entity.id.cmp(&b.entity.id)));
        Ok(nodes)
    }
}

fn event_metadata(event: &EventRecord) -> Metadata {
    let mut meta = Metadata::new()
        .with("event_id", event.id.to_string())
        .with("event_type", event.event_type.as_str())
        .with("timestamp_ms", event.timestamp.as_millis());
    if let Some(session) = &event.session {
        meta.set("session", session.as_str());
    }
    if let Some(task) = &event.task {
        meta.set("task", task.as_str());
    }
    if let Some(error_type) = &event.error_type {
        meta.set("error_type", error_type.as_str());
    }
    meta
}

fn observation_content(event: &EventRecord) -> String {
    let mut content = format!("{} ({:?})", event.event_type, event.outcome);
    if !event.files.is_empty() {
        content.push_str(": ");
        content.push_str(&event.files.join(", "));
    }
    content
}

fn link_metadata(link: &CausalLink) -> Metadata {
    Metadata::new()
        .with("causality_type", link.causality_type.as_str())
        .with("temporal_score", link.temporal_score)
        .with("context_score", link.context_score)
        .with("code_signal_score", link.code_signal_score)
        .with("cause_event", link.cause.to_string())
        .with("effect_event", link.effect.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{InMemoryEpisodeSource, LocalAdvisoryLock};
    use mnemo_core::Timestamp;
    use mnemo_storage::StorageOptions;
    use tempfile::TempDir;

    const MINUTE_MS: i64 = 60 * 1000;

    fn create_test_bridge() -> (
        EpisodicGraphBridge<InMemoryEpisodeSource, LocalAdvisoryLock>,
        GraphStore,
        TempDir,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let store = GraphStore::open(StorageOptions::for_testing(temp_dir.path())).unwrap();
        let bridge = EpisodicGraphBridge::new(
            store.clone(),
            InMemoryEpisodeSource::new(),
            LocalAdvisoryLock::new(),
            BridgeConfig::default(),
        );
        (bridge, store, temp_dir)
    }

    fn change_and_failure() -> (EventRecord, EventRecord) {
        let change = EventRecord::new("code_change", Timestamp::from_millis(0)).with_session("s-1");
        let failed = EventRecord::new("test_run", Timestamp::from_millis(2 * MINUTE_MS))
            .with_session("s-1")
            .with_test_result(false);
        (change, failed)
    }

    #[tokio::test]
    async fn test_integration_creates_entities_and_relations() {
        let (bridge, store, _dir) = create_test_bridge();
        let (change, failed) = change_and_failure();
        bridge.source.push(change.clone());
        bridge.source.push(failed.clone());

        let report = bridge.integrate_events_to_graph(None, None, None).await.unwrap();
        assert_eq!(report.events_processed, 2);
        assert_eq!(report.entities_created, 2);
        assert_eq!(report.links_detected, 1);
        assert_eq!(report.relations_created, 1);

        let entity = store
            .find_entity(EntityType::File, &format!("event/{}", change.id), None)
            .unwrap()
            .unwrap();
        assert_eq!(
            entity.metadata.get("event_type").and_then(|v| v.as_str()),
            Some("code_change")
        );

        let snapshot = store.read_graph(None).unwrap();
        assert_eq!(snapshot.entity_count(), 2);
        assert_eq!(snapshot.relation_count(), 1);

        let rel = &snapshot.relations[0];
        assert_eq!(rel.rel_type, RelationType::ResultedIn);
        assert!((rel.strength - 0.79).abs() < 1e-9);
        assert_eq!(
            rel.metadata.get("causality_type").and_then(|v| v.as_str()),
            Some("code_change_effect")
        );

        assert!(bridge.source.is_integrated(change.id));
        assert!(bridge.source.is_integrated(failed.id));
    }

    #[tokio::test]
    async fn test_integration_is_idempotent() {
        let (bridge, store, _dir) = create_test_bridge();
        let (change, failed) = change_and_failure();
        let ids = [change.id, failed.id];
        bridge.source.push(change);
        bridge.source.push(failed);

        bridge.integrate_events_to_graph(None, None, None).await.unwrap();
        // Explicit re-run over the same ids upserts instead of duplicating
        let report = bridge
            .integrate_events_to_graph(Some(&ids), None, None)
            .await
            .unwrap();
        assert_eq!(report.entities_created, 0);

        assert_eq!(store.read_graph(None).unwrap().entity_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_event_rolls_back_whole_batch() {
        let (bridge, store, _dir) = create_test_bridge();

        for i in 0..5u32 {
            let event_type = if i == 2 { "telepathy" } else { "code_change" };
            bridge.source.push(
                EventRecord::new(event_type, Timestamp::from_millis(i as i64 * 1_000))
                    .with_session("s"),
            );
        }

        let err = bridge
            .integrate_events_to_graph(None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Nothing from the batch is visible, and nothing was marked
        assert_eq!(store.read_graph(None).unwrap().entity_count(), 0);
        let pending = bridge
            .source
            .get_unintegrated_events(None, 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 5);
    }

    #[tokio::test]
    async fn test_lock_contention_yields_retriable_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = GraphStore::open(StorageOptions::for_testing(temp_dir.path())).unwrap();

        let lock = LocalAdvisoryLock::new();
        lock.acquire("integration/global", "someone-else", Duration::from_millis(10))
            .await
            .unwrap();

        let bridge = EpisodicGraphBridge::new(
            store,
            InMemoryEpisodeSource::new(),
            lock,
            BridgeConfig {
                lock_timeout: Duration::from_millis(30),
                ..Default::default()
            },
        );

        let err = bridge
            .integrate_events_to_graph(None, None, None)
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert!(matches!(err, Error::LockTimeout(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_reports_zero() {
        let (bridge, _store, _dir) = create_test_bridge();
        let report = bridge.integrate_events_to_graph(None, None, None).await.unwrap();
        assert_eq!(report, IntegrationReport::default());
    }

    #[tokio::test]
    async fn test_explicit_limit_caps_the_batch() {
        let (bridge, store, _dir) = create_test_bridge();
        for i in 0..3i64 {
            bridge.source.push(
                EventRecord::new("code_change", Timestamp::from_millis(i * MINUTE_MS))
                    .with_session("s"),
            );
        }

        let report = bridge.integrate_events_to_graph(None, None, Some(1)).await.unwrap();
        assert_eq!(report.events_processed, 1);
        assert_eq!(store.read_graph(None).unwrap().entity_count(), 1);

        // The rest stays pending for the next run
        let report = bridge.integrate_events_to_graph(None, None, None).await.unwrap();
        assert_eq!(report.events_processed, 2);
    }

    #[tokio::test]
    async fn test_query_causality_chain() {
        let (bridge, _store, _dir) = create_test_bridge();

        let change = EventRecord::new("code_change", Timestamp::from_millis(0)).with_session("s");
        let failed = EventRecord::new("test_run", Timestamp::from_millis(MINUTE_MS))
            .with_session("s")
            .with_test_result(false);
        bridge.source.push(change.clone());
        bridge.source.push(failed.clone());
        bridge.integrate_events_to_graph(None, None, None).await.unwrap();

        let chain = bridge.query_event_causality_chain(failed.id, None, 3).unwrap();
        assert_eq!(chain.root.name, format!("event/{}", failed.id));
        assert_eq!(chain.causes.len(), 1);
        assert_eq!(chain.causes[0].entity.name, format!("event/{}", change.id));
        assert_eq!(chain.causes[0].depth, 1);
        assert!(chain.effects.is_empty());

        let chain = bridge.query_event_causality_chain(change.id, None, 3).unwrap();
        assert!(chain.causes.is_empty());
        assert_eq!(chain.effects.len(), 1);
    }

    #[tokio::test]
    async fn test_query_causality_chain_in_project_scope() {
        let (bridge, _store, _dir) = create_test_bridge();
        let orion = ProjectId::from_name("orion");

        let change = EventRecord::new("code_change", Timestamp::from_millis(0))
            .with_session("s")
            .with_project(orion);
        let failed = EventRecord::new("test_run", Timestamp::from_millis(MINUTE_MS))
            .with_session("s")
            .with_test_result(false)
            .with_project(orion);
        bridge.source.push(change.clone());
        bridge.source.push(failed.clone());
        bridge
            .integrate_events_to_graph(None, Some(orion), None)
            .await
            .unwrap();

        // Event entities live in their project's natural-key bucket
        let chain = bridge
            .query_event_causality_chain(failed.id, Some(orion), 3)
            .unwrap();
        assert_eq!(chain.root.name, format!("event/{}", failed.id));
        assert_eq!(chain.causes.len(), 1);
        assert_eq!(chain.causes[0].entity.name, format!("event/{}", change.id));

        // The unscoped bucket does not see them
        let err = bridge
            .query_event_causality_chain(failed.id, None, 3)
            .unwrap_err();
        assert!(matches!(err, Error::EventNotFound(_)));
    }

    #[tokio::test]
    async fn test_chain_for_unknown_event() {
        let (bridge, _store, _dir) = create_test_bridge();
        let err = bridge
            .query_event_causality_chain(EventId::new(), None, 3)
            .unwrap_err();
        assert!(matches!(err, Error::EventNotFound(_)));
    }

    #[test]
    fn test_event_type_mapping() {
        assert_eq!(entity_type_for_event("code_change").unwrap(), EntityType::File);
        assert_eq!(entity_type_for_event("test_run").unwrap(), EntityType::Task);
        assert_eq!(entity_type_for_event("error").unwrap(), EntityType::Concept);
        assert_eq!(entity_type_for_event("decision").unwrap(), EntityType::Decision);
        assert_eq!(entity_type_for_event("phase_change").unwrap(), EntityType::Phase);
        assert!(entity_type_for_event("telepathy").is_err());
    }
}
