//! Episodic event records and the seams to external systems
//!
//! Events live in an external episodic store; the bridge only reads them
//! and writes back integration marks. Both the event source and the
//! advisory lock are traits so tests and embedders can swap backends.

use async_trait::async_trait;
use mnemo_core::{ProjectId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

/// Identifier of an episodic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh event id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying uuid
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of an episodic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOutcome {
    Success,
    Failure,
    Unknown,
}

/// One episodic event as recorded by the agent runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,

    /// When the event happened
    pub timestamp: Timestamp,

    /// Event kind, e.g. `code_change`, `test_run`, `error`
    pub event_type: String,

    pub outcome: EventOutcome,

    /// Files touched by the event
    pub files: Vec<String>,

    /// Working-context identifiers, when known
    pub session: Option<String>,
    pub task: Option<String>,
    pub phase: Option<String>,

    /// For `test_run` events: whether the tests passed
    pub test_result: Option<bool>,

    /// For `error` events: the error classification
    pub error_type: Option<String>,

    pub project: Option<ProjectId>,
}

impl EventRecord {
    /// Create an event with the given kind and time; everything else empty
    pub fn new(event_type: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            event_type: event_type.into(),
            outcome: EventOutcome::Unknown,
            files: Vec::new(),
            session: None,
            task: None,
            phase: None,
            test_result: None,
            error_type: None,
            project: None,
        }
    }

    /// Builder: set the outcome
    pub fn with_outcome(mut self, outcome: EventOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Builder: set touched files
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    /// Builder: set the session
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Builder: set the task
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Builder: set the phase
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Builder: set the test result (also marks the outcome)
    pub fn with_test_result(mut self, passed: bool) -> Self {
        self.test_result = Some(passed);
        self.outcome = if passed {
            EventOutcome::Success
        } else {
            EventOutcome::Failure
        };
        self
    }

    /// Builder: set the error type
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self.outcome = EventOutcome::Failure;
        self
    }

    /// Builder: set the project scope
    pub fn with_project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }

    /// Whether this event is a code change
    pub fn is_code_change(&self) -> bool {
        self.event_type == "code_change"
    }

    /// Whether this event carries a test result
    pub fn is_test_result(&self) -> bool {
        self.test_result.is_some()
    }

    /// Whether this event is an error
    pub fn is_error(&self) -> bool {
        self.event_type == "error"
    }

    /// Whether this event ended in success
    pub fn is_success(&self) -> bool {
        self.outcome == EventOutcome::Success
    }
}

/// Read access to the external episodic store
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    /// Fetch specific events by id; ids with no event are skipped
    async fn get_events(&self, ids: &[EventId]) -> Result<Vec<EventRecord>>;

    /// Fetch events not yet integrated into the graph, oldest first
    async fn get_unintegrated_events(
        &self,
        project: Option<ProjectId>,
        limit: usize,
    ) -> Result<Vec<EventRecord>>;

    /// Mark events as integrated
    async fn mark_integrated(&self, ids: &[EventId]) -> Result<()>;
}

/// Per-project advisory lock guarding integration runs
#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Try to take the lock within `timeout`; false means someone else
    /// holds it
    async fn acquire(&self, key: &str, owner: &str, timeout: Duration) -> Result<bool>;

    /// Release a lock held by `owner`; releasing a lock you don't hold
    /// is a no-op
    async fn release(&self, key: &str, owner: &str) -> Result<()>;
}

// ========== In-Process Implementations ==========

/// In-memory episode source, for tests and embedded use
#[derive(Default)]
pub struct InMemoryEpisodeSource {
    inner: std::sync::Mutex<SourceState>,
}

#[derive(Default)]
struct SourceState {
    events: Vec<EventRecord>,
    integrated: HashSet<EventId>,
}

impl InMemoryEpisodeSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&self, event: EventRecord) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.events.push(event);
    }

    /// Whether an event has been marked integrated
    pub fn is_integrated(&self, id: EventId) -> bool {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.integrated.contains(&id)
    }
}

#[async_trait]
impl EpisodeSource for InMemoryEpisodeSource {
    async fn get_events(&self, ids: &[EventId]) -> Result<Vec<EventRecord>> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let wanted: HashSet<EventId> = ids.iter().copied().collect();
        Ok(state
            .events
            .iter()
            .filter(|e| wanted.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn get_unintegrated_events(
        &self,
        project: Option<ProjectId>,
        limit: usize,
    ) -> Result<Vec<EventRecord>> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut events: Vec<EventRecord> = state
            .events
            .iter()
            .filter(|e| !state.integrated.contains(&e.id))
            .filter(|e| project.is_none() || e.project == project)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.timestamp, e.id));
        events.truncate(limit);
        Ok(events)
    }

    async fn mark_integrated(&self, ids: &[EventId]) -> Result<()> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.integrated.extend(ids.iter().copied());
        Ok(())
    }
}

/// In-process advisory lock, for tests and single-node deployments
#[derive(Default)]
pub struct LocalAdvisoryLock {
    holders: tokio::sync::Mutex<HashMap<String, String>>,
}

/// Polling interval while waiting for a contended lock
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl LocalAdvisoryLock {
    /// Create an unheld lock registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdvisoryLock for LocalAdvisoryLock {
    async fn acquire(&self, key: &str, owner: &str, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut holders = self.holders.lock().await;
                match holders.get(key) {
                    None => {
                        holders.insert(key.to_string(), owner.to_string());
                        return Ok(true);
                    }
                    Some(holder) if holder == owner => return Ok(true),
                    Some(_) => {}
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release(&self, key: &str, owner: &str) -> Result<()> {
        let mut holders = self.holders.lock().await;
        if holders.get(key).is_some_and(|h| h == owner) {
            holders.remove(key);
        }
        Ok(())
    }
}
