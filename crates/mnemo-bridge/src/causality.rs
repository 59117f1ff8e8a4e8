//! Temporal causality detection over episodic events
//!
//! Scores ordered event pairs inside a sliding window on three axes:
//! temporal proximity, shared working context and code-signal patterns.
//! The blend is weighted toward code signals because "changed code, test
//! broke" is far stronger evidence than mere adjacency in time.

use crate::events::{EventId, EventRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Only pairs closer than this are considered at all
const PAIR_WINDOW_MS: i64 = 30 * 60 * 1000;

/// Links below this confidence are dropped
const MIN_CONFIDENCE: f64 = 0.3;

/// Context score when neither side names files; keeps the axis from
/// zeroing out for events that don't touch the filesystem
const CONTEXT_NO_FILES: f64 = 0.1;

const CONTEXT_SAME_SESSION: f64 = 0.5;
const CONTEXT_SAME_TASK: f64 = 0.3;
const CONTEXT_SAME_PHASE: f64 = 0.1;
const CONTEXT_CAP: f64 = 0.95;

/// Blend weights: temporal, context, code signal
const WEIGHT_TEMPORAL: f64 = 0.2;
const WEIGHT_CONTEXT: f64 = 0.3;
const WEIGHT_SIGNAL: f64 = 0.5;

/// Classification of a detected causal link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CausalityType {
    /// A code change followed by a test result
    CodeChangeEffect,

    /// High-confidence causal link
    DirectCause,

    /// Plausible contributing factor
    ContributingFactor,

    /// Events merely close in time and context
    TemporalCorrelation,
}

impl CausalityType {
    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            CausalityType::CodeChangeEffect => "code_change_effect",
            CausalityType::DirectCause => "direct_cause",
            CausalityType::ContributingFactor => "contributing_factor",
            CausalityType::TemporalCorrelation => "temporal_correlation",
        }
    }
}

/// A scored causal link between two events
#[derive(Debug, Clone, PartialEq)]
pub struct CausalLink {
    /// The earlier event
    pub cause: EventId,

    /// The later event
    pub effect: EventId,

    /// Blended confidence, in [0, 1]
    pub confidence: f64,

    pub causality_type: CausalityType,

    /// Per-axis scores kept for explainability
    pub temporal_score: f64,
    pub context_score: f64,
    pub code_signal_score: f64,
}

/// The causality detector
///
/// Stateless; `detect` may be called concurrently from multiple tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CausalityDetector;

impl CausalityDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect causal links among the given events
    ///
    /// Events are re-sorted by `(timestamp, id)` internally, so callers
    /// need not pre-sort. Each ordered pair within the 30-minute window
    /// is scored; pairs below the confidence floor are dropped.
    pub fn detect(&self, events: &[EventRecord]) -> Vec<CausalLink> {
        let mut sorted: Vec<&EventRecord> = events.iter().collect();
        sorted.sort_by_key(|e| (e.timestamp, e.id));

        let mut links = Vec::new();
        for i in 0..sorted.len() {
            for j in (i + 1)..sorted.len() {
                let cause = sorted[i];
                let effect = sorted[j];

                let gap_ms = effect.timestamp.as_millis() - cause.timestamp.as_millis();
                if gap_ms > PAIR_WINDOW_MS {
                    // Sorted input: every later effect is further away
                    break;
                }

                if let Some(link) = self.score_pair(cause, effect, gap_ms) {
                    links.push(link);
                }
            }
        }

        debug!("Detected {} causal links among {} events", links.len(), events.len());
        links
    }

    fn score_pair(&self, cause: &EventRecord, effect: &EventRecord, gap_ms: i64) -> Option<CausalLink> {
        let temporal_score = temporal_score(gap_ms);
        let context_score = context_score(cause, effect);
        let code_signal_score = code_signal_score(cause, effect);

        let confidence = WEIGHT_TEMPORAL * temporal_score
            + WEIGHT_CONTEXT * context_score
            + WEIGHT_SIGNAL * code_signal_score;

        if confidence < MIN_CONFIDENCE {
            return None;
        }

        let causality_type = if cause.is_code_change() && effect.is_test_result() {
            CausalityType::CodeChangeEffect
        } else if confidence > 0.7 {
            CausalityType::DirectCause
        } else if confidence > 0.5 {
            CausalityType::ContributingFactor
        } else {
            CausalityType::TemporalCorrelation
        };

        Some(CausalLink {
            cause: cause.id,
            effect: effect.id,
            confidence,
            causality_type,
            temporal_score,
            context_score,
            code_signal_score,
        })
    }
}

/// Temporal proximity score, tiered by gap
fn temporal_score(gap_ms: i64) -> f64 {
    if gap_ms <= 60 * 1000 {
        1.0
    } else if gap_ms <= 5 * 60 * 1000 {
        0.8
    } else if gap_ms <= 15 * 60 * 1000 {
        0.6
    } else {
        0.4
    }
}

/// Shared working-context score
///
/// File overlap (Jaccard) plus flat bonuses for shared session, task and
/// phase, capped below 1 so context alone never asserts causality.
fn context_score(cause: &EventRecord, effect: &EventRecord) -> f64 {
    let mut score = if cause.files.is_empty() || effect.files.is_empty() {
        CONTEXT_NO_FILES
    } else {
        let a: HashSet<&str> = cause.files.iter().map(String::as_str).collect();
        let b: HashSet<&str> = effect.files.iter().map(String::as_str).collect();
        let intersection = a.intersection(&b).count() as f64;
        let union = a.union(&b).count() as f64;
        intersection / union
    };

    if both_some_and_equal(&cause.session, &effect.session) {
        score += CONTEXT_SAME_SESSION;
    }
    if both_some_and_equal(&cause.task, &effect.task) {
        score += CONTEXT_SAME_TASK;
    }
    if both_some_and_equal(&cause.phase, &effect.phase) {
        score += CONTEXT_SAME_PHASE;
    }

    score.min(CONTEXT_CAP)
}

fn both_some_and_equal(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// Code-signal score for known cause/effect patterns
fn code_signal_score(cause: &EventRecord, effect: &EventRecord) -> f64 {
    if cause.is_code_change() {
        match effect.test_result {
            Some(false) => return 0.9,
            Some(true) => return 0.85,
            None => {}
        }
        if effect.is_error() {
            return 0.85;
        }
    }

    if cause.is_error() && effect.is_success() {
        return 0.7;
    }

    if let (Some(a), Some(b)) = (&cause.error_type, &effect.error_type) {
        if a == b {
            return 0.6;
        }
    }

    0.0
}
