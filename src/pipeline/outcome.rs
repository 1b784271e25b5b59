//! Per-record outcomes and the cycle summary they roll up into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Updated,
    SkippedEmptyGeneration,
    SkippedMissingFromCache,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeStatus::Updated => "updated",
            OutcomeStatus::SkippedEmptyGeneration => "skipped-empty-generation",
            OutcomeStatus::SkippedMissingFromCache => "skipped-missing-from-cache",
            OutcomeStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CycleOutcome {
    pub fn new(id: impl Into<String>, status: OutcomeStatus) -> Self {
        Self { id: id.into(), status, detail: None }
    }

    pub fn failed(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: OutcomeStatus::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Counters for one pass over the working set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of keys captured when the cycle started
    pub captured: usize,
    pub updated: usize,
    pub skipped_empty: usize,
    pub skipped_missing: usize,
    pub failed: usize,
    pub outcomes: Vec<CycleOutcome>,
}

impl CycleSummary {
    pub fn new(cycle_id: Uuid, captured: usize) -> Self {
        Self {
            cycle_id,
            started_at: Utc::now(),
            finished_at: None,
            captured,
            updated: 0,
            skipped_empty: 0,
            skipped_missing: 0,
            failed: 0,
            outcomes: Vec::with_capacity(captured),
        }
    }

    pub fn record(&mut self, outcome: CycleOutcome) {
        match outcome.status {
            OutcomeStatus::Updated => self.updated += 1,
            OutcomeStatus::SkippedEmptyGeneration => self.skipped_empty += 1,
            OutcomeStatus::SkippedMissingFromCache => self.skipped_missing += 1,
            OutcomeStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Records that reached a terminal outcome this cycle
    pub fn visited(&self) -> usize {
        self.updated + self.skipped_empty + self.skipped_missing + self.failed
    }

    /// True when every captured key produced an outcome.
    pub fn is_complete(&self) -> bool {
        self.visited() == self.captured
    }

    pub fn outcome_for(&self, id: &str) -> Option<&CycleOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "visited {}/{}, updated {}, skipped-empty {}, skipped-missing {}, failed {}",
            self.visited(),
            self.captured,
            self.updated,
            self.skipped_empty,
            self.skipped_missing,
            self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_sum_to_captured() {
        let mut summary = CycleSummary::new(Uuid::new_v4(), 4);
        summary.record(CycleOutcome::new("a", OutcomeStatus::Updated));
        summary.record(CycleOutcome::new("b", OutcomeStatus::SkippedEmptyGeneration));
        summary.record(CycleOutcome::new("c", OutcomeStatus::SkippedMissingFromCache));
        assert!(!summary.is_complete());

        summary.record(CycleOutcome::failed("d", "gone"));
        assert!(summary.is_complete());
        assert_eq!(summary.visited(), 4);
        assert_eq!(summary.outcome_for("d").unwrap().detail.as_deref(), Some("gone"));
        assert_eq!(
            summary.to_string(),
            "visited 4/4, updated 1, skipped-empty 1, skipped-missing 1, failed 1"
        );
    }

    #[test]
    fn test_outcome_status_serializes_snake_case() {
        let json = serde_json::to_string(&OutcomeStatus::SkippedMissingFromCache).unwrap();
        assert_eq!(json, "\"skipped_missing_from_cache\"");
        assert_eq!(OutcomeStatus::SkippedEmptyGeneration.to_string(), "skipped-empty-generation");
    }
}
