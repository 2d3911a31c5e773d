use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted shape of assembly progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub build_hash: String,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// Completed assembly steps, bound to the build hash they were recorded for.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTracker {
    build_hash: String,
    completed: BTreeSet<String>,
    last_updated: DateTime<Utc>,
}

impl ProgressTracker {
    pub fn new(build_hash: impl Into<String>) -> Self {
        Self {
            build_hash: build_hash.into(),
            completed: BTreeSet::new(),
            last_updated: Utc::now(),
        }
    }

    /// Resume from a persisted record. A record made for a different build
    /// hash is stale and yields an empty tracker.
    pub fn restore(record: Option<ProgressRecord>, live_hash: &str) -> Self {
        match record {
            Some(record) if record.build_hash == live_hash => Self {
                build_hash: record.build_hash,
                completed: record.completed_steps.into_iter().collect(),
                last_updated: record.last_updated,
            },
            Some(_) => {
                tracing::info!("Build changed since progress was saved, starting over");
                Self::new(live_hash)
            }
            None => Self::new(live_hash),
        }
    }

    /// Whether a stored record belongs to the live build.
    pub fn is_current(record: &ProgressRecord, live_hash: &str) -> bool {
        record.build_hash == live_hash
    }

    pub fn build_hash(&self) -> &str {
        &self.build_hash
    }

    pub fn completed_steps(&self) -> impl Iterator<Item = &str> {
        self.completed.iter().map(String::as_str)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Flip a step's completion. Returns the new state.
    pub fn toggle_step(&mut self, step_id: &str) -> bool {
        let now_complete = if self.completed.remove(step_id) {
            false
        } else {
            self.completed.insert(step_id.to_string());
            true
        };
        self.touch();
        now_complete
    }

    pub fn mark_complete(&mut self, step_id: &str) {
        self.completed.insert(step_id.to_string());
        self.touch();
    }

    pub fn mark_incomplete(&mut self, step_id: &str) {
        self.completed.remove(step_id);
        self.touch();
    }

    pub fn is_complete(&self, step_id: &str) -> bool {
        self.completed.contains(step_id)
    }

    /// Rounded percentage of `step_ids` completed; 0 for an empty phase.
    pub fn phase_progress(&self, step_ids: &[String]) -> u32 {
        if step_ids.is_empty() {
            return 0;
        }
        let done = step_ids.iter().filter(|id| self.is_complete(id)).count();
        percent(done, step_ids.len())
    }

    pub fn overall_progress(&self, total_steps: usize) -> u32 {
        if total_steps == 0 {
            return 0;
        }
        percent(self.completed.len(), total_steps)
    }

    pub fn is_phase_complete(&self, step_ids: &[String]) -> bool {
        !step_ids.is_empty() && step_ids.iter().all(|id| self.is_complete(id))
    }

    pub fn reset(&mut self) {
        self.completed.clear();
        self.touch();
    }

    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            build_hash: self.build_hash.clone(),
            completed_steps: self.completed.iter().cloned().collect(),
            last_updated: self.last_updated,
        }
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_toggle_flips_membership() {
        let mut tracker = ProgressTracker::new("hash");
        assert!(tracker.toggle_step("prep-tools"));
        assert!(tracker.is_complete("prep-tools"));

        assert!(!tracker.toggle_step("prep-tools"));
        assert!(!tracker.is_complete("prep-tools"));
        assert_eq!(tracker.completed_count(), 0);
    }

    #[test]
    fn test_restore_same_hash_keeps_steps() {
        let mut tracker = ProgressTracker::new("hash-a");
        tracker.mark_complete("a");
        tracker.mark_complete("b");
        let record = tracker.to_record();

        let restored = ProgressTracker::restore(Some(record.clone()), "hash-a");
        assert!(restored.is_complete("a"));
        assert!(restored.is_complete("b"));
        assert_eq!(restored.to_record(), record);
    }

    #[test]
    fn test_restore_different_hash_discards() {
        let mut tracker = ProgressTracker::new("hash-a");
        tracker.mark_complete("a");
        let record = tracker.to_record();
        assert!(!ProgressTracker::is_current(&record, "hash-b"));

        let restored = ProgressTracker::restore(Some(record), "hash-b");
        assert_eq!(restored.completed_count(), 0);
        assert_eq!(restored.build_hash(), "hash-b");
    }

    #[test]
    fn test_restore_without_record_starts_empty() {
        let restored = ProgressTracker::restore(None, "hash");
        assert_eq!(restored.completed_count(), 0);
    }

    #[test]
    fn test_reset_clears_regardless_of_hash() {
        let mut tracker = ProgressTracker::new("hash");
        tracker.mark_complete("a");
        tracker.reset();
        assert_eq!(tracker.completed_count(), 0);
        assert_eq!(tracker.build_hash(), "hash");
    }

    #[test]
    fn test_mark_is_idempotent() {
        let mut tracker = ProgressTracker::new("hash");
        tracker.mark_complete("a");
        tracker.mark_complete("a");
        assert_eq!(tracker.completed_count(), 1);
        tracker.mark_incomplete("a");
        tracker.mark_incomplete("a");
        assert_eq!(tracker.completed_count(), 0);
    }

    #[test]
    fn test_phase_progress_percentages() {
        let mut tracker = ProgressTracker::new("hash");
        let phase = ids(&["a", "b", "c"]);
        assert_eq!(tracker.phase_progress(&phase), 0);
        assert!(!tracker.is_phase_complete(&phase));

        tracker.mark_complete("a");
        assert_eq!(tracker.phase_progress(&phase), 33);
        tracker.mark_complete("b");
        assert_eq!(tracker.phase_progress(&phase), 67);
        tracker.mark_complete("c");
        assert_eq!(tracker.phase_progress(&phase), 100);
        assert!(tracker.is_phase_complete(&phase));

        assert_eq!(tracker.phase_progress(&[]), 0);
        assert!(!tracker.is_phase_complete(&[]));
    }

    #[test]
    fn test_overall_progress() {
        let mut tracker = ProgressTracker::new("hash");
        assert_eq!(tracker.overall_progress(0), 0);
        tracker.mark_complete("a");
        assert_eq!(tracker.overall_progress(8), 13);
    }

    #[test]
    fn test_record_json_shape() {
        let mut tracker = ProgressTracker::new("hash");
        tracker.mark_complete("b");
        tracker.mark_complete("a");

        let json = serde_json::to_value(tracker.to_record()).unwrap();
        assert_eq!(json["buildHash"], "hash");
        assert_eq!(json["completedSteps"], serde_json::json!(["a", "b"]));
        assert!(json["lastUpdated"].is_string());
    }
}
