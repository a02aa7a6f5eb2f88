use serde::{Deserialize, Serialize};

/// Per-batch result of a local bulk upsert. Per-record failures are counted
/// and sampled, not escalated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkUpsertReport {
    pub synced: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl BulkUpsertReport {
    pub fn total(&self) -> u32 {
        self.synced + self.failed
    }

    pub fn record_failure(&mut self, message: String, sample_size: usize) {
        self.failed += 1;
        if self.errors.len() < sample_size {
            self.errors.push(message);
        }
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// No pass ran: throttled, busy, or the remote had nothing for us.
    Skipped { reason: String },
    Completed {
        succeeded: u32,
        failed: u32,
        total: u32,
    },
}

impl SyncOutcome {
    pub fn skipped(reason: &str) -> Self {
        SyncOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    pub fn synced(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }
}

/// Observable state of the reconciliation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// Unix timestamp of the last pass that synced at least one record.
    pub last_sync: Option<i64>,
    pub sync_errors: u32,
    pub last_outcome: Option<SyncOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_samples_first_errors_only() {
        let mut report = BulkUpsertReport::default();
        for i in 0..5 {
            report.record_failure(format!("record {i}"), 3);
        }
        assert_eq!(report.failed, 5);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.errors[0], "record 0");
    }

    #[test]
    fn outcome_classification() {
        assert!(!SyncOutcome::skipped("recently synced").synced());
        assert!(SyncOutcome::Completed {
            succeeded: 3,
            failed: 0,
            total: 3
        }
        .synced());
    }
}
