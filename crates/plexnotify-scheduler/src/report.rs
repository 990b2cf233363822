//! Per-run and per-record results.

use chrono::{DateTime, Utc};
use plexnotify_core::error::PlexNotifyError;
use plexnotify_core::types::Outcome;

/// What happened to one record in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First sighting of the key.
    Added {
        status: String,
        notify: Option<Outcome>,
    },
    /// Same status as last run: no write, no notification.
    Unchanged,
    Transitioned {
        from: String,
        to: String,
        notify: Option<Outcome>,
    },
}

impl RecordOutcome {
    /// The notification this record called for, if any.
    pub fn notification(&self) -> Option<Outcome> {
        match self {
            RecordOutcome::Added { notify, .. } | RecordOutcome::Transitioned { notify, .. } => {
                *notify
            }
            RecordOutcome::Unchanged => None,
        }
    }
}

/// Where in the read → write → notify sequence a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Read,
    Write,
    /// The new status is already persisted; the notification is lost.
    Notify,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Read => write!(f, "read"),
            FailureStage::Write => write!(f, "write"),
            FailureStage::Notify => write!(f, "notify"),
        }
    }
}

#[derive(Debug)]
pub struct RecordFailure {
    pub stage: FailureStage,
    pub error: PlexNotifyError,
}

impl RecordFailure {
    pub fn new(stage: FailureStage, error: PlexNotifyError) -> Self {
        Self { stage, error }
    }
}

impl std::fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

#[derive(Debug)]
pub struct RecordReport {
    pub key: String,
    pub title: String,
    pub result: Result<RecordOutcome, RecordFailure>,
}

/// Result of one reconciliation run over one snapshot.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub records: Vec<RecordReport>,
}

impl RunReport {
    pub fn added(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Added { .. }))
    }

    pub fn transitioned(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Transitioned { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Unchanged))
    }

    /// Notifications sent (or, in a dry run, that would have been sent).
    pub fn notified(&self) -> usize {
        self.count(|o| o.notification().is_some())
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.result.is_err()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&RecordReport, &RecordFailure)> {
        self.records
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|f| (r, f)))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} record(s): {} new, {} changed, {} unchanged, {} notified, {} failed{}",
            self.records.len(),
            self.added(),
            self.transitioned(),
            self.unchanged(),
            self.notified(),
            self.failed(),
            if self.dry_run { " (dry run)" } else { "" }
        )
    }

    fn count<F>(&self, pred: F) -> usize
    where
        F: Fn(&RecordOutcome) -> bool,
    {
        self.records
            .iter()
            .filter(|r| r.result.as_ref().is_ok_and(&pred))
            .count()
    }
}

/// Whether a run happened at all.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run holds the lease.
    Skipped,
}
