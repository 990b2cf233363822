//! Reconciliation engine. Compares a fresh snapshot against the last
//! observed statuses and notifies once per transition into a terminal status.
//!
//! Per record the order is always read → write → notify. A failed delivery
//! therefore loses that notification (the next run sees no change) instead
//! of repeating it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use plexnotify_core::error::Result;
use plexnotify_core::traits::{Notifier, RequestSource, StateStore};
use plexnotify_core::types::{RequestRecord, StatusVocabulary};

use crate::report::{FailureStage, RecordFailure, RecordOutcome, RecordReport, RunOutcome, RunReport};

/// Lease name guarding against overlapping runs.
pub const RUN_LEASE: &str = "reconcile";

const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(900);

pub struct Reconciler {
    source: Arc<dyn RequestSource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    vocabulary: StatusVocabulary,
    lease_ttl: Duration,
    /// Read-only: compute the report, skip writes and notifications.
    dry_run: bool,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn RequestSource>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        vocabulary: StatusVocabulary,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            vocabulary,
            lease_ttl: DEFAULT_LEASE_TTL,
            dry_run: false,
        }
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// One full run: lease, fetch, reconcile, release.
    ///
    /// Only a lease or fetch failure is an `Err`; record-level failures are
    /// reported inside the `RunReport`.
    pub async fn run(&self) -> Result<RunOutcome> {
        if self.dry_run {
            let records = self.source.fetch().await?;
            return Ok(RunOutcome::Completed(self.reconcile(&records).await));
        }

        let holder = uuid::Uuid::new_v4().to_string();
        if !self
            .store
            .try_acquire_lease(RUN_LEASE, &holder, self.lease_ttl)
            .await?
        {
            tracing::warn!("⏭️ Previous run still holds the '{RUN_LEASE}' lease, skipping");
            return Ok(RunOutcome::Skipped);
        }

        // A fetch error is returned, not logged: the caller reports it.
        let result = match self.source.fetch().await {
            Ok(records) => {
                tracing::debug!(
                    "Fetched {} request(s) from {}",
                    records.len(),
                    self.source.name()
                );
                Ok(RunOutcome::Completed(self.reconcile(&records).await))
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.store.release_lease(RUN_LEASE, &holder).await {
            tracing::warn!("⚠️ Failed to release '{RUN_LEASE}' lease: {e}");
        }
        result
    }

    /// Process a snapshot sequentially. Each record is independent: a failure
    /// is recorded and the next record is still processed.
    pub async fn reconcile(&self, records: &[RequestRecord]) -> RunReport {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(records.len());

        for record in records {
            let result = self.process_record(record).await;
            if let Err(failure) = &result {
                log_failure(record, failure);
            }
            reports.push(RecordReport {
                key: record.identity_key(),
                title: record.title.clone(),
                result,
            });
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.dry_run,
            records: reports,
        };
        tracing::info!("✅ Reconciled {}", report.summary());
        report
    }

    /// Read the last status for `record`, persist a change, then notify if
    /// the new status is terminal.
    pub async fn process_record(
        &self,
        record: &RequestRecord,
    ) -> std::result::Result<RecordOutcome, RecordFailure> {
        let key = record.identity_key();
        let previous = self
            .store
            .get(&key)
            .await
            .map_err(|e| RecordFailure::new(FailureStage::Read, e))?;

        if previous.as_deref() == Some(record.status.as_str()) {
            tracing::debug!(
                "Unchanged: '{}' is still '{}' ({})",
                record.title,
                record.status,
                record.email
            );
            return Ok(RecordOutcome::Unchanged);
        }

        if !self.dry_run {
            self.store
                .put(&key, &record.status)
                .await
                .map_err(|e| RecordFailure::new(FailureStage::Write, e))?;
        }

        let notify = self.vocabulary.classify(&record.status);
        let outcome = match previous {
            None => {
                tracing::info!(
                    "🆕 Added request '{}' with status '{}' ({})",
                    record.title,
                    record.status,
                    record.email
                );
                RecordOutcome::Added {
                    status: record.status.clone(),
                    notify,
                }
            }
            Some(from) => {
                tracing::info!(
                    "🔄 Request '{}' moved '{}' → '{}' ({})",
                    record.title,
                    from,
                    record.status,
                    record.email
                );
                RecordOutcome::Transitioned {
                    from,
                    to: record.status.clone(),
                    notify,
                }
            }
        };

        if let Some(kind) = notify {
            if self.dry_run {
                tracing::info!("Would send {kind} email to {} for '{}'", record.email, record.title);
            } else {
                self.notifier
                    .notify(kind, &record.email, &record.title, &record.who)
                    .await
                    .map_err(|e| RecordFailure::new(FailureStage::Notify, e))?;
            }
        }

        Ok(outcome)
    }
}

fn log_failure(record: &RequestRecord, failure: &RecordFailure) {
    match failure.stage {
        FailureStage::Notify => tracing::error!(
            "❌ Status of '{}' saved as '{}' but the email to {} was not sent: {}",
            record.title,
            record.status,
            record.email,
            failure.error
        ),
        stage => tracing::warn!(
            "⚠️ Skipped '{}' ({}): {stage} failed: {}",
            record.title,
            record.email,
            failure.error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plexnotify_core::error::PlexNotifyError;
    use plexnotify_core::types::{Outcome, StatusEntry};
    use plexnotify_store::{MemoryStateStore, SqliteStateStore};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ─── Fakes ─────────────────────────────────────────────────

    struct StaticSource {
        records: Vec<RequestRecord>,
        fetches: AtomicUsize,
    }

    impl StaticSource {
        fn new(records: Vec<RequestRecord>) -> Self {
            Self {
                records,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self) -> Result<Vec<RequestRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RequestSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self) -> Result<Vec<RequestRecord>> {
            Err(PlexNotifyError::Notion("401 Unauthorized".into()))
        }
    }

    type Sent = (Outcome, String, String, String);

    /// Records every notification; optionally fails, optionally snapshots
    /// what the store held for the record at dispatch time.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
        store: Option<Arc<MemoryStateStore>>,
        seen_in_store: Mutex<Vec<Option<String>>>,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        async fn record(&self, outcome: Outcome, email: &str, title: &str, who: &str) -> Result<()> {
            if let Some(store) = &self.store {
                let key = format!("{email}-{title}-");
                let value = store
                    .snapshot()
                    .into_iter()
                    .find(|(k, _)| k.starts_with(&key))
                    .map(|(_, v)| v);
                self.seen_in_store.lock().unwrap().push(value);
            }
            if self.fail {
                return Err(PlexNotifyError::Delivery("503 Service Unavailable".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((outcome, email.into(), title.into(), who.into()));
            Ok(())
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_fulfilled(&self, email: &str, title: &str, who: &str) -> Result<()> {
            self.record(Outcome::Fulfilled, email, title, who).await
        }

        async fn notify_not_found(&self, email: &str, title: &str, who: &str) -> Result<()> {
            self.record(Outcome::NotFound, email, title, who).await
        }
    }

    /// Memory store whose `put` fails for one key.
    struct BrokenKeyStore {
        inner: MemoryStateStore,
        broken_key: String,
    }

    #[async_trait]
    impl StateStore for BrokenKeyStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, status: &str) -> Result<()> {
            if key == self.broken_key {
                return Err(PlexNotifyError::Store("database is locked".into()));
            }
            self.inner.put(key, status).await
        }

        async fn entries(&self) -> Result<Vec<StatusEntry>> {
            self.inner.entries().await
        }

        async fn try_acquire_lease(&self, lease: &str, holder: &str, ttl: Duration) -> Result<bool> {
            self.inner.try_acquire_lease(lease, holder, ttl).await
        }

        async fn release_lease(&self, lease: &str, holder: &str) -> Result<()> {
            self.inner.release_lease(lease, holder).await
        }
    }

    fn request(email: &str, title: &str, id: &str, status: &str) -> RequestRecord {
        RequestRecord {
            id: id.into(),
            email: email.into(),
            who: "Alice".into(),
            title: title.into(),
            status: status.into(),
        }
    }

    fn movie(status: &str) -> RequestRecord {
        request("a@x.com", "Movie", "123", status)
    }

    fn reconciler(
        records: Vec<RequestRecord>,
        store: Arc<dyn StateStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> Reconciler {
        Reconciler::new(
            Arc::new(StaticSource::new(records)),
            store,
            notifier,
            StatusVocabulary::default(),
        )
    }

    async fn completed(reconciler: &Reconciler) -> RunReport {
        match reconciler.run().await.unwrap() {
            RunOutcome::Completed(report) => report,
            RunOutcome::Skipped => panic!("run was skipped"),
        }
    }

    // ─── Unseen keys ───────────────────────────────────────────

    #[tokio::test]
    async fn test_new_done_request_notifies_fulfilled() {
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("Done")], store.clone(), notifier.clone());

        let report = completed(&engine).await;

        assert_eq!(
            store.snapshot(),
            HashMap::from([("a@x.com-Movie-123".to_string(), "Done".to_string())])
        );
        assert_eq!(
            notifier.sent(),
            vec![(Outcome::Fulfilled, "a@x.com".into(), "Movie".into(), "Alice".into())]
        );
        assert_eq!(report.added(), 1);
        assert_eq!(report.notified(), 1);
    }

    #[tokio::test]
    async fn test_new_requests_notify_only_for_terminal_statuses() {
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let records = vec![
            request("a@x.com", "Movie", "1", "Pending"),
            request("b@x.com", "Show", "2", "Not Found"),
            request("c@x.com", "Album", "3", "In Progress"),
        ];
        let engine = reconciler(records, store.clone(), notifier.clone());

        let report = completed(&engine).await;

        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.snapshot()["b@x.com-Show-2"], "Not Found");
        assert_eq!(
            notifier.sent(),
            vec![(Outcome::NotFound, "b@x.com".into(), "Show".into(), "Alice".into())]
        );
        assert_eq!(report.added(), 3);
        assert_eq!(report.notified(), 1);
    }

    // ─── Seen keys ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_unchanged_status_writes_nothing() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Pending")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("Pending")], store.clone(), notifier.clone());

        let report = completed(&engine).await;

        assert_eq!(store.write_count(), 0);
        assert!(notifier.sent().is_empty());
        assert_eq!(report.unchanged(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_terminal_status_is_not_renotified() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Done")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("Done")], store.clone(), notifier.clone());

        completed(&engine).await;

        assert_eq!(store.write_count(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transition_to_not_found_notifies() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Pending")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("Not Found")], store.clone(), notifier.clone());

        let report = completed(&engine).await;

        assert_eq!(store.snapshot()["a@x.com-Movie-123"], "Not Found");
        assert_eq!(
            notifier.sent(),
            vec![(Outcome::NotFound, "a@x.com".into(), "Movie".into(), "Alice".into())]
        );
        assert_eq!(
            report.records[0].result.as_ref().unwrap(),
            &RecordOutcome::Transitioned {
                from: "Pending".into(),
                to: "Not Found".into(),
                notify: Some(Outcome::NotFound),
            }
        );
    }

    #[tokio::test]
    async fn test_transition_to_intermediate_status_is_silent() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Pending")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("In Progress")], store.clone(), notifier.clone());

        let report = completed(&engine).await;

        assert_eq!(store.snapshot()["a@x.com-Movie-123"], "In Progress");
        assert_eq!(store.write_count(), 1);
        assert!(notifier.sent().is_empty());
        assert_eq!(report.transitioned(), 1);
        assert_eq!(report.notified(), 0);
    }

    #[tokio::test]
    async fn test_repeated_runs_notify_once_per_transition() {
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        for status in ["Pending", "Pending", "In Progress", "Done", "Done", "Done"] {
            let engine = reconciler(vec![movie(status)], store.clone(), notifier.clone());
            completed(&engine).await;
        }

        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].0, Outcome::Fulfilled);
        // Pending (new), In Progress, Done.
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_custom_vocabulary() {
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Reconciler::new(
            Arc::new(StaticSource::new(vec![movie("Ready"), request("b@x.com", "Show", "2", "Done")])),
            store.clone(),
            notifier.clone(),
            StatusVocabulary::new("Ready", "Missing"),
        );

        completed(&engine).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, "Movie");
    }

    // ─── Ordering and isolation ────────────────────────────────

    #[tokio::test]
    async fn test_processing_order_does_not_matter() {
        let seed = [("a@x.com-Movie-1", "Pending"), ("b@x.com-Show-2", "Done")];
        let records = vec![
            request("a@x.com", "Movie", "1", "Done"),
            request("b@x.com", "Show", "2", "Done"),
            request("c@x.com", "Album", "3", "Not Found"),
            request("d@x.com", "Book", "4", "In Progress"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let mut outcomes = Vec::new();
        for batch in [records, reversed] {
            let store = Arc::new(MemoryStateStore::with_entries(seed));
            let notifier = Arc::new(RecordingNotifier::default());
            completed(&reconciler(batch, store.clone(), notifier.clone())).await;
            let mut sent = notifier.sent();
            sent.sort_by(|a, b| a.1.cmp(&b.1));
            outcomes.push((store.snapshot(), sent));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_siblings() {
        let store = Arc::new(BrokenKeyStore {
            inner: MemoryStateStore::new(),
            broken_key: "b@x.com-Show-2".into(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let records = vec![
            request("a@x.com", "Movie", "1", "Done"),
            request("b@x.com", "Show", "2", "Done"),
            request("c@x.com", "Album", "3", "Done"),
        ];
        let engine = reconciler(records, store.clone(), notifier.clone());

        let report = completed(&engine).await;

        assert_eq!(report.failed(), 1);
        let (failed, failure) = report.failures().next().unwrap();
        assert_eq!(failed.key, "b@x.com-Show-2");
        assert_eq!(failure.stage, FailureStage::Write);

        // No write, no notification for the broken record.
        let emails: Vec<_> = notifier.sent().into_iter().map(|s| s.1).collect();
        assert_eq!(emails, vec!["a@x.com".to_string(), "c@x.com".to_string()]);
        assert_eq!(store.inner.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_notification_happens_after_write() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Pending")]));
        let notifier = Arc::new(RecordingNotifier {
            store: Some(store.clone()),
            ..RecordingNotifier::default()
        });
        let engine = reconciler(vec![movie("Done")], store.clone(), notifier.clone());

        completed(&engine).await;

        assert_eq!(
            *notifier.seen_in_store.lock().unwrap(),
            vec![Some("Done".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_retried_next_run() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Pending")]));
        let failing = Arc::new(RecordingNotifier::failing());

        let report = completed(&reconciler(vec![movie("Done")], store.clone(), failing)).await;
        let (_, failure) = report.failures().next().unwrap();
        assert_eq!(failure.stage, FailureStage::Notify);
        assert_eq!(store.snapshot()["a@x.com-Movie-123"], "Done");

        // The transition is already persisted, so the next run sees no change.
        let notifier = Arc::new(RecordingNotifier::default());
        let report = completed(&reconciler(vec![movie("Done")], store.clone(), notifier.clone())).await;
        assert_eq!(report.unchanged(), 1);
        assert!(notifier.sent().is_empty());
    }

    // ─── Run level ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_fetch_failure_aborts_run_and_releases_lease() {
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Reconciler::new(
            Arc::new(FailingSource),
            store.clone(),
            notifier.clone(),
            StatusVocabulary::default(),
        );

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, PlexNotifyError::Notion(_)));
        assert_eq!(store.write_count(), 0);
        assert!(notifier.sent().is_empty());
        assert!(
            store
                .try_acquire_lease(RUN_LEASE, "someone-else", Duration::from_secs(60))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let store = Arc::new(MemoryStateStore::new());
        assert!(
            store
                .try_acquire_lease(RUN_LEASE, "other-run", Duration::from_secs(60))
                .await
                .unwrap()
        );
        let source = Arc::new(StaticSource::new(vec![movie("Done")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Reconciler::new(
            source.clone(),
            store.clone(),
            notifier.clone(),
            StatusVocabulary::default(),
        );

        assert!(matches!(engine.run().await.unwrap(), RunOutcome::Skipped));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_lease_released_after_successful_run() {
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("Pending")], store.clone(), notifier);

        completed(&engine).await;
        completed(&engine).await;
    }

    #[tokio::test]
    async fn test_dry_run_reads_only() {
        let store = Arc::new(MemoryStateStore::with_entries([("a@x.com-Movie-123", "Pending")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(
            vec![movie("Done"), request("b@x.com", "Show", "2", "Not Found")],
            store.clone(),
            notifier.clone(),
        )
        .with_dry_run(true);

        let report = completed(&engine).await;

        assert!(report.dry_run);
        assert_eq!(report.notified(), 2);
        assert_eq!(store.write_count(), 0);
        assert!(notifier.sent().is_empty());
        assert_eq!(store.snapshot()["a@x.com-Movie-123"], "Pending");
    }

    #[tokio::test]
    async fn test_dry_run_over_read_only_sqlite_store() {
        let dir = std::env::temp_dir().join("plexnotify-test-dry-run-ro");
        let path = dir.join("state.db");
        std::fs::remove_dir_all(&dir).ok();
        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.put("a@x.com-Movie-123", "Pending").await.unwrap();
        }

        let store = Arc::new(SqliteStateStore::open_read_only(&path).unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = reconciler(vec![movie("Done")], store.clone(), notifier.clone())
            .with_dry_run(true);

        let report = completed(&engine).await;

        assert_eq!(report.transitioned(), 1);
        assert_eq!(report.failed(), 0);
        assert!(notifier.sent().is_empty());
        assert_eq!(
            store.get("a@x.com-Movie-123").await.unwrap().as_deref(),
            Some("Pending")
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_out_of_range_lease_ttl_fails_the_run() {
        let source = Arc::new(StaticSource::new(vec![movie("Done")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Reconciler::new(
            source.clone(),
            Arc::new(MemoryStateStore::new()),
            notifier.clone(),
            StatusVocabulary::default(),
        )
        .with_lease_ttl(Duration::from_secs(10_000_000_000_000));

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, PlexNotifyError::Store(_)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(notifier.sent().is_empty());
    }
}
