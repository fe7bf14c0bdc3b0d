pub mod reconcile;

pub use reconcile::{insert_or_reconcile, reconcile, InsertOutcome, PartialUpdate, ReconcileOutcome};

use chrono::NaiveDate;
use mailvault_core::mailbox::{MailboxError, MailboxSource, MessageObservation, TRASHED_FETCH_LIMIT};
use mailvault_core::{normalize_sent_date, NewEmail};
use mailvault_storage::{EmailStore, StorageError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

#[derive(Debug, Clone, Default)]
pub struct IngestionOptions {
    /// When non-empty, inbox observations must carry at least one of these labels.
    pub label_filter: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub observed: usize,
    pub filtered_out: usize,
    pub skipped_unparseable: usize,
    pub active_written: usize,
    pub deleted_written: usize,
    pub inserted: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub partial_updates: usize,
}

pub struct MailIngestor {
    options: IngestionOptions,
}

impl MailIngestor {
    pub fn new(options: IngestionOptions) -> Self {
        Self { options }
    }

    fn accepts(&self, observation: &MessageObservation) -> bool {
        self.options.label_filter.is_empty()
            || self
                .options
                .label_filter
                .iter()
                .any(|label| observation.has_label(label))
    }

    /// Bulk path for the active set. Observations already in the trash go to
    /// the soft-deleted set instead.
    pub fn ingest_active(
        &self,
        store: &dyn EmailStore,
        observations: &[MessageObservation],
    ) -> Result<IngestionReport, IngestError> {
        let mut report = IngestionReport {
            observed: observations.len(),
            ..IngestionReport::default()
        };

        let mut live = Vec::new();
        let mut trashed = Vec::new();
        for observation in observations {
            if !self.accepts(observation) {
                report.filtered_out += 1;
                continue;
            }
            if normalize_sent_date(&observation.date).is_err() {
                report.skipped_unparseable += 1;
            }
            if observation.is_trashed() {
                trashed.push(observation.to_new_email());
            } else {
                live.push(observation.to_new_email());
            }
        }

        report.active_written = store.insert_batch(&live)?;
        report.deleted_written = write_deleted(store, trashed)?;

        info!(
            observed = report.observed,
            active_written = report.active_written,
            deleted_written = report.deleted_written,
            skipped = report.skipped_unparseable,
            "inbox batch ingested"
        );
        Ok(report)
    }

    /// Bulk path for the soft-deleted set; every observation is stored as deleted.
    pub fn ingest_deleted(
        &self,
        store: &dyn EmailStore,
        observations: &[MessageObservation],
    ) -> Result<IngestionReport, IngestError> {
        let mut report = IngestionReport {
            observed: observations.len(),
            ..IngestionReport::default()
        };
        report.skipped_unparseable = observations
            .iter()
            .filter(|observation| normalize_sent_date(&observation.date).is_err())
            .count();

        let emails = observations
            .iter()
            .map(MessageObservation::to_new_email)
            .collect();
        report.deleted_written = write_deleted(store, emails)?;

        info!(
            observed = report.observed,
            deleted_written = report.deleted_written,
            skipped = report.skipped_unparseable,
            "trash batch ingested"
        );
        Ok(report)
    }

    /// Online path: one insert per observation, reconciling on key collisions.
    pub fn ingest_incremental(
        &self,
        store: &dyn EmailStore,
        observations: &[MessageObservation],
    ) -> Result<IngestionReport, IngestError> {
        let mut report = IngestionReport {
            observed: observations.len(),
            ..IngestionReport::default()
        };

        let mut trashed = Vec::new();
        for observation in observations {
            if !self.accepts(observation) {
                report.filtered_out += 1;
                continue;
            }
            if observation.is_trashed() {
                trashed.push(observation.to_new_email());
                continue;
            }

            match insert_or_reconcile(store, &observation.to_new_email()) {
                Ok(InsertOutcome::Inserted(_)) => report.inserted += 1,
                Ok(InsertOutcome::Reconciled(ReconcileOutcome::Unchanged)) => {
                    report.unchanged += 1
                }
                Ok(InsertOutcome::Reconciled(ReconcileOutcome::Updated { .. })) => {
                    report.updated += 1
                }
                Ok(InsertOutcome::PartiallyReconciled(partial)) => {
                    warn!(subject = %observation.subject, "{partial}");
                    report.partial_updates += 1;
                }
                Err(StorageError::UnparseableDate(err)) => {
                    warn!(subject = %observation.subject, "skipping message: {err}");
                    report.skipped_unparseable += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        report.skipped_unparseable += trashed
            .iter()
            .filter(|email| normalize_sent_date(&email.sent_date).is_err())
            .count();
        report.deleted_written = write_deleted(store, trashed)?;

        info!(
            observed = report.observed,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            partial = report.partial_updates,
            "inbox observations reconciled"
        );
        Ok(report)
    }

    pub fn store_inbox(
        &self,
        mailbox: &dyn MailboxSource,
        store: &dyn EmailStore,
        limit: usize,
        incremental: bool,
    ) -> Result<IngestionReport, IngestError> {
        let observations = mailbox.fetch_recent(limit)?;
        info!(count = observations.len(), "inbox messages retrieved");
        if incremental {
            self.ingest_incremental(store, &observations)
        } else {
            self.ingest_active(store, &observations)
        }
    }

    pub fn store_deleted(
        &self,
        mailbox: &dyn MailboxSource,
        store: &dyn EmailStore,
        cutoff: NaiveDate,
    ) -> Result<IngestionReport, IngestError> {
        let observations = mailbox.fetch_trashed_before(cutoff, TRASHED_FETCH_LIMIT)?;
        info!(count = observations.len(), %cutoff, "trashed messages retrieved");
        self.ingest_deleted(store, &observations)
    }
}

fn write_deleted(store: &dyn EmailStore, mut emails: Vec<NewEmail>) -> Result<usize, StorageError> {
    if emails.is_empty() {
        return Ok(0);
    }
    for email in &mut emails {
        email.deleted = true;
    }
    store.insert_deleted_batch(&emails)
}
