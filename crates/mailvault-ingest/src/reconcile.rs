//! Corrective updates for an observation whose natural key already exists.
//!
//! The stored label string is replaced, never unioned: the newest observation
//! is the authority on which labels a message carries. Observations whose
//! labels are already all present are left alone, which keeps repeated
//! re-observation of an unchanged message free of writes.

use mailvault_core::{NewEmail, StoredEmail};
use mailvault_storage::{EmailStore, StorageError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    Updated { read_applied: bool },
}

/// The label update failed after the read-status step ran.
#[derive(Debug, Error)]
#[error("label update for record {id} failed (read status applied: {read_applied}): {source}")]
pub struct PartialUpdate {
    pub id: i64,
    pub read_applied: bool,
    #[source]
    pub source: StorageError,
}

#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(i64),
    Reconciled(ReconcileOutcome),
    PartiallyReconciled(PartialUpdate),
}

pub fn reconcile(
    store: &dyn EmailStore,
    existing: &StoredEmail,
    observed: &NewEmail,
) -> Result<ReconcileOutcome, PartialUpdate> {
    if existing.labels.contains_all(&observed.labels) {
        debug!(id = existing.id, "labels already present, nothing to reconcile");
        return Ok(ReconcileOutcome::Unchanged);
    }

    let read_applied = match store.update_read_status(existing.id, observed.read) {
        Ok(()) => true,
        Err(err) => {
            warn!(id = existing.id, read = observed.read, "read status update failed: {err}");
            false
        }
    };

    store
        .update_labels(existing.id, &observed.labels.to_string())
        .map_err(|source| PartialUpdate {
            id: existing.id,
            read_applied,
            source,
        })?;

    debug!(id = existing.id, labels = %observed.labels, read_applied, "record reconciled");
    Ok(ReconcileOutcome::Updated { read_applied })
}

/// Single-record path: insert, and reconcile against the stored row on a key collision.
pub fn insert_or_reconcile(
    store: &dyn EmailStore,
    email: &NewEmail,
) -> Result<InsertOutcome, StorageError> {
    let (set, key) = match store.insert(email) {
        Ok(id) => return Ok(InsertOutcome::Inserted(id)),
        Err(StorageError::DuplicateKey { set, key }) => (set, key),
        Err(err) => return Err(err),
    };

    let existing = store.get(set, &key)?;
    match reconcile(store, &existing, email) {
        Ok(outcome) => Ok(InsertOutcome::Reconciled(outcome)),
        Err(partial) => Ok(InsertOutcome::PartiallyReconciled(partial)),
    }
}
