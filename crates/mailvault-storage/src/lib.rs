mod memory;
mod sqlite;

pub use memory::MemoryEmailStore;
pub use sqlite::{SqliteEmailStore, EMAIL_SCHEMA_VERSION};

use mailvault_core::{NaturalKey, NewEmail, RecordSet, SentDateError, StoredEmail};
use thiserror::Error;

pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    UnparseableDate(#[from] SentDateError),
    #[error("duplicate {set} record for {key}")]
    DuplicateKey { set: RecordSet, key: NaturalKey },
    #[error("no {set} record for {key}")]
    NotFound { set: RecordSet, key: NaturalKey },
    #[error("no active record with id {0}")]
    UnknownIdentity(i64),
    #[error("{set} batch rolled back: {source}")]
    Transaction {
        set: RecordSet,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

/// Persistence capability for email records.
///
/// `insert` rejects a colliding natural key so the caller can reconcile,
/// while the batch operations replace colliding rows wholesale. Batches skip
/// (and log) records whose sent date cannot be normalized and report only the
/// rows actually written; any other failure rolls the whole batch back.
/// Targeted updates address the active set only.
pub trait EmailStore {
    fn insert(&self, email: &NewEmail) -> Result<i64, StorageError>;

    fn insert_batch(&self, emails: &[NewEmail]) -> Result<usize, StorageError>;

    /// Writes into the soft-deleted set; every row is stored with `deleted` set.
    fn insert_deleted_batch(&self, emails: &[NewEmail]) -> Result<usize, StorageError>;

    /// Most recently created records first, at most `limit` of them.
    fn list(&self, set: RecordSet, limit: usize) -> Result<Vec<StoredEmail>, StorageError>;

    fn get(&self, set: RecordSet, key: &NaturalKey) -> Result<StoredEmail, StorageError>;

    fn update_read_status(&self, id: i64, read: bool) -> Result<(), StorageError>;

    fn update_labels(&self, id: i64, labels: &str) -> Result<(), StorageError>;
}
