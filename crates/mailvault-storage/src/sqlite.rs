use crate::{EmailStore, StorageError};
use chrono::NaiveDateTime;
use mailvault_core::{
    LabelSet, NaturalKey, NewEmail, RecordSet, StoredEmail, CANONICAL_SENT_DATE_FORMAT,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, warn};

pub const EMAIL_SCHEMA_VERSION: i64 = 1;

/// SQL for one record set. Table names never come from callers.
struct SetQueries {
    table: &'static str,
    insert: &'static str,
    replace: &'static str,
    list: &'static str,
    get: &'static str,
    count: &'static str,
    update_read: &'static str,
    update_labels: &'static str,
}

macro_rules! set_queries {
    ($table:literal) => {
        SetQueries {
            table: $table,
            insert: concat!(
                "INSERT INTO ",
                $table,
                r#" (subject, body, "from", "to", cc, bcc, sent_date, sender, read, deleted, labels, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))"#
            ),
            replace: concat!(
                "INSERT OR REPLACE INTO ",
                $table,
                r#" (subject, body, "from", "to", cc, bcc, sent_date, sender, read, deleted, labels, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))"#
            ),
            list: concat!(
                r#"SELECT id, subject, body, "from", "to", cc, bcc, sent_date, sender, read, deleted, labels, created_at
                FROM "#,
                $table,
                " ORDER BY id DESC LIMIT ?1"
            ),
            get: concat!(
                r#"SELECT id, subject, body, "from", "to", cc, bcc, sent_date, sender, read, deleted, labels, created_at
                FROM "#,
                $table,
                r#" WHERE subject = ?1 AND "from" = ?2 AND "to" = ?3 AND sent_date = ?4"#
            ),
            count: concat!("SELECT COUNT(*) FROM ", $table),
            update_read: concat!("UPDATE ", $table, " SET read = ?1 WHERE id = ?2"),
            update_labels: concat!("UPDATE ", $table, " SET labels = ?1 WHERE id = ?2"),
        }
    };
}

const ACTIVE_QUERIES: SetQueries = set_queries!("emails");
const DELETED_QUERIES: SetQueries = set_queries!("deleted_emails");

fn queries(set: RecordSet) -> &'static SetQueries {
    match set {
        RecordSet::Active => &ACTIVE_QUERIES,
        RecordSet::Deleted => &DELETED_QUERIES,
    }
}

pub struct SqliteEmailStore {
    conn: Connection,
}

impl SqliteEmailStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        Self::provision(&path.display().to_string(), Connection::open(path))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::provision(":memory:", Connection::open_in_memory())
    }

    /// Connection and migration failures both surface as `Unavailable`.
    fn provision(
        location: &str,
        conn: rusqlite::Result<Connection>,
    ) -> Result<Self, StorageError> {
        let unavailable = |source| StorageError::Unavailable {
            path: location.to_string(),
            source,
        };
        let store = Self {
            conn: conn.map_err(unavailable)?,
        };
        store.migrate().map_err(|err| match err {
            StorageError::Sqlite(source) => unavailable(source),
            other => other,
        })?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > EMAIL_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: EMAIL_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_email_schema.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn record_count(&self, set: RecordSet) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row(queries(set).count, [], |row| row.get(0))?)
    }

    fn write_batch(&self, set: RecordSet, emails: &[NewEmail]) -> Result<usize, StorageError> {
        let mut rows = Vec::with_capacity(emails.len());
        for email in emails {
            match email.natural_key() {
                Ok(key) => rows.push((email, key.canonical_sent_at())),
                Err(err) => warn!(
                    set = %set,
                    subject = %email.subject,
                    sent_date = %email.sent_date,
                    "skipping record: {err}"
                ),
            }
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let rolled_back = |source| StorageError::Transaction { set, source };
        let tx = self.conn.unchecked_transaction().map_err(rolled_back)?;
        let mut written = 0;
        {
            let mut statement = tx.prepare_cached(queries(set).replace).map_err(rolled_back)?;
            for (email, sent_at) in rows {
                let deleted = email.deleted || set == RecordSet::Deleted;
                written += statement
                    .execute(params![
                        email.subject,
                        email.body,
                        email.from,
                        email.to,
                        email.cc,
                        email.bcc,
                        sent_at,
                        email.sender,
                        email.read,
                        deleted,
                        email.labels.to_string(),
                    ])
                    .map_err(rolled_back)?;
            }
        }
        tx.commit().map_err(rolled_back)?;

        debug!(set = %set, table = queries(set).table, written, "batch committed");
        Ok(written)
    }
}

impl EmailStore for SqliteEmailStore {
    fn insert(&self, email: &NewEmail) -> Result<i64, StorageError> {
        let key = email.natural_key()?;
        let result = self.conn.execute(
            ACTIVE_QUERIES.insert,
            params![
                email.subject,
                email.body,
                email.from,
                email.to,
                email.cc,
                email.bcc,
                key.canonical_sent_at(),
                email.sender,
                email.read,
                email.deleted,
                email.labels.to_string(),
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(StorageError::DuplicateKey {
                set: RecordSet::Active,
                key,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn insert_batch(&self, emails: &[NewEmail]) -> Result<usize, StorageError> {
        self.write_batch(RecordSet::Active, emails)
    }

    fn insert_deleted_batch(&self, emails: &[NewEmail]) -> Result<usize, StorageError> {
        self.write_batch(RecordSet::Deleted, emails)
    }

    fn list(&self, set: RecordSet, limit: usize) -> Result<Vec<StoredEmail>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = self.conn.prepare_cached(queries(set).list)?;
        let rows = statement.query_map([limit], email_from_row)?;

        let mut emails = Vec::new();
        for row in rows {
            emails.push(row?);
        }
        Ok(emails)
    }

    fn get(&self, set: RecordSet, key: &NaturalKey) -> Result<StoredEmail, StorageError> {
        self.conn
            .query_row(
                queries(set).get,
                params![key.subject, key.from, key.to, key.canonical_sent_at()],
                email_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound {
                set,
                key: key.clone(),
            })
    }

    fn update_read_status(&self, id: i64, read: bool) -> Result<(), StorageError> {
        let changes = self
            .conn
            .execute(ACTIVE_QUERIES.update_read, params![read, id])?;
        if changes == 0 {
            return Err(StorageError::UnknownIdentity(id));
        }
        Ok(())
    }

    fn update_labels(&self, id: i64, labels: &str) -> Result<(), StorageError> {
        let changes = self
            .conn
            .execute(ACTIVE_QUERIES.update_labels, params![labels, id])?;
        if changes == 0 {
            return Err(StorageError::UnknownIdentity(id));
        }
        Ok(())
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn email_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEmail> {
    let sent_at = parse_stored_timestamp(row, 7)?;
    let created_at = parse_stored_timestamp(row, 12)?.and_utc();
    let labels: String = row.get(11)?;

    Ok(StoredEmail {
        id: row.get(0)?,
        subject: row.get(1)?,
        body: row.get(2)?,
        from: row.get(3)?,
        to: row.get(4)?,
        cc: row.get(5)?,
        bcc: row.get(6)?,
        sent_at,
        sender: row.get(8)?,
        read: row.get(9)?,
        deleted: row.get(10)?,
        labels: LabelSet::parse(&labels),
        created_at,
    })
}

fn parse_stored_timestamp(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<NaiveDateTime> {
    let value: String = row.get(index)?;
    NaiveDateTime::parse_from_str(&value, CANONICAL_SENT_DATE_FORMAT).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
    })
}
