use crate::{EmailStore, StorageError};
use chrono::{SubsecRound, Utc};
use mailvault_core::{LabelSet, NaturalKey, NewEmail, RecordSet, StoredEmail};
use std::cell::RefCell;
use tracing::warn;

/// Process-local [`EmailStore`] with the same observable semantics as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryEmailStore {
    state: RefCell<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    active: RecordTable,
    deleted: RecordTable,
}

#[derive(Debug, Default)]
struct RecordTable {
    last_id: i64,
    rows: Vec<StoredEmail>,
}

impl RecordTable {
    fn position(&self, key: &NaturalKey) -> Option<usize> {
        self.rows.iter().position(|row| row.natural_key() == *key)
    }

    fn push(&mut self, email: &NewEmail, key: NaturalKey, deleted: bool) -> i64 {
        self.last_id += 1;
        self.rows.push(StoredEmail {
            id: self.last_id,
            subject: key.subject,
            body: email.body.clone(),
            from: key.from,
            to: key.to,
            cc: email.cc.clone(),
            bcc: email.bcc.clone(),
            sent_at: key.sent_at,
            sender: email.sender.clone(),
            read: email.read,
            deleted,
            labels: email.labels.clone(),
            created_at: Utc::now().trunc_subsecs(0),
        });
        self.last_id
    }

    fn find_by_id(&mut self, id: i64) -> Option<&mut StoredEmail> {
        self.rows.iter_mut().find(|row| row.id == id)
    }
}

impl MemoryEmailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self, set: RecordSet) -> usize {
        let state = self.state.borrow();
        match set {
            RecordSet::Active => state.active.rows.len(),
            RecordSet::Deleted => state.deleted.rows.len(),
        }
    }

    fn write_batch(&self, set: RecordSet, emails: &[NewEmail]) -> Result<usize, StorageError> {
        let mut state = self.state.borrow_mut();
        let table = match set {
            RecordSet::Active => &mut state.active,
            RecordSet::Deleted => &mut state.deleted,
        };

        let mut written = 0;
        for email in emails {
            let key = match email.natural_key() {
                Ok(key) => key,
                Err(err) => {
                    warn!(
                        set = %set,
                        subject = %email.subject,
                        sent_date = %email.sent_date,
                        "skipping record: {err}"
                    );
                    continue;
                }
            };
            if let Some(index) = table.position(&key) {
                table.rows.remove(index);
            }
            table.push(email, key, email.deleted || set == RecordSet::Deleted);
            written += 1;
        }
        Ok(written)
    }
}

impl EmailStore for MemoryEmailStore {
    fn insert(&self, email: &NewEmail) -> Result<i64, StorageError> {
        let key = email.natural_key()?;
        let mut state = self.state.borrow_mut();
        if state.active.position(&key).is_some() {
            return Err(StorageError::DuplicateKey {
                set: RecordSet::Active,
                key,
            });
        }
        Ok(state.active.push(email, key, email.deleted))
    }

    fn insert_batch(&self, emails: &[NewEmail]) -> Result<usize, StorageError> {
        self.write_batch(RecordSet::Active, emails)
    }

    fn insert_deleted_batch(&self, emails: &[NewEmail]) -> Result<usize, StorageError> {
        self.write_batch(RecordSet::Deleted, emails)
    }

    fn list(&self, set: RecordSet, limit: usize) -> Result<Vec<StoredEmail>, StorageError> {
        let state = self.state.borrow();
        let table = match set {
            RecordSet::Active => &state.active,
            RecordSet::Deleted => &state.deleted,
        };
        let mut rows = table.rows.clone();
        rows.sort_by(|left, right| right.id.cmp(&left.id));
        rows.truncate(limit);
        Ok(rows)
    }

    fn get(&self, set: RecordSet, key: &NaturalKey) -> Result<StoredEmail, StorageError> {
        let state = self.state.borrow();
        let table = match set {
            RecordSet::Active => &state.active,
            RecordSet::Deleted => &state.deleted,
        };
        table
            .position(key)
            .map(|index| table.rows[index].clone())
            .ok_or_else(|| StorageError::NotFound {
                set,
                key: key.clone(),
            })
    }

    fn update_read_status(&self, id: i64, read: bool) -> Result<(), StorageError> {
        let mut state = self.state.borrow_mut();
        let row = state
            .active
            .find_by_id(id)
            .ok_or(StorageError::UnknownIdentity(id))?;
        row.read = read;
        Ok(())
    }

    fn update_labels(&self, id: i64, labels: &str) -> Result<(), StorageError> {
        let mut state = self.state.borrow_mut();
        let row = state
            .active
            .find_by_id(id)
            .ok_or(StorageError::UnknownIdentity(id))?;
        row.labels = LabelSet::parse(labels);
        Ok(())
    }
}
