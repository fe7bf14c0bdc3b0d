use crate::{normalize_sent_date, LabelSet, NewEmail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNREAD_LABEL: &str = "UNREAD";
pub const TRASH_LABEL: &str = "TRASH";
pub const IMPORTANT_LABEL: &str = "IMPORTANT";

/// Upper bound applied to a single trashed-message fetch.
pub const TRASHED_FETCH_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mailbox error: {message}")]
pub struct MailboxError {
    pub message: String,
}

impl MailboxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One message as reported by the remote mailbox, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageObservation {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub date: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub importance: Option<String>,
}

impl MessageObservation {
    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|id| id == label)
    }

    pub fn is_unread(&self) -> bool {
        self.has_label(UNREAD_LABEL)
    }

    pub fn is_trashed(&self) -> bool {
        self.has_label(TRASH_LABEL)
    }

    pub fn is_important(&self) -> bool {
        self.importance
            .as_deref()
            .map(str::trim)
            .is_some_and(|value| value.eq_ignore_ascii_case("high"))
    }

    pub fn labels(&self) -> LabelSet {
        let mut labels = LabelSet::from_labels(&self.label_ids);
        if self.is_important() {
            labels.insert(IMPORTANT_LABEL);
        }
        labels
    }

    pub fn to_new_email(&self) -> NewEmail {
        NewEmail {
            subject: self.subject.clone(),
            body: self.snippet.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            sent_date: self.date.clone(),
            sender: self.from.clone(),
            read: !self.is_unread(),
            deleted: self.is_trashed(),
            labels: self.labels(),
        }
    }

    /// Whether the message was sent strictly before `cutoff`. Unparseable dates never match.
    pub fn sent_before(&self, cutoff: NaiveDate) -> bool {
        normalize_sent_date(&self.date)
            .map(|sent_at| sent_at.date() < cutoff)
            .unwrap_or(false)
    }

    pub fn parse_snapshot(raw: &str) -> Result<Vec<Self>, MailboxError> {
        serde_json::from_str(raw)
            .map_err(|err| MailboxError::new(format!("snapshot parse error: {err}")))
    }
}

/// Supplies already-fetched observations; authentication and paging live behind it.
pub trait MailboxSource {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<MessageObservation>, MailboxError>;

    fn fetch_trashed_before(
        &self,
        cutoff: NaiveDate,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MailboxError>;
}
