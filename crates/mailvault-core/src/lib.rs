pub mod classifier;
pub mod mailbox;
pub mod sent_date;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use sent_date::{normalize_sent_date, SentDateError, CANONICAL_SENT_DATE_FORMAT};

/// The two disjoint collections a record can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSet {
    Active,
    Deleted,
}

impl RecordSet {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordSet::Active => "active",
            RecordSet::Deleted => "deleted",
        }
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordSet {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "active" | "inbox" | "emails" => Ok(RecordSet::Active),
            "deleted" | "trash" | "deleted_emails" => Ok(RecordSet::Deleted),
            other => Err(format!("Unknown record set: {other}")),
        }
    }
}

/// Unordered collection of label tags, persisted as one comma-joined string.
///
/// Parsing trims whitespace around each tag, drops empty tags and keeps the
/// first occurrence of duplicates, so `"INBOX, UNREAD,INBOX"` and
/// `"INBOX,UNREAD"` describe the same set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub const DELIMITER: char = ',';

    pub fn parse(raw: &str) -> Self {
        Self::from_labels(raw.split(Self::DELIMITER))
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for label in labels {
            set.insert(label.as_ref());
        }
        set
    }

    /// Adds a tag unless it is blank or already present. Returns whether the set changed.
    pub fn insert(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.contains(label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        let label = label.trim();
        self.labels.iter().any(|existing| existing == label)
    }

    pub fn contains_all(&self, other: &LabelSet) -> bool {
        other.iter().all(|label| self.contains(label))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for label in &self.labels {
            if !first {
                write!(f, "{}", Self::DELIMITER)?;
            }
            f.write_str(label)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for LabelSet {
    type Err = std::convert::Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(input))
    }
}

/// Identifies one logical message inside a record set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub sent_at: NaiveDateTime,
}

impl NaturalKey {
    /// Builds a key from a raw `Date` header, normalizing it first.
    pub fn from_raw(
        subject: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        raw_sent_date: &str,
    ) -> Result<Self, SentDateError> {
        Ok(Self {
            subject: subject.into(),
            from: from.into(),
            to: to.into(),
            sent_at: normalize_sent_date(raw_sent_date)?,
        })
    }

    pub fn canonical_sent_at(&self) -> String {
        self.sent_at.format(CANONICAL_SENT_DATE_FORMAT).to_string()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} from {:?} to {:?} at {}",
            self.subject,
            self.from,
            self.to,
            self.canonical_sent_at()
        )
    }
}

/// A record as handed to the store: the sent date is still the raw header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEmail {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub sent_date: String,
    pub sender: String,
    pub read: bool,
    pub deleted: bool,
    pub labels: LabelSet,
}

impl NewEmail {
    pub fn natural_key(&self) -> Result<NaturalKey, SentDateError> {
        NaturalKey::from_raw(
            self.subject.clone(),
            self.from.clone(),
            self.to.clone(),
            &self.sent_date,
        )
    }
}

/// A persisted record; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEmail {
    pub id: i64,
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub sent_at: NaiveDateTime,
    pub sender: String,
    pub read: bool,
    pub deleted: bool,
    pub labels: LabelSet,
    pub created_at: DateTime<Utc>,
}

impl StoredEmail {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            subject: self.subject.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            sent_at: self.sent_at,
        }
    }

    pub fn canonical_sent_at(&self) -> String {
        self.sent_at.format(CANONICAL_SENT_DATE_FORMAT).to_string()
    }
}
