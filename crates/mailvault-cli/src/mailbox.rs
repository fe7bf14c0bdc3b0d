use chrono::NaiveDate;
use mailvault_core::mailbox::{MailboxError, MailboxSource, MessageObservation};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Mailbox backed by a JSON array of observations exported ahead of time.
#[derive(Debug, Clone)]
pub struct SnapshotMailbox {
    path: PathBuf,
}

impl SnapshotMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Vec<MessageObservation>, MailboxError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            MailboxError::new(format!(
                "unable to read mailbox snapshot {}: {err}",
                self.path.display()
            ))
        })?;
        let observations = MessageObservation::parse_snapshot(&raw)?;
        debug!(path = %self.path.display(), count = observations.len(), "snapshot loaded");
        Ok(observations)
    }
}

impl MailboxSource for SnapshotMailbox {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<MessageObservation>, MailboxError> {
        let mut observations = self.load()?;
        observations.truncate(limit);
        Ok(observations)
    }

    fn fetch_trashed_before(
        &self,
        cutoff: NaiveDate,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MailboxError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|observation| observation.is_trashed() && observation.sent_before(cutoff))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SNAPSHOT: &str = r#"[
  {"messageId": "m1", "subject": "Fresh", "from": "a@x", "to": "me@x",
   "date": "Tue, 10 Jan 2023 09:00:00 +0000", "labelIds": ["INBOX", "UNREAD"]},
  {"messageId": "m2", "subject": "Old promo", "from": "shop@x", "to": "me@x",
   "date": "Mon, 02 Jan 2023 09:00:00 +0000", "labelIds": ["TRASH", "CATEGORY_PROMOTIONS"]},
  {"messageId": "m3", "subject": "Recent trash", "from": "b@x", "to": "me@x",
   "date": "Tue, 10 Jan 2023 09:00:00 +0000", "labelIds": ["TRASH"]}
]"#;

    fn snapshot_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp snapshot");
        file.write_all(SNAPSHOT.as_bytes()).expect("write snapshot");
        file
    }

    #[test]
    fn recent_fetch_respects_limit_and_order() {
        let file = snapshot_file();
        let mailbox = SnapshotMailbox::new(file.path());

        let recent = mailbox.fetch_recent(2).expect("fetch recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message_id, "m1");
        assert_eq!(recent[1].message_id, "m2");
    }

    #[test]
    fn trashed_fetch_filters_by_cutoff() {
        let file = snapshot_file();
        let mailbox = SnapshotMailbox::new(file.path());
        let cutoff = NaiveDate::from_ymd_opt(2023, 1, 5).expect("date");

        let trashed = mailbox.fetch_trashed_before(cutoff, 50).expect("fetch trashed");
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].subject, "Old promo");
    }

    #[test]
    fn missing_snapshot_is_a_mailbox_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mailbox = SnapshotMailbox::new(dir.path().join("nope.json"));
        let err = mailbox.fetch_recent(10).expect_err("missing file");
        assert!(err.to_string().contains("unable to read mailbox snapshot"));
    }
}
