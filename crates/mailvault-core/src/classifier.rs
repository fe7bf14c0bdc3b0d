use crate::StoredEmail;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("classifier is not configured")]
    NotConfigured,
    #[error("failed to start classifier: {0}")]
    Spawn(String),
    #[error("classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("no answer found")]
    EmptyAnswer,
}

/// Turns a prompt into a free-text disposition recommendation.
pub trait DispositionAdapter {
    fn recommend(&self, prompt: &str) -> Result<String, ClassifierError>;
}

pub fn disposition_prompt(email: &StoredEmail) -> String {
    format!(
        "You are triaging a mailbox and must decide whether a message belongs in the trash folder. \
Messages carry labels such as UNREAD, CATEGORY_UPDATES, CATEGORY_PROMOTIONS, CATEGORY_PERSONAL, \
CATEGORY_SOCIAL and CATEGORY_FORUMS. Trash usually holds promotional, spam or otherwise unimportant mail.

Look at the subject, recipients, sender and labels below and decide whether this message should be moved to trash.

Message:
Subject: {subject}
To: {to}
From: {from}
Labels: {labels}

Answer with the single label you consider most appropriate.
",
        subject = email.subject,
        to = email.to,
        from = email.from,
        labels = email.labels,
    )
}

/// Only the first non-blank line of a completion counts as the answer.
pub fn first_answer_line(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

pub fn recommend_disposition(
    adapter: &dyn DispositionAdapter,
    email: &StoredEmail,
) -> Result<String, ClassifierError> {
    let raw = adapter.recommend(&disposition_prompt(email))?;
    first_answer_line(&raw).ok_or(ClassifierError::EmptyAnswer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelSet;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::cell::RefCell;

    struct CannedAdapter {
        answer: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl DispositionAdapter for CannedAdapter {
        fn recommend(&self, prompt: &str) -> Result<String, ClassifierError> {
            self.seen.borrow_mut().push(prompt.to_string());
            Ok(self.answer.to_string())
        }
    }

    fn stored() -> StoredEmail {
        StoredEmail {
            id: 7,
            subject: "Why screen healthy people?".to_string(),
            body: String::new(),
            from: "newsletter@outofpocket.health".to_string(),
            to: "me@example.com".to_string(),
            cc: String::new(),
            bcc: String::new(),
            sent_at: NaiveDate::from_ymd_opt(2023, 4, 3)
                .and_then(|day| day.and_hms_opt(8, 0, 0))
                .expect("sent_at"),
            sender: "newsletter@outofpocket.health".to_string(),
            read: false,
            deleted: false,
            labels: LabelSet::parse("UNREAD, CATEGORY_UPDATES, INBOX"),
            created_at: Utc
                .with_ymd_and_hms(2023, 4, 4, 0, 0, 0)
                .single()
                .expect("created_at"),
        }
    }

    #[test]
    fn prompt_carries_message_fields() {
        let prompt = disposition_prompt(&stored());
        assert!(prompt.contains("Subject: Why screen healthy people?"));
        assert!(prompt.contains("To: me@example.com"));
        assert!(prompt.contains("From: newsletter@outofpocket.health"));
        assert!(prompt.contains("Labels: UNREAD,CATEGORY_UPDATES,INBOX"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn recommendation_keeps_first_non_empty_line() {
        let adapter = CannedAdapter {
            answer: "\n  TRASH \nbecause it is promotional",
            seen: RefCell::new(Vec::new()),
        };
        let answer = recommend_disposition(&adapter, &stored()).expect("answer");
        assert_eq!(answer, "TRASH");
        assert_eq!(adapter.seen.borrow().len(), 1);
    }

    #[test]
    fn blank_recommendation_is_an_error() {
        let adapter = CannedAdapter {
            answer: "  \n ",
            seen: RefCell::new(Vec::new()),
        };
        assert_eq!(
            recommend_disposition(&adapter, &stored()),
            Err(ClassifierError::EmptyAnswer)
        );
    }
}
