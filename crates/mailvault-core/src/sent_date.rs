//! Normalization of `Date` header values into the canonical stored form.
//!
//! Headers are tried against [`KNOWN_FORMATS`] top to bottom and the first
//! format that parses wins. The offset is used to validate the header but is
//! not kept: the canonical value is the sender's wall-clock time.
//!
//! A leading weekday is only checked for spelling, never against the date,
//! since mailers do send headers like `Tue, 02 Jan 2006` for a Monday.
//! Beyond the RFC 822 shapes, `%z` also accepts a colon offset (`-07:00`)
//! and RFC 3339 timestamps are accepted as a last resort.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use thiserror::Error;

pub const CANONICAL_SENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentDateError {
    #[error("unable to parse date string: {0:?}")]
    Unparseable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentDateLayout {
    Strftime(&'static str),
    Rfc3339,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentDateFormat {
    pub name: &'static str,
    pub layout: SentDateLayout,
    /// Expects a leading `Mon, `-style weekday in front of the layout.
    pub weekday: bool,
    /// Expects a trailing parenthesised zone abbreviation such as `(UTC)`.
    pub zone_comment: bool,
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const RFC822_LAYOUT: &str = "%d %b %Y %H:%M:%S %z";

// `%d` accepts one- or two-digit days, so each RFC 822 shape covers both.
pub const KNOWN_FORMATS: &[SentDateFormat] = &[
    SentDateFormat {
        name: "rfc822-weekday",
        layout: SentDateLayout::Strftime(RFC822_LAYOUT),
        weekday: true,
        zone_comment: false,
    },
    SentDateFormat {
        name: "rfc822-weekday-zone-comment",
        layout: SentDateLayout::Strftime(RFC822_LAYOUT),
        weekday: true,
        zone_comment: true,
    },
    SentDateFormat {
        name: "rfc822",
        layout: SentDateLayout::Strftime(RFC822_LAYOUT),
        weekday: false,
        zone_comment: false,
    },
    SentDateFormat {
        name: "rfc822-zone-comment",
        layout: SentDateLayout::Strftime(RFC822_LAYOUT),
        weekday: false,
        zone_comment: true,
    },
    SentDateFormat {
        name: "rfc3339",
        layout: SentDateLayout::Rfc3339,
        weekday: false,
        zone_comment: false,
    },
];

impl SentDateFormat {
    pub fn parse(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        let input = if self.zone_comment {
            strip_zone_comment(input)?
        } else {
            input
        };
        let input = if self.weekday {
            strip_weekday(input)?
        } else {
            input
        };
        match self.layout {
            SentDateLayout::Strftime(layout) => DateTime::parse_from_str(input, layout).ok(),
            SentDateLayout::Rfc3339 => DateTime::parse_from_rfc3339(input).ok(),
        }
    }
}

pub fn normalize_sent_date(raw: &str) -> Result<NaiveDateTime, SentDateError> {
    let trimmed = raw.trim();
    KNOWN_FORMATS
        .iter()
        .find_map(|format| format.parse(trimmed))
        .map(|parsed| parsed.naive_local())
        .ok_or_else(|| SentDateError::Unparseable(raw.to_string()))
}

fn strip_weekday(input: &str) -> Option<&str> {
    let (weekday, rest) = input.split_once(',')?;
    WEEKDAYS
        .contains(&weekday)
        .then(|| rest.trim_start())
}

fn strip_zone_comment(input: &str) -> Option<&str> {
    let body = input.strip_suffix(')')?;
    let open = body.rfind('(')?;
    let abbreviation = &body[open + 1..];
    if abbreviation.is_empty()
        || !abbreviation
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '+' || ch == '-')
    {
        return None;
    }
    Some(body[..open].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_sent_date(raw: &str) -> Result<String, SentDateError> {
        normalize_sent_date(raw)
            .map(|sent_at| sent_at.format(CANONICAL_SENT_DATE_FORMAT).to_string())
    }

    #[test]
    fn equivalent_variants_share_one_canonical_value() {
        for raw in [
            "Mon, 02 Jan 2006 15:04:05 -0700",
            "Mon, 2 Jan 2006 15:04:05 -0700",
            "Mon, 02 Jan 2006 15:04:05 -0700 (MST)",
            "Mon, 2 Jan 2006 15:04:05 -0700 (MST)",
            "2 Jan 2006 15:04:05 -0700",
            "  Mon, 02 Jan 2006 15:04:05 -0700\r\n",
        ] {
            assert_eq!(
                canonical_sent_date(raw).expect(raw),
                "2006-01-02 15:04:05",
                "{raw}"
            );
        }
    }

    #[test]
    fn header_samples_from_real_mailboxes_parse() {
        let cases = [
            ("Sat, 1 Apr 2023 12:37:18 +0000", "2023-04-01 12:37:18"),
            ("Mon, 03 Apr 2023 18:15:16 +0000 (UTC)", "2023-04-03 18:15:16"),
            ("3 Apr 2023 01:14:34 -0500", "2023-04-03 01:14:34"),
            ("Tue, 4 Apr 2023 00:17:49 +0000 (UTC)", "2023-04-04 00:17:49"),
            ("Mon, 3 Apr 2023 12:17:07 -0400 (EDT)", "2023-04-03 12:17:07"),
            ("2023-04-03T08:58:29-04:00", "2023-04-03 08:58:29"),
            ("2023-04-03T08:00:00Z", "2023-04-03 08:00:00"),
        ];
        for (raw, expected) in cases {
            assert_eq!(canonical_sent_date(raw).expect(raw), expected);
        }
    }

    #[test]
    fn offset_is_discarded_not_applied() {
        let east = normalize_sent_date("Mon, 02 Jan 2006 15:04:05 +0900").expect("east");
        let west = normalize_sent_date("Mon, 02 Jan 2006 15:04:05 -0700").expect("west");
        assert_eq!(east, west);
    }

    #[test]
    fn unknown_formats_are_rejected() {
        for raw in [
            "",
            "yesterday",
            "2023/04/03 08:00",
            "Mon, 02 Jan 2006 15:04:05",
            "Mon, 02 Jan 2006 15:04:05 -0700 ()",
            "Mon, 02 Jan 2006 15:04:05 -0700 (not a zone)",
            "Monday, 02 Jan 2006 15:04:05 -0700",
            "mon, 02 Jan 2006 15:04:05 -0700",
        ] {
            assert_eq!(
                normalize_sent_date(raw),
                Err(SentDateError::Unparseable(raw.to_string())),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn weekday_is_not_checked_against_the_date() {
        // 2 Jan 2006 was a Monday.
        for raw in [
            "Tue, 02 Jan 2006 15:04:05 -0700",
            "Sun, 2 Jan 2006 15:04:05 -0700 (MST)",
        ] {
            assert_eq!(canonical_sent_date(raw).expect(raw), "2006-01-02 15:04:05");
        }
    }

    #[test]
    fn colon_offset_is_accepted() {
        assert_eq!(
            canonical_sent_date("Mon, 02 Jan 2006 15:04:05 -07:00").expect("colon offset"),
            "2006-01-02 15:04:05"
        );
    }

    #[test]
    fn first_matching_format_wins() {
        let raw = "Mon, 03 Apr 2023 18:15:16 +0000 (UTC)";
        let matched = KNOWN_FORMATS
            .iter()
            .find(|format| format.parse(raw).is_some())
            .expect("a format matches");
        assert_eq!(matched.name, "rfc822-weekday-zone-comment");
    }
}
