//! Message metadata extraction.
//!
//! The only metadata the migration needs is the internal date handed to IMAP
//! APPEND, which is taken from the message's own `Date` header.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use log::debug;
use mail_parser::{HeaderName, MessageParser};

use super::error::{EmailError, Result};

/// Timestamp assigned to an appended message, keeping the sender's UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalDate(DateTime<FixedOffset>);

impl InternalDate {
    pub fn new(datetime: DateTime<FixedOffset>) -> Self {
        Self(datetime)
    }

    pub fn datetime(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// Formats the date as an IMAP `date-time` (RFC 3501), without quotes.
    pub fn to_imap(&self) -> String {
        self.0.format("%d-%b-%Y %H:%M:%S %z").to_string()
    }

    /// The quoted form sent as the date argument of an APPEND command.
    pub fn to_append_argument(&self) -> String {
        format!("\"{}\"", self.to_imap())
    }
}

impl fmt::Display for InternalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_imap())
    }
}

/// Capability that derives the internal date of a raw message.
pub trait MetadataReader: Send + Sync {
    fn internal_date(&self, raw_message: &[u8]) -> Result<InternalDate>;
}

/// [`MetadataReader`] backed by `mail-parser`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MailParserMetadataReader;

impl MetadataReader for MailParserMetadataReader {
    fn internal_date(&self, raw_message: &[u8]) -> Result<InternalDate> {
        let message = MessageParser::default()
            .parse_headers(raw_message)
            .ok_or_else(|| EmailError::DateExtraction("message headers are unreadable".into()))?;

        let Some(date) = message.date() else {
            return match message.header_raw(HeaderName::Date) {
                Some(raw) => Err(EmailError::DateExtraction(format!(
                    "unparsable Date header '{}'",
                    raw.trim()
                ))),
                None => Err(EmailError::DateExtraction("Date header is missing".into())),
            };
        };

        let internal = convert_date(date).ok_or_else(|| {
            EmailError::DateExtraction(format!(
                "Date header out of range: {}",
                date.to_rfc3339()
            ))
        })?;
        debug!("Extracted internal date {}", internal);
        Ok(internal)
    }
}

fn convert_date(date: &mail_parser::DateTime) -> Option<InternalDate> {
    let offset_secs = (date.tz_hour as i32 * 3600) + (date.tz_minute as i32 * 60);
    let offset = if date.tz_before_gmt {
        FixedOffset::west_opt(offset_secs)?
    } else {
        FixedOffset::east_opt(offset_secs)?
    };

    let day = NaiveDate::from_ymd_opt(date.year as i32, date.month as u32, date.day as u32)?;
    // Leap seconds are clamped rather than rejected.
    let time = NaiveTime::from_hms_opt(
        date.hour as u32,
        date.minute as u32,
        (date.second as u32).min(59),
    )?;

    offset
        .from_local_datetime(&day.and_time(time))
        .single()
        .map(InternalDate::new)
}
