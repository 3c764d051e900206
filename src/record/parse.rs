//! Row parsing for the install/remove event log.
//!
//! The log is a headered CSV with seven positional columns:
//! `device_serial, slot_location, install_datetime, remove_datetime,
//! duration_seconds, seen_after_remove, event_type`. Empty strings denote
//! absent optional fields.

use std::io;

use thiserror::Error;

use super::event::{EventRecord, EventType};
use crate::clock::{TimeError, Timestamp};

/// Number of columns in one log row.
pub const COLUMN_COUNT: usize = 7;

const COL_SERIAL: usize = 0;
const COL_LOCATION: usize = 1;
const COL_INSTALL: usize = 2;
const COL_REMOVE: usize = 3;
const COL_DURATION: usize = 4;
const COL_SEEN: usize = 5;
const COL_EVENT: usize = 6;

/// Errors that can occur while parsing a single row.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("expected 7 columns, found {found}")]
    ColumnCount { found: usize },

    #[error("empty device serial")]
    EmptySerial,

    #[error("unknown event type: {raw:?}")]
    UnknownEventType { raw: String },

    #[error("reading {field}: {source}")]
    InvalidTimestamp {
        field: &'static str,
        #[source]
        source: TimeError,
    },

    #[error("invalid duration_seconds: {raw:?}")]
    InvalidDuration { raw: String },

    #[error("invalid seen_after_remove flag: {raw:?}")]
    InvalidFlag { raw: String },

    #[error("reading row: {0}")]
    Csv(#[from] csv::Error),
}

/// Parse one row's fields into an [`EventRecord`].
pub fn parse_row<S: AsRef<str>>(fields: &[S]) -> Result<EventRecord, ParseError> {
    if fields.len() != COLUMN_COUNT {
        return Err(ParseError::ColumnCount {
            found: fields.len(),
        });
    }

    let field = |idx: usize| fields.get(idx).map(|f| f.as_ref().trim()).unwrap_or("");

    let device_serial = field(COL_SERIAL);
    if device_serial.is_empty() {
        return Err(ParseError::EmptySerial);
    }

    let event_raw = field(COL_EVENT);
    let event_type = EventType::from_column(event_raw).ok_or_else(|| {
        ParseError::UnknownEventType {
            raw: event_raw.to_string(),
        }
    })?;

    Ok(EventRecord {
        device_serial: device_serial.to_string(),
        slot_location: field(COL_LOCATION).to_string(),
        install_time: parse_optional_timestamp(field(COL_INSTALL), "install_datetime")?,
        remove_time: parse_optional_timestamp(field(COL_REMOVE), "remove_datetime")?,
        duration_seconds: parse_duration(field(COL_DURATION))?,
        seen_after_remove: parse_flag(field(COL_SEEN))?,
        event_type,
    })
}

fn parse_optional_timestamp(
    raw: &str,
    field: &'static str,
) -> Result<Option<Timestamp>, ParseError> {
    if raw.is_empty() {
        return Ok(None);
    }
    Timestamp::parse(raw)
        .map(Some)
        .map_err(|source| ParseError::InvalidTimestamp { field, source })
}

fn parse_duration(raw: &str) -> Result<Option<i64>, ParseError> {
    if raw.is_empty() {
        return Ok(None);
    }
    // Some exports write whole seconds as floats ("3600.0").
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(Some(v));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(ParseError::InvalidDuration {
            raw: raw.to_string(),
        }),
    }
}

fn parse_flag(raw: &str) -> Result<Option<bool>, ParseError> {
    match raw.to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "t" | "1" => Ok(Some(true)),
        "false" | "f" | "0" => Ok(Some(false)),
        _ => Err(ParseError::InvalidFlag {
            raw: raw.to_string(),
        }),
    }
}

/// One parsed row with its 1-based line number in the source file.
#[derive(Debug)]
pub struct ParsedRow {
    pub line: u64,
    pub result: Result<EventRecord, ParseError>,
}

/// Iterator over the rows of an event log. The header row is skipped.
pub struct LogRows<R: io::Read> {
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: io::Read> LogRows<R> {
    /// Wrap a reader positioned at the header row.
    pub fn new(reader: R) -> Self {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self {
            records: rdr.into_records(),
        }
    }
}

impl<R: io::Read> Iterator for LogRows<R> {
    type Item = ParsedRow;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.records.next()?;
        let row = match next {
            Ok(record) => ParsedRow {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                result: parse_row(record.iter().collect::<Vec<_>>().as_slice()),
            },
            Err(e) => ParsedRow {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                result: Err(ParseError::Csv(e)),
            },
        };
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: [&str; COLUMN_COUNT]) -> Result<EventRecord, ParseError> {
        parse_row(&fields)
    }

    #[test]
    fn test_parse_failure_row() {
        let rec = row([
            "0323712345678",
            "c0-0c0s0n0",
            "2014-01-10 08:00:00",
            "2015-03-02 10:15:00",
            "36468900",
            "false",
            "DBE",
        ])
        .expect("valid row");

        assert_eq!(rec.device_serial, "0323712345678");
        assert_eq!(rec.slot_location, "c0-0c0s0n0");
        assert_eq!(rec.event_type, EventType::Dbe);
        assert!(rec.install_time.is_some());
        assert!(rec.remove_time.is_some());
        assert_eq!(rec.duration_seconds, Some(36_468_900));
        assert_eq!(rec.seen_after_remove, Some(false));
    }

    #[test]
    fn test_parse_clean_row_with_absent_fields() {
        let rec = row(["S1", "c1-0c2s3n1", "2016-02-01 00:00:00", "", "", "", ""])
            .expect("valid row");
        assert_eq!(rec.event_type, EventType::Clean);
        assert!(rec.remove_time.is_none());
        assert!(rec.duration_seconds.is_none());
        assert!(rec.seen_after_remove.is_none());
    }

    #[test]
    fn test_missing_remove_time_is_not_a_parse_error() {
        let rec = row(["S1", "c1-0c2s3n1", "", "", "", "", "OTB"]).expect("valid row");
        assert_eq!(rec.event_type, EventType::Otb);
        assert!(rec.install_time.is_none());
        assert!(rec.remove_time.is_none());
    }

    #[test]
    fn test_rejects_unknown_event_type() {
        let err = row(["S1", "L", "", "2016-02-01 00:00:00", "", "", "XID"])
            .expect_err("unknown type");
        assert!(matches!(err, ParseError::UnknownEventType { .. }));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let err = row(["S1", "L", "2016-02-01", "", "", "", ""]).expect_err("bad ts");
        assert!(err.to_string().contains("install_datetime"));
    }

    #[test]
    fn test_rejects_wrong_column_count() {
        let err = parse_row(&["S1", "L"]).expect_err("short row");
        assert!(matches!(err, ParseError::ColumnCount { found: 2 }));
    }

    #[test]
    fn test_duration_accepts_integral_float() {
        assert_eq!(parse_duration("3600.0").expect("integral"), Some(3600));
        assert!(parse_duration("1.5").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_log_rows_skips_header_and_reports_lines() {
        let data = "serial,location,insert,remove,duration,seen,event\n\
                    S1,L1,2014-01-01 00:00:00,,,,\n\
                    S1,L1,,2014-02-01 00:00:00,,,DBE\n\
                    S2,L2\n";
        let rows: Vec<ParsedRow> = LogRows::new(data.as_bytes()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert!(rows[0].result.is_ok());
        assert!(rows[1].result.is_ok());
        assert!(matches!(
            rows[2].result,
            Err(ParseError::ColumnCount { found: 2 })
        ));
    }
}
