//! CSV parsing for appointment imports
//!
//! Turns the raw bytes of an uploaded CSV into [`RowRecord`]s:
//! - headers are normalized (`" Start Time "` -> `start_time`)
//! - an optional column mapping renames customer headers to our field names
//! - `start_time` / `end_time` are parsed against an ordered list of formats,
//!   optionally restricted by a [`DateFormat`] preset
//!
//! Rows whose timestamps do not parse are either dropped (default) or abort
//! the parse, depending on [`InvalidRowPolicy`].

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

// =============================================================================
// OPTIONS
// =============================================================================

/// Text encoding of the uploaded file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, decoded lossily when the bytes are not valid UTF-8
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    /// `utf-8` or `latin-1` (and the usual spellings), case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Some(TextEncoding::Latin1),
            _ => None,
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        let text = match self {
            TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(e) => {
                    warn!("CSV is not valid UTF-8 ({}), decoding lossily", e);
                    String::from_utf8_lossy(bytes).into_owned()
                }
            },
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        };

        match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        }
    }
}

/// Date format preset chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// `DD/MM/YYYY`
    DayFirst,
    /// `MM/DD/YYYY`
    MonthFirst,
    /// `YYYY-MM-DD`
    YearFirst,
    /// ISO 8601 / RFC 3339
    Iso,
}

impl DateFormat {
    /// Parse a preset name as sent by the UI (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "DD/MM/YYYY" => Some(DateFormat::DayFirst),
            "MM/DD/YYYY" => Some(DateFormat::MonthFirst),
            "YYYY-MM-DD" => Some(DateFormat::YearFirst),
            "ISO" => Some(DateFormat::Iso),
            _ => None,
        }
    }

    /// Like [`DateFormat::from_name`], but an empty or unknown name falls back
    /// to the full default format list.
    pub fn from_hint(hint: Option<&str>) -> Option<Self> {
        let name = hint.map(str::trim).filter(|h| !h.is_empty())?;
        let preset = Self::from_name(name);
        if preset.is_none() {
            warn!("Unknown date format '{}', trying all supported formats", name);
        }
        preset
    }

    pub fn name(self) -> &'static str {
        match self {
            DateFormat::DayFirst => "DD/MM/YYYY",
            DateFormat::MonthFirst => "MM/DD/YYYY",
            DateFormat::YearFirst => "YYYY-MM-DD",
            DateFormat::Iso => "ISO",
        }
    }

    fn formats(self) -> &'static [&'static str] {
        match self {
            DateFormat::DayFirst => DAY_FIRST_FORMATS,
            DateFormat::MonthFirst => MONTH_FIRST_FORMATS,
            DateFormat::YearFirst => YEAR_FIRST_FORMATS,
            DateFormat::Iso => ISO_FORMATS,
        }
    }

    fn accepts_offsets(self) -> bool {
        self == DateFormat::Iso
    }
}

/// What to do with a row whose start or end time does not parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidRowPolicy {
    /// Drop the row (logged) and keep going
    #[default]
    Skip,
    /// Fail the whole parse at the first invalid row
    Strict,
}

/// Parser configuration
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub encoding: TextEncoding,
    pub date_format: Option<DateFormat>,
    /// Our field name -> CSV header name
    pub column_mapping: BTreeMap<String, String>,
    pub invalid_rows: InvalidRowPolicy,
}

// =============================================================================
// DATE PARSING
// =============================================================================

/// Order matters: the first format that parses wins.
const DEFAULT_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m-%d-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const MONTH_FIRST_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m-%d-%Y %H:%M:%S",
];

const YEAR_FIRST_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse a CSV timestamp. Naive values are taken as UTC.
///
/// Returns `None` for empty input or when no candidate format matches.
pub fn parse_datetime(value: &str, preset: Option<DateFormat>) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if preset.map_or(true, DateFormat::accepts_offsets) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let candidates = preset.map_or(DEFAULT_FORMATS, DateFormat::formats);
    candidates
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

// =============================================================================
// ROWS
// =============================================================================

/// Lowercase, trim and replace spaces with underscores
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

/// One valid data row of the CSV
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    /// 1-based line in the source file (the header is line 1)
    pub line: usize,
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_name: String,
    pub staff_name: String,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub timezone: String,
    pub status: String,
    pub notes: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Parse failure surfaced to the caller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CsvParseError {
    #[error("Row {line}: invalid start_time or end_time (start={start:?}, end={end:?})")]
    InvalidRow {
        line: usize,
        start: String,
        end: String,
    },

    #[error("CSV read error near line {line}: {message}")]
    Read { line: usize, message: String },
}

impl CsvParseError {
    pub fn line(&self) -> usize {
        match self {
            CsvParseError::InvalidRow { line, .. } | CsvParseError::Read { line, .. } => *line,
        }
    }
}

/// Parse `bytes` into a lazy sequence of rows.
///
/// The iterator is single-pass; parsing again requires a new call.
pub fn parse_rows(bytes: &[u8], options: &ParseOptions) -> CsvRows {
    let text = options.encoding.decode(bytes);
    let records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(text.into_bytes()))
        .into_records();

    let mut rows = CsvRows {
        records,
        headers: Vec::new(),
        mapping: Vec::new(),
        date_format: options.date_format,
        invalid_rows: options.invalid_rows,
        last_line: 1,
        pending_error: None,
        done: false,
    };

    match rows.records.next() {
        None => rows.done = true,
        Some(Err(e)) => {
            rows.pending_error = Some(CsvParseError::Read {
                line: 1,
                message: e.to_string(),
            });
        }
        Some(Ok(header)) => {
            rows.headers = header.iter().map(normalize_header).collect();
            rows.mapping = options
                .column_mapping
                .iter()
                .map(|(field, header)| (normalize_header(field), normalize_header(header)))
                .collect();
        }
    }

    rows
}

/// Lazy iterator over the data rows of a CSV, see [`parse_rows`]
pub struct CsvRows {
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    headers: Vec<String>,
    mapping: Vec<(String, String)>,
    date_format: Option<DateFormat>,
    invalid_rows: InvalidRowPolicy,
    last_line: usize,
    pending_error: Option<CsvParseError>,
    done: bool,
}

impl CsvRows {
    /// Normalized header names, in column order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn cells(&self, record: &csv::StringRecord) -> HashMap<String, String> {
        // Shorter rows are padded with empty values, extra columns ignored
        let mut cells: HashMap<String, String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), record.get(idx).unwrap_or("").trim().to_string()))
            .collect();

        let overrides: Vec<(String, String)> = self
            .mapping
            .iter()
            .filter_map(|(field, header)| cells.get(header).map(|v| (field.clone(), v.clone())))
            .collect();
        cells.extend(overrides);

        cells
    }

    fn build_row(&self, line: usize, mut cells: HashMap<String, String>) -> Result<RowRecord, CsvParseError> {
        let mut take = |key: &str| cells.remove(key).unwrap_or_default();
        let optional = |value: String| Some(value).filter(|v| !v.is_empty());

        let start_raw = take("start_time");
        let end_raw = take("end_time");

        let (start, end) = match (
            parse_datetime(&start_raw, self.date_format),
            parse_datetime(&end_raw, self.date_format),
        ) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(CsvParseError::InvalidRow {
                    line,
                    start: start_raw,
                    end: end_raw,
                })
            }
        };

        Ok(RowRecord {
            line,
            id: take("id"),
            name: take("name"),
            email: take("email"),
            phone: take("phone"),
            service_name: take("service_name"),
            staff_name: take("staff_name"),
            service_id: optional(take("service_id")),
            staff_id: optional(take("staff_id")),
            timezone: take("timezone"),
            status: take("status"),
            notes: take("notes"),
            start,
            end,
        })
    }
}

impl Iterator for CsvRows {
    type Item = Result<RowRecord, CsvParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            self.done = true;
            return Some(Err(err));
        }

        while !self.done {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    self.done = true;
                    return Some(Err(CsvParseError::Read {
                        line: self.last_line + 1,
                        message: e.to_string(),
                    }));
                }
            };

            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(self.last_line + 1);
            self.last_line = line;

            let cells = self.cells(&record);
            match self.build_row(line, cells) {
                Ok(row) => return Some(Ok(row)),
                Err(err) => match self.invalid_rows {
                    InvalidRowPolicy::Skip => {
                        warn!("Skipping {}", err);
                    }
                    InvalidRowPolicy::Strict => {
                        self.done = true;
                        return Some(Err(err));
                    }
                },
            }
        }

        None
    }
}

/// Read the raw header row, for building a column mapping in the UI.
///
/// Returns `None` for an empty file.
pub fn detect_headers(bytes: &[u8]) -> Option<Vec<String>> {
    let text = TextEncoding::Utf8.decode(bytes);
    // The csv reader skips blank lines, so a blank first line would promote
    // the next row to header
    if text.lines().next().map_or(true, str::is_empty) {
        return None;
    }

    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(text.into_bytes()))
        .into_records();

    match records.next() {
        Some(Ok(header)) if !header.is_empty() => {
            Some(header.iter().map(str::to_string).collect())
        }
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
