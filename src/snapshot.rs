//! Task snapshots: CSV parsing, validation and serialization.
//!
//! A snapshot is the header plus the ordered task rows of one CSV file. Every
//! row is validated on load (dates, completion flag) and carries both its raw
//! field values, written back out untouched, and a normalized [`RowKey`] used
//! for whole-row comparison.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};

pub const OWNER: &str = "owner";
pub const CREATE_DATE: &str = "create date";
pub const DUE_DATE: &str = "due date";
pub const COMPLETE_DATE: &str = "date completed";
pub const COMPLETE: &str = "complete";

/// Columns every snapshot must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [OWNER, CREATE_DATE, DUE_DATE, COMPLETE_DATE, COMPLETE];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// %y must come before %Y so two-digit years are not read as year 24.
const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

/// Parse the date forms seen in exported action sheets.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parse a boolean-like completion flag.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Canonical column name used for lookup and row keys.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Order-independent identity of a row: `(column, normalized value)` pairs
/// sorted by column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(Vec<(String, String)>);

/// One validated task row.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    /// 1-based line in the source CSV (header is line 1)
    pub line: u64,
    pub owner: String,
    pub create_date: NaiveDate,
    pub due_date: NaiveDate,
    pub complete_date: Option<NaiveDate>,
    pub complete: bool,
    #[serde(skip)]
    raw: Vec<String>,
    #[serde(skip)]
    key: RowKey,
}

impl TaskRow {
    /// Field values exactly as read, in header order
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn key(&self) -> &RowKey {
        &self.key
    }
}

impl PartialEq for TaskRow {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TaskRow {}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    owner: usize,
    create_date: usize,
    due_date: usize,
    complete_date: usize,
    complete: usize,
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| normalize_column(header) == name)
                .ok_or_else(|| Error::MissingColumn(name.to_string()))
        };
        Ok(Self {
            owner: find(OWNER)?,
            create_date: find(CREATE_DATE)?,
            due_date: find(DUE_DATE)?,
            complete_date: find(COMPLETE_DATE)?,
            complete: find(COMPLETE)?,
        })
    }
}

/// Header plus ordered rows of one CSV table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    headers: Vec<String>,
    rows: Vec<TaskRow>,
}

impl Snapshot {
    /// An empty snapshot with the required columns as header
    pub fn empty() -> Self {
        Self {
            headers: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Parse and validate CSV bytes.
    ///
    /// A blank input is an empty snapshot. Otherwise the header must carry
    /// every required column and every row must parse.
    pub fn from_csv(data: &[u8]) -> Result<Self> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::empty());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::None)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut seen = BTreeSet::new();
        for header in &headers {
            if !seen.insert(normalize_column(header)) {
                return Err(Error::SchemaMismatch(format!(
                    "duplicate column '{}'",
                    header.trim()
                )));
            }
        }

        let index = ColumnIndex::resolve(&headers)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let raw: Vec<String> = record.iter().map(str::to_string).collect();
            if raw.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            rows.push(parse_row(&headers, index, line, raw)?);
        }

        Ok(Self { headers, rows })
    }

    /// Read and validate a CSV file from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_csv(&data)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[TaskRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Normalized column names, order-free
    pub fn column_set(&self) -> BTreeSet<String> {
        self.headers.iter().map(|h| normalize_column(h)).collect()
    }

    /// A snapshot with this header and the given rows
    pub fn with_rows(&self, rows: Vec<TaskRow>) -> Self {
        Self {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Serialize header and raw row values back to CSV.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(&row.raw)?;
        }
        writer
            .into_inner()
            .map_err(|err| Error::OperationFailed(format!("csv flush failed: {err}")))
    }
}

fn parse_row(headers: &[String], index: ColumnIndex, line: u64, raw: Vec<String>) -> Result<TaskRow> {
    let field = |idx: usize| raw.get(idx).map(String::as_str).unwrap_or("");
    let invalid = |idx: usize| Error::InvalidRow {
        line,
        column: normalize_column(&headers[idx]),
        value: field(idx).to_string(),
    };

    let owner = field(index.owner).trim().to_string();
    let create_date = parse_date(field(index.create_date)).ok_or_else(|| invalid(index.create_date))?;
    let due_date = parse_date(field(index.due_date)).ok_or_else(|| invalid(index.due_date))?;
    let complete_date = if field(index.complete_date).trim().is_empty() {
        None
    } else {
        Some(parse_date(field(index.complete_date)).ok_or_else(|| invalid(index.complete_date))?)
    };
    let complete = parse_flag(field(index.complete)).ok_or_else(|| invalid(index.complete))?;

    let mut pairs: Vec<(String, String)> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let value = if idx == index.create_date {
                create_date.to_string()
            } else if idx == index.due_date {
                due_date.to_string()
            } else if idx == index.complete_date {
                complete_date.map(|d| d.to_string()).unwrap_or_default()
            } else if idx == index.complete {
                complete.to_string()
            } else {
                field(idx).trim().to_string()
            };
            (normalize_column(header), value)
        })
        .collect();
    pairs.sort();

    Ok(TaskRow {
        line,
        owner,
        create_date,
        due_date,
        complete_date,
        complete,
        raw,
        key: RowKey(pairs),
    })
}
