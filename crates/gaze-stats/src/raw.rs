//! Raw gaze sample files.
//!
//! The capture software writes one row per reading with a fixed column order
//! and no guaranteed header. A header row is written at the start of every
//! recording session, so they can appear anywhere in a file that concatenates
//! several sessions.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::{require_file, AnalysisError, Result};

pub const COL_LABEL: usize = 0;
pub const COL_SUBJECT: usize = 1;
pub const COL_TRACKER: usize = 2;
pub const COL_TIMESTAMP: usize = 3;
pub const COL_TARGET_ID: usize = 4;
pub const COL_TARGET_X: usize = 5;
pub const COL_TARGET_Y: usize = 6;
pub const COL_CURSOR_X: usize = 7;
pub const COL_CURSOR_Y: usize = 8;
pub const COL_RIGHT_X: usize = 9;
pub const COL_RIGHT_Y: usize = 10;
pub const COL_LEFT_X: usize = 11;
pub const COL_LEFT_Y: usize = 12;
pub const NUM_COLUMNS: usize = 13;

const COLUMN_NAMES: [&str; NUM_COLUMNS] = [
    "Label",
    "Subject",
    "Tracker",
    "Timestamp",
    "Target-ID",
    "Target-X",
    "Target-Y",
    "Cursor-X",
    "Cursor-Y",
    "Actual-X-Right",
    "Actual-Y-Right",
    "Actual-X-Left",
    "Actual-Y-Left",
];

/// One recorded reading
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Position label, e.g. "mf - top" or "near_chinrest"
    pub label: String,
    pub subject: String,
    pub tracker: String,
    pub timestamp: String,
    pub target_id: u32,
    pub target: (i64, i64),
    pub cursor: (i64, i64),
    pub right_eye: (i64, i64),
    pub left_eye: (i64, i64),
}

/// A row of a raw sample file
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Column names or session metadata; marks the start of a session
    Header(Vec<String>),
    Sample(RawSample),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Data,
}

/// Classify a row as header or data.
///
/// A row is a header when its final field is not an integer. This is a
/// heuristic: a data row truncated or corrupted in its last column is
/// indistinguishable from a header and will be skipped as one.
pub fn classify_row(record: &StringRecord) -> RowKind {
    match record.iter().last() {
        Some(last) if last.trim().parse::<i64>().is_ok() => RowKind::Data,
        _ => RowKind::Header,
    }
}

fn field<'a>(record: &'a StringRecord, index: usize) -> Result<&'a str> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| AnalysisError::MissingColumn(COLUMN_NAMES[index].to_string()))
}

fn int_field(record: &StringRecord, index: usize) -> Result<i64> {
    let value = field(record, index)?;
    value
        .parse::<i64>()
        .map_err(|_| AnalysisError::invalid_field(COLUMN_NAMES[index], value))
}

fn pair(record: &StringRecord, x: usize, y: usize) -> Result<(i64, i64)> {
    Ok((int_field(record, x)?, int_field(record, y)?))
}

impl RawSample {
    /// Parse a data row by column position
    pub fn from_record(record: &StringRecord) -> Result<Self> {
        let target_id = field(record, COL_TARGET_ID)?;
        let target_id = target_id
            .parse::<u32>()
            .map_err(|_| AnalysisError::invalid_field("Target-ID", target_id))?;

        Ok(RawSample {
            label: field(record, COL_LABEL)?.to_string(),
            subject: field(record, COL_SUBJECT)?.to_string(),
            tracker: field(record, COL_TRACKER)?.to_string(),
            timestamp: field(record, COL_TIMESTAMP)?.to_string(),
            target_id,
            target: pair(record, COL_TARGET_X, COL_TARGET_Y)?,
            cursor: pair(record, COL_CURSOR_X, COL_CURSOR_Y)?,
            right_eye: pair(record, COL_RIGHT_X, COL_RIGHT_Y)?,
            left_eye: pair(record, COL_LEFT_X, COL_LEFT_Y)?,
        })
    }
}

impl RawRow {
    pub fn from_record(record: &StringRecord) -> Result<Self> {
        match classify_row(record) {
            RowKind::Header => Ok(RawRow::Header(
                record.iter().map(str::to_string).collect(),
            )),
            RowKind::Data => Ok(RawRow::Sample(RawSample::from_record(record)?)),
        }
    }
}

/// Read every row of a raw sample file in file order.
pub fn read_raw_rows<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    require_file(path)?;
    let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
    read_raw_rows_from(file)
}

pub fn read_raw_rows_from<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(RawRow::from_record(&record?)?);
    }
    Ok(rows)
}
