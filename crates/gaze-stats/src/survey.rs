//! Survey export simplification.
//!
//! The survey tool exports one column per question part, with free-text
//! answers for spectacle prescriptions and posture measurements. This module
//! reduces an export to the columns the analysis uses, deriving numeric
//! values from the free text where needed.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::Study;
use crate::error::{require_file, AnalysisError, Result};

lazy_static! {
    /// Spectacle prescription: sphere, optional cyl and axis, optional add.
    /// "pl" (plano) is a zero sphere.
    static ref RX_PATTERN: Regex =
        Regex::new(r"(pl|[+-]\d+\.\d\d)(?:/([+-]\d+\.\d\d)x(\d+))?(?: \([+](\d+\.\d\d)\))?").unwrap();

    /// Pantoscopic tilt noted in the frame measurements free text
    static ref PANTO_PATTERN: Regex = Regex::new(r"[Pp]anto:[ ]?(-?\d+)").unwrap();
}

/// Participant ID used for the pilot run of the survey
const TEST_PARTICIPANT_ID: u32 = 1;

/// Rows between the header and the first response
const METADATA_ROWS: usize = 2;

/// One response of the survey export, addressed by column name
pub struct ExportRow<'a> {
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl<'a> ExportRow<'a> {
    pub fn new(headers: &'a StringRecord, record: &'a StringRecord) -> Self {
        Self { headers, record }
    }

    pub fn get(&self, column: &str) -> Result<&'a str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.record.get(i))
            .ok_or_else(|| AnalysisError::MissingColumn(column.to_string()))
    }
}

/// Where a simplified column's value comes from
#[derive(Clone, Copy)]
pub enum ColumnSource {
    /// Copied verbatim from the named export column
    Direct(&'static str),
    /// Computed from the whole response
    Derived(fn(&ExportRow<'_>) -> Result<String>),
}

#[derive(Clone, Copy)]
pub struct SurveyColumn {
    pub name: &'static str,
    pub source: ColumnSource,
}

impl SurveyColumn {
    const fn direct(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            source: ColumnSource::Direct(column),
        }
    }

    const fn derived(name: &'static str, f: fn(&ExportRow<'_>) -> Result<String>) -> Self {
        Self {
            name,
            source: ColumnSource::Derived(f),
        }
    }

    pub fn value(&self, row: &ExportRow<'_>) -> Result<String> {
        match self.source {
            ColumnSource::Direct(column) => row.get(column).map(str::to_string),
            ColumnSource::Derived(f) => f(row),
        }
    }
}

const COMMON_COLUMNS: [SurveyColumn; 14] = [
    SurveyColumn::direct("ID", "ID"),
    SurveyColumn::direct("EyeColour", "EyeColour"),
    SurveyColumn::derived("Correction", correction),
    SurveyColumn::direct("EyeConditions", "EyeConditions"),
    SurveyColumn::direct("Posture3m", "Posture3m"),
    SurveyColumn::derived("Posture3mVal", posture_3m),
    SurveyColumn::direct("Posture33cm", "Posture33cm"),
    SurveyColumn::derived("Posture33cmVal", posture_33cm),
    SurveyColumn::derived("HasARCoat", ar_coat),
    SurveyColumn::direct("VertRight", "Vert_1_TEXT"),
    SurveyColumn::direct("VertLeft", "Vert_2_TEXT"),
    SurveyColumn::derived("SphericalDistRx", spherical_equivalent),
    SurveyColumn::derived("MFAdd", multifocal_add),
    SurveyColumn::derived("Panto", pantoscopic_tilt),
];

const POSITION_COLUMNS: [SurveyColumn; 2] = [
    SurveyColumn::direct("ValidationErrorsTop", "Q8"),
    SurveyColumn::direct("ValidationErrorsBottom", "Q9"),
];

/// Output columns, in order, for a study
pub fn survey_columns(study: Study) -> Vec<SurveyColumn> {
    let mut columns = COMMON_COLUMNS.to_vec();
    if study == Study::Position {
        columns.extend_from_slice(&POSITION_COLUMNS);
    }
    columns
}

fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

fn correction(row: &ExportRow<'_>) -> Result<String> {
    match row.get("Correction")? {
        "Spectacles - single vision" => Ok("Single Vision".to_string()),
        "Spectacles - multifocal / varifocal / occupational" => Ok("Multifocal".to_string()),
        other @ ("Contact lenses - soft" | "None") => Ok(other.to_string()),
        other => Err(AnalysisError::InvalidSurveyValue(format!(
            "invalid correction type: {}",
            other
        ))),
    }
}

/// Heterophoria measured either with a Howell-Dwyer card or a cover test
fn posture(row: &ExportRow<'_>, column: &str) -> Result<String> {
    let method = row.get(column)?;
    let text_column = match method {
        "Howell-Dwyer" => format!("{}_1_TEXT", column),
        "Cover Test" => format!("{}_2_TEXT", column),
        other => {
            return Err(AnalysisError::InvalidSurveyValue(format!(
                "{} must be 'Howell-Dwyer' or 'Cover Test', not '{}'",
                column, other
            )))
        }
    };
    let text = row.get(&text_column)?;
    let value = text
        .trim()
        .parse::<f64>()
        .map_err(|_| AnalysisError::invalid_field(text_column, text))?;
    Ok(format_float(value))
}

fn posture_3m(row: &ExportRow<'_>) -> Result<String> {
    posture(row, "Posture3m")
}

fn posture_33cm(row: &ExportRow<'_>) -> Result<String> {
    posture(row, "Posture33cm")
}

fn ar_coat(row: &ExportRow<'_>) -> Result<String> {
    if row.get("Correction")? == "None" {
        return Ok(String::new());
    }
    let coated = row.get("Vert")?.contains("Has AR coating");
    Ok(if coated { "1" } else { "0" }.to_string())
}

/// Parsed prescription for one eye; unparseable text counts as all zeros
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Prescription {
    pub sphere: f64,
    pub cyl: f64,
    pub axis: f64,
    pub add: f64,
}

impl Prescription {
    pub fn parse(text: &str) -> Self {
        let Some(caps) = RX_PATTERN.captures(text) else {
            return Prescription::default();
        };
        let group = |i: usize| -> f64 {
            caps.get(i)
                .map(|m| m.as_str())
                .filter(|s| *s != "pl")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0)
        };
        Prescription {
            sphere: group(1),
            cyl: group(2),
            axis: group(3),
            add: group(4),
        }
    }

    pub fn spherical_equivalent(&self) -> f64 {
        self.sphere + self.cyl / 2.0
    }
}

fn prescriptions(row: &ExportRow<'_>) -> Result<[Prescription; 2]> {
    Ok([
        Prescription::parse(row.get("Vert_1_TEXT")?),
        Prescription::parse(row.get("Vert_2_TEXT")?),
    ])
}

/// Mean sphere plus half the mean cyl over both eyes
fn spherical_equivalent(row: &ExportRow<'_>) -> Result<String> {
    let [right, left] = prescriptions(row)?;
    let sphere = (right.sphere + left.sphere) / 2.0;
    let cyl = (right.cyl + left.cyl) / 2.0;
    Ok(format_float(sphere + cyl / 2.0))
}

fn multifocal_add(row: &ExportRow<'_>) -> Result<String> {
    let [right, left] = prescriptions(row)?;
    let add = (right.add + left.add) / 2.0;
    if add == 0.0 {
        return Ok(String::new());
    }
    Ok(format_float(add))
}

fn pantoscopic_tilt(row: &ExportRow<'_>) -> Result<String> {
    let text = row.get("Vert_4_TEXT")?;
    Ok(PANTO_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(|tilt| tilt.to_string())
        .unwrap_or_default())
}

/// Simplified survey table
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedSurvey {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl SimplifiedSurvey {
    /// Simplify a survey export file.
    pub fn from_file<P: AsRef<Path>>(path: P, study: Study) -> Result<Self> {
        let path = path.as_ref();
        require_file(path)?;
        let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_reader(file, study)
    }

    /// Simplify an export: skip the metadata rows under the header and the
    /// pilot participant, then derive every output column.
    pub fn from_reader<R: Read>(reader: R, study: Study) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let columns = survey_columns(study);

        let mut rows = Vec::new();
        for record in reader.records().skip(METADATA_ROWS) {
            let record = record?;
            let row = ExportRow::new(&headers, &record);

            let id = row.get("ID")?;
            let id_num = id
                .trim()
                .parse::<u32>()
                .map_err(|_| AnalysisError::invalid_field("ID", id))?;
            if id_num == TEST_PARTICIPANT_ID {
                debug!("Skipping test participant {}", id);
                continue;
            }

            let values = columns
                .iter()
                .map(|column| column.value(&row))
                .collect::<Result<Vec<String>>>()?;
            rows.push(values);
        }

        info!("Simplified {} survey responses", rows.len());
        Ok(SimplifiedSurvey {
            columns: columns.iter().map(|c| c.name).collect(),
            rows,
        })
    }

    /// Write the table with every value quoted
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .map_err(|e| AnalysisError::io("<survey output>", e))?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
        self.write(file)
    }
}
