//! Analysis report output
//!
//! Reports render as human-readable console text with box-drawn tables, or
//! as JSON for further processing.
//!
//! # Example
//!
//! ```no_run
//! use gaze_stats::reporter::{CompareReport, OutputFormat, Reporter};
//!
//! # fn example(report: CompareReport) -> gaze_stats::Result<()> {
//! Reporter::new(OutputFormat::Console).report(&report)?;
//!
//! // Or write to a file
//! Reporter::new(OutputFormat::Json).write_to_file(&report, "compare.json")?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::compare::{ComparisonReport, RxAnalysis, ValidationErrorAnalysis};
use crate::config::Study;
use crate::error::{AnalysisError, Result};
use crate::target_table::TargetComparison;

pub use console::{ConsoleReport, ConsoleReporter};
pub use json::JsonReporter;

/// Everything computed by a comparison run
#[derive(Debug, Clone, Serialize)]
pub struct CompareReport {
    pub project: String,
    pub study: Study,
    pub participants: usize,
    /// p-value below which results are flagged
    pub significance: f64,
    pub comparisons: Vec<ComparisonReport>,
    pub spectacle_rx: RxAnalysis,
    /// Position study only
    pub validation_errors: Option<ValidationErrorAnalysis>,
}

/// Target location comparisons for one target table
#[derive(Debug, Clone, Serialize)]
pub struct TargetCompareReport {
    pub source: String,
    pub significance: f64,
    pub comparisons: Vec<TargetComparison>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Text with tables and significance markers
    #[default]
    Console,
}

impl FromStr for OutputFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "console" => Ok(OutputFormat::Console),
            other => Err(AnalysisError::invalid_field("format", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Console => write!(f, "console"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report to stdout
    pub fn report<R: ConsoleReport>(&self, report: &R) -> Result<()> {
        let output = self.format_report(report)?;
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(output.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| AnalysisError::io("<stdout>", e))
    }

    pub fn write_to_file<R: ConsoleReport, P: AsRef<Path>>(&self, report: &R, path: P) -> Result<()> {
        let path = path.as_ref();
        let output = self.format_report(report)?;
        fs::write(path, output).map_err(|e| AnalysisError::io(path, e))
    }

    pub fn format_report<R: ConsoleReport>(&self, report: &R) -> Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(report, true),
            OutputFormat::Console => ConsoleReporter::format(report),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collated::CollatedStats;
    use crate::compare::{analyze_spectacle_rx, compare_samples, GroupingKey};
    use crate::config::SignificanceConfig;

    pub(crate) fn sample_report() -> CompareReport {
        let stats = CollatedStats::default();
        let config = SignificanceConfig::default();
        CompareReport {
            project: "position".to_string(),
            study: Study::Position,
            participants: 0,
            significance: config.significance,
            comparisons: vec![compare_samples(&stats, GroupingKey::All, &config).unwrap()],
            spectacle_rx: analyze_spectacle_rx(&stats).unwrap(),
            validation_errors: None,
        }
    }

    #[test]
    fn test_reporter_json_format() {
        let output = Reporter::new(OutputFormat::Json)
            .format_report(&sample_report())
            .unwrap();
        assert!(output.contains("\"project\": \"position\""));
        assert!(output.contains("\"study\": \"position\""));
    }

    #[test]
    fn test_reporter_console_format() {
        let output = Reporter::default().format_report(&sample_report()).unwrap();
        assert!(output.contains("Project:"));
        assert!(output.contains("Eye tracker performance - all data"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("console".parse::<OutputFormat>().unwrap(), OutputFormat::Console);
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        Reporter::new(OutputFormat::Json)
            .write_to_file(&sample_report(), &path)
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["participants"], 0);
    }
}
