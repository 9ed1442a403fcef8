//! Accuracy and precision summaries and the stats summary CSV.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{require_file, AnalysisError, Result};
use crate::gaze::BadDataCounts;

/// Accuracy and precision for one identifier, or one target of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentStats {
    pub participant: Option<String>,
    /// "tracker :: label"
    pub label: String,
    /// `None` for the summary over every target
    pub target: Option<u32>,
    /// Recording sessions seen for the identifier
    pub test_n: u64,
    /// Rows recorded, including bad reads
    pub record_n: u64,
    pub distance_cm: Option<f64>,
    pub accuracy_px: f64,
    pub precision_px: f64,
    pub accuracy_deg: Option<f64>,
    pub precision_deg: Option<f64>,
    pub bad_data: BadDataCounts,
    /// Distances indistinguishable from normal (Kolmogorov-Smirnov)
    pub parametric: bool,
    /// Per-target breakdown in ascending target order
    pub targets: Vec<ExperimentStats>,
}

impl ExperimentStats {
    /// Flatten into CSV rows: the summary first, then one row per target
    pub fn rows(&self) -> Vec<StatsRow> {
        let mut rows = Vec::with_capacity(self.targets.len() + 1);
        rows.push(StatsRow::from(self));
        for target in &self.targets {
            rows.extend(target.rows());
        }
        rows
    }
}

/// Target column of the stats CSV: `all` or a target id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetId {
    All,
    Id(u32),
}

impl TargetId {
    pub fn id(&self) -> Option<u32> {
        match self {
            TargetId::All => None,
            TargetId::Id(id) => Some(*id),
        }
    }
}

impl Serialize for TargetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TargetId::All => serializer.serialize_str("all"),
            TargetId::Id(id) => serializer.serialize_u32(*id),
        }
    }
}

impl<'de> Deserialize<'de> for TargetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(TargetId::All);
        }
        s.parse::<u32>()
            .map(TargetId::Id)
            .map_err(|_| serde::de::Error::custom(format!("invalid target id '{}'", s)))
    }
}

/// `True` / `False` as written by the capture tooling
mod title_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "True" } else { "False" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid parametric flag '{}'",
                other
            ))),
        }
    }
}

/// One row of the stats summary CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub participant: Option<String>,
    pub label: String,
    pub target_id: TargetId,
    pub test_n: u64,
    pub record_n: u64,
    pub working_distance_cm: Option<f64>,
    pub accuracy_px: f64,
    pub accuracy_deg: Option<f64>,
    pub precision_px: f64,
    pub precision_deg: Option<f64>,
    pub bad_both: u64,
    pub bad_right: u64,
    pub bad_left: u64,
    #[serde(with = "title_bool")]
    pub parametric: bool,
}

impl StatsRow {
    pub fn bad_data(&self) -> BadDataCounts {
        BadDataCounts {
            right: self.bad_right,
            left: self.bad_left,
            both: self.bad_both,
        }
    }
}

impl From<&ExperimentStats> for StatsRow {
    fn from(stats: &ExperimentStats) -> Self {
        StatsRow {
            participant: stats.participant.clone(),
            label: stats.label.clone(),
            target_id: stats.target.map_or(TargetId::All, TargetId::Id),
            test_n: stats.test_n,
            record_n: stats.record_n,
            working_distance_cm: stats.distance_cm,
            accuracy_px: stats.accuracy_px,
            accuracy_deg: stats.accuracy_deg,
            precision_px: stats.precision_px,
            precision_deg: stats.precision_deg,
            bad_both: stats.bad_data.both,
            bad_right: stats.bad_data.right,
            bad_left: stats.bad_data.left,
            parametric: stats.parametric,
        }
    }
}

/// Reading and writing of the stats summary CSV
pub struct StatsSummary;

impl StatsSummary {
    /// Write the header and every label's rows
    pub fn write<W: Write>(writer: W, stats: &[ExperimentStats]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(writer);
        for label in stats {
            for row in label.rows() {
                writer.serialize(row)?;
            }
        }
        writer
            .flush()
            .map_err(|e| AnalysisError::io("<stats output>", e))?;
        Ok(())
    }

    /// Render the CSV to a string
    pub fn to_csv_string(stats: &[ExperimentStats]) -> Result<String> {
        let mut buffer = Vec::new();
        Self::write(&mut buffer, stats)?;
        String::from_utf8(buffer).map_err(|e| AnalysisError::invalid_field("stats output", e.to_string()))
    }

    pub fn write_to_file<P: AsRef<Path>>(path: P, stats: &[ExperimentStats]) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::write(file, stats)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<StatsRow>> {
        let path = path.as_ref();
        require_file(path)?;
        let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::read_from(file)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Vec<StatsRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_stats() -> ExperimentStats {
        let target = ExperimentStats {
            participant: Some("12".to_string()),
            label: "GP3 :: mf - top".to_string(),
            target: Some(3),
            test_n: 2,
            record_n: 40,
            distance_cm: Some(65.0),
            accuracy_px: 20.5,
            precision_px: 4.25,
            accuracy_deg: Some(0.5),
            precision_deg: Some(0.1),
            bad_data: BadDataCounts {
                right: 1,
                left: 0,
                both: 2,
            },
            parametric: false,
            targets: Vec::new(),
        };
        ExperimentStats {
            target: None,
            record_n: 40,
            parametric: true,
            targets: vec![target.clone()],
            ..target
        }
    }

    #[test]
    fn test_header_and_layout() {
        let csv = StatsSummary::to_csv_string(&[sample_stats()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "participant,label,target_id,test_n,record_n,working_distance_cm,accuracy_px,accuracy_deg,precision_px,precision_deg,bad_both,bad_right,bad_left,parametric"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("12,GP3 :: mf - top,all,2,40,"));
        assert!(lines[1].ends_with(",2,1,0,True"));
        assert!(lines[2].contains(",3,2,40,"));
        assert!(lines[2].ends_with("False"));
    }

    #[test]
    fn test_optional_fields_empty() {
        let stats = ExperimentStats {
            participant: None,
            distance_cm: None,
            accuracy_deg: None,
            precision_deg: None,
            targets: Vec::new(),
            ..sample_stats()
        };
        let csv = StatsSummary::to_csv_string(&[stats]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with(",GP3 :: mf - top,all,2,40,,20.5,,4.25,,"));

        let parsed = StatsSummary::read_from(csv.as_bytes()).unwrap();
        assert_eq!(parsed[0].participant, None);
        assert_eq!(parsed[0].working_distance_cm, None);
        assert_eq!(parsed[0].precision_deg, None);
    }

    #[test]
    fn test_read_back() {
        let stats = sample_stats();
        let csv = StatsSummary::to_csv_string(&[stats.clone()]).unwrap();
        let rows = StatsSummary::read_from(csv.as_bytes()).unwrap();
        assert_eq!(rows, stats.rows());
        assert_eq!(rows[1].target_id.id(), Some(3));
        assert_eq!(rows[0].bad_data().both, 2);
    }

    #[test]
    fn test_read_integer_distance() {
        let csv = "participant,label,target_id,test_n,record_n,working_distance_cm,accuracy_px,accuracy_deg,precision_px,precision_deg,bad_both,bad_right,bad_left,parametric\n\
                   \"3\",\"T :: top\",all,1,10,65,12.0,0.3,2.0,0.05,0,0,0,False\n";
        let rows = StatsSummary::read_from(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].working_distance_cm, Some(65.0));
        assert_eq!(rows[0].participant.as_deref(), Some("3"));
        assert_eq!(rows[0].target_id, TargetId::All);
    }

    #[test]
    fn test_read_bad_parametric() {
        let csv = "participant,label,target_id,test_n,record_n,working_distance_cm,accuracy_px,accuracy_deg,precision_px,precision_deg,bad_both,bad_right,bad_left,parametric\n\
                   ,T :: top,all,1,10,,12.0,,2.0,,0,0,0,maybe\n";
        assert!(StatsSummary::read_from(csv.as_bytes()).is_err());
    }
}
