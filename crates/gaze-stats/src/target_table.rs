//! Per-target statistics pivoted by screen position.
//!
//! A stats summary holds one row per label and target. The target table
//! turns that around into one row per target with accuracy, precision and
//! invalid-reading columns for every position of the study:
//!
//! ```text
//! Target,Top_Accuracy,Top_Precision,Top_Invalid,Bottom_Accuracy,...
//! ```
//!
//! The table feeds the target clusterer and the inner/outer target
//! comparison.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::compare::TestOutcome;
use crate::config::Study;
use crate::error::{require_file, AnalysisError, Result};
use crate::results::{StatsRow, TargetId};
use crate::stats::{kruskal_wallis, spearman, SpearmanResult, TestResult};

/// Targets per row of the on-screen grid
pub const GRID_COLUMNS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Measure {
    Accuracy,
    Precision,
    /// Readings lost by both eyes
    Invalid,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Accuracy, Measure::Precision, Measure::Invalid];

    pub fn name(&self) -> &'static str {
        match self {
            Measure::Accuracy => "Accuracy",
            Measure::Precision => "Precision",
            Measure::Invalid => "Invalid",
        }
    }

    fn column(&self, position: &str) -> String {
        format!("{}_{}", position, self.name())
    }
}

/// Accuracy and precision in degrees plus the invalid reading count
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetMeasures {
    pub accuracy: f64,
    pub precision: f64,
    pub invalid: u64,
}

impl TargetMeasures {
    pub fn get(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Accuracy => self.accuracy,
            Measure::Precision => self.precision,
            Measure::Invalid => self.invalid as f64,
        }
    }

    /// Feature vector used for clustering
    pub fn features(&self) -> [f64; 3] {
        [self.accuracy, self.precision, self.invalid as f64]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    pub target: u32,
    /// One entry per position of the table, in table order
    pub measures: Vec<TargetMeasures>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetTable {
    pub positions: Vec<String>,
    pub rows: Vec<TargetRow>,
}

impl TargetTable {
    /// Pivot the per-target rows of a stats summary.
    ///
    /// The position of a row is the last whitespace-separated token of its
    /// label. Summary rows over all targets are ignored.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::MissingTargetPosition`] when a target has no row for
    /// one of the study's positions, and [`AnalysisError::InvalidField`] when
    /// a row lacks degree values.
    pub fn from_stats(rows: &[StatsRow], study: Study) -> Result<Self> {
        let positions: Vec<String> = study.positions().iter().map(|p| p.to_string()).collect();
        let mut by_target: BTreeMap<u32, BTreeMap<String, TargetMeasures>> = BTreeMap::new();

        for row in rows {
            let TargetId::Id(target) = row.target_id else {
                continue;
            };
            let position = row.label.split_whitespace().last().unwrap_or_default();
            let accuracy = row
                .accuracy_deg
                .ok_or_else(|| AnalysisError::invalid_field("accuracy_deg", ""))?;
            let precision = row
                .precision_deg
                .ok_or_else(|| AnalysisError::invalid_field("precision_deg", ""))?;
            by_target.entry(target).or_default().insert(
                position.to_string(),
                TargetMeasures {
                    accuracy,
                    precision,
                    invalid: row.bad_both,
                },
            );
        }

        let mut table_rows = Vec::with_capacity(by_target.len());
        for (target, mut stats) in by_target {
            let measures = positions
                .iter()
                .map(|position| {
                    stats
                        .remove(position)
                        .ok_or_else(|| AnalysisError::MissingTargetPosition {
                            target_id: target,
                            position: position.clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            if !stats.is_empty() {
                warn!(
                    "Target {} has stats for unexpected positions: {:?}",
                    target,
                    stats.keys().collect::<Vec<_>>()
                );
            }
            table_rows.push(TargetRow { target, measures });
        }

        info!("Pivoted {} targets over {} positions", table_rows.len(), positions.len());
        Ok(TargetTable {
            positions,
            rows: table_rows,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, study: Study) -> Result<Self> {
        let path = path.as_ref();
        require_file(path)?;
        let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_reader(file, study)
    }

    /// Read a table written by [`TargetTable::write`]. Only the study's
    /// positions are read; other columns are ignored.
    pub fn from_reader<R: Read>(reader: R, study: Study) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let index = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
        };

        let target_col = index("Target")?;
        let positions: Vec<String> = study.positions().iter().map(|p| p.to_string()).collect();
        let columns = positions
            .iter()
            .map(|p| {
                Ok([
                    index(&Measure::Accuracy.column(p))?,
                    index(&Measure::Precision.column(p))?,
                    index(&Measure::Invalid.column(p))?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        let field = |record: &csv::StringRecord, col: usize| -> Result<String> {
            record
                .get(col)
                .map(str::to_string)
                .ok_or_else(|| AnalysisError::MissingColumn(headers[col].to_string()))
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let target = field(&record, target_col)?;
            let target = target
                .parse::<u32>()
                .map_err(|_| AnalysisError::invalid_field("Target", target))?;

            let mut measures = Vec::with_capacity(columns.len());
            for [acc, prec, invalid] in &columns {
                let float = |col: usize| -> Result<f64> {
                    let value = field(&record, col)?;
                    value
                        .parse::<f64>()
                        .map_err(|_| AnalysisError::invalid_field(&headers[col], value))
                };
                let invalid_value = field(&record, *invalid)?;
                measures.push(TargetMeasures {
                    accuracy: float(*acc)?,
                    precision: float(*prec)?,
                    invalid: invalid_value
                        .parse::<u64>()
                        .map_err(|_| AnalysisError::invalid_field(&headers[*invalid], invalid_value))?,
                });
            }
            rows.push(TargetRow { target, measures });
        }

        Ok(TargetTable { positions, rows })
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = vec!["Target".to_string()];
        for position in &self.positions {
            header.extend(Measure::ALL.iter().map(|m| m.column(position)));
        }
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.target.to_string()];
            for measures in &row.measures {
                record.push(format!("{:?}", measures.accuracy));
                record.push(format!("{:?}", measures.precision));
                record.push(measures.invalid.to_string());
            }
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .map_err(|e| AnalysisError::io("<target table output>", e))?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
        self.write(file)
    }

    pub fn position_index(&self, position: &str) -> Result<usize> {
        self.positions
            .iter()
            .position(|p| p == position)
            .ok_or_else(|| AnalysisError::MissingColumn(Measure::Accuracy.column(position)))
    }

    /// Values of one measure at one position, in row order
    pub fn column(&self, position: usize, measure: Measure) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.measures.get(position))
            .map(|m| m.get(measure))
            .collect()
    }
}

/// Inner/outer and edge-row comparisons for one position and measure
#[derive(Debug, Clone, Serialize)]
pub struct TargetComparison {
    pub position: String,
    pub measure: Measure,
    /// Inner grid columns against the two outer columns
    pub inner_outer: TestOutcome<TestResult>,
    /// The row nearest the tracker against every other row
    pub edge_rest: TestOutcome<TestResult>,
    /// Grid column against summed invalid readings; invalid counts only
    pub invalid_per_column: Option<TestOutcome<SpearmanResult>>,
}

fn is_outer_column(target: u32) -> bool {
    matches!(target % GRID_COLUMNS, 0 | 5)
}

/// Whether the target lies on the grid row closest to a tracker mounted at
/// `position`
fn is_edge_row(position: &str, target: u32) -> bool {
    match position {
        "Bottom" => target < GRID_COLUMNS,
        "Top" => target > 29,
        _ => false,
    }
}

/// Compare targets by grid location for the position study.
///
/// # Errors
///
/// [`AnalysisError::MissingColumn`] when the table has no `Top` or `Bottom`
/// position.
pub fn compare_targets(table: &TargetTable) -> Result<Vec<TargetComparison>> {
    let mut comparisons = Vec::new();

    for position in ["Top", "Bottom"] {
        let index = table.position_index(position)?;
        for measure in Measure::ALL {
            let mut inner = Vec::new();
            let mut outer = Vec::new();
            let mut edge = Vec::new();
            let mut rest = Vec::new();
            // grid column -> invalid counts
            let mut per_column: BTreeMap<usize, f64> = BTreeMap::new();

            for (row_index, row) in table.rows.iter().enumerate() {
                let Some(measures) = row.measures.get(index) else {
                    continue;
                };
                let value = measures.get(measure);
                if is_outer_column(row.target) {
                    outer.push(value);
                } else {
                    inner.push(value);
                }
                if is_edge_row(position, row.target) {
                    edge.push(value);
                } else {
                    rest.push(value);
                }
                *per_column
                    .entry(row_index % GRID_COLUMNS as usize)
                    .or_insert(0.0) += measures.invalid as f64;
            }

            let invalid_per_column = if measure == Measure::Invalid {
                let (x, y): (Vec<f64>, Vec<f64>) =
                    per_column.into_iter().map(|(c, sum)| (c as f64, sum)).unzip();
                Some(TestOutcome::from_result(spearman(&x, &y))?)
            } else {
                None
            };

            comparisons.push(TargetComparison {
                position: position.to_string(),
                measure,
                inner_outer: TestOutcome::from_result(kruskal_wallis(&[inner.as_slice(), outer.as_slice()]))?,
                edge_rest: TestOutcome::from_result(kruskal_wallis(&[edge.as_slice(), rest.as_slice()]))?,
                invalid_per_column,
            });
        }
    }

    Ok(comparisons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::StatsSummary;
    use pretty_assertions::assert_eq;

    fn stats_row(label: &str, target_id: TargetId, accuracy: f64, bad_both: u64) -> StatsRow {
        StatsRow {
            participant: None,
            label: label.to_string(),
            target_id,
            test_n: 1,
            record_n: 10,
            working_distance_cm: Some(65.0),
            accuracy_px: accuracy * 40.0,
            accuracy_deg: Some(accuracy),
            precision_px: 4.0,
            precision_deg: Some(0.1),
            bad_both,
            bad_right: 0,
            bad_left: 0,
            parametric: false,
        }
    }

    fn position_table(targets: u32) -> TargetTable {
        let mut rows = Vec::new();
        for target in 0..targets {
            for (label, offset) in [("GP3 :: mf - Top", 0.0), ("GP3 :: mf - Bottom", 1.0)] {
                rows.push(stats_row(label, TargetId::All, 0.0, 0));
                rows.push(stats_row(
                    label,
                    TargetId::Id(target),
                    offset + target as f64 / 10.0,
                    (target % GRID_COLUMNS) as u64,
                ));
            }
        }
        TargetTable::from_stats(&rows, Study::Position).unwrap()
    }

    #[test]
    fn test_pivot() {
        let table = position_table(3);
        assert_eq!(table.positions, vec!["Top", "Bottom"]);
        assert_eq!(table.rows.len(), 3);
        let row = &table.rows[2];
        assert_eq!(row.target, 2);
        assert_eq!(row.measures[0].accuracy, 0.2);
        assert_eq!(row.measures[1].accuracy, 1.2);
        assert_eq!(row.measures[1].invalid, 2);
        assert_eq!(table.column(0, Measure::Invalid), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_missing_position_is_an_error() {
        let rows = vec![stats_row("GP3 :: Top", TargetId::Id(4), 0.5, 0)];
        match TargetTable::from_stats(&rows, Study::Position) {
            Err(AnalysisError::MissingTargetPosition { target_id, position }) => {
                assert_eq!(target_id, 4);
                assert_eq!(position, "Bottom");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_write_and_read() {
        let table = position_table(2);
        let mut out = Vec::new();
        table.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Target,Top_Accuracy,Top_Precision,Top_Invalid,Bottom_Accuracy,Bottom_Precision,Bottom_Invalid\n\
             0,0.0,0.1,0,1.0,0.1,0\n\
             1,0.1,0.1,1,1.1,0.1,1\n"
        );
        let read = TargetTable::from_reader(text.as_bytes(), Study::Position).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn test_pivot_from_summary_csv() {
        let csv = "\
participant,label,target_id,test_n,record_n,working_distance_cm,accuracy_px,accuracy_deg,precision_px,precision_deg,bad_both,bad_right,bad_left,parametric
,Tobii :: far_chinrest,all,1,4,90,10,0.5,2,0.1,0,0,0,False
,Tobii :: far_chinrest,7,1,4,90,10,0.5,2,0.1,3,0,0,False
";
        let rows = StatsSummary::read_from(csv.as_bytes()).unwrap();
        let result = TargetTable::from_stats(&rows, Study::Validation);
        // only one of the four validation positions is present
        assert!(matches!(
            result,
            Err(AnalysisError::MissingTargetPosition { target_id: 7, .. })
        ));
    }

    #[test]
    fn test_compare_targets() {
        let table = position_table(36);
        let comparisons = compare_targets(&table).unwrap();
        assert_eq!(comparisons.len(), 6);

        let top_accuracy = &comparisons[0];
        assert_eq!(top_accuracy.position, "Top");
        assert_eq!(top_accuracy.measure, Measure::Accuracy);
        assert!(top_accuracy.invalid_per_column.is_none());
        // accuracy grows with target id, so the last row stands out
        assert!(top_accuracy
            .edge_rest
            .completed()
            .unwrap()
            .is_significant(0.05));

        let top_invalid = &comparisons[2];
        let spearman = top_invalid
            .invalid_per_column
            .as_ref()
            .and_then(|s| s.completed())
            .unwrap();
        assert!((spearman.rho - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_compare_targets_requires_position_study() {
        let table = TargetTable {
            positions: vec!["near_chinrest".to_string()],
            rows: Vec::new(),
        };
        assert!(matches!(
            compare_targets(&table),
            Err(AnalysisError::MissingColumn(_))
        ));
    }
}
