//! Chi-square comparison of bad read counts.

use std::collections::BTreeMap;

use serde::Serialize;

use super::grouping::Category;
use super::TestOutcome;
use crate::error::Result;
use crate::gaze::BadDataCounts;
use crate::stats::{chi_square_columns, ChiSquareResult};

/// Count classes tested, in column order
pub const BAD_READ_CLASSES: [&str; 3] = ["one eye", "both eyes", "none"];

/// Readings split by how many eyes were lost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BadReadTally {
    /// Readings recorded
    pub n: u64,
    pub one: u64,
    pub both: u64,
    pub none: u64,
}

impl BadReadTally {
    pub fn add(&mut self, record_n: u64, bad: &BadDataCounts) {
        self.n += record_n;
        self.one += bad.right + bad.left;
        self.both += bad.both;
        self.none += record_n.saturating_sub(bad.total());
    }

    fn merge(&mut self, other: &BadReadTally) {
        self.n += other.n;
        self.one += other.one;
        self.both += other.both;
        self.none += other.none;
    }

    fn classes(&self) -> Vec<f64> {
        vec![self.one as f64, self.both as f64, self.none as f64]
    }
}

/// One contingency table with a chi-square test per count class
#[derive(Debug, Clone, Serialize)]
pub struct BadReadTable {
    pub name: String,
    pub rows: Vec<(String, BadReadTally)>,
    /// One result per entry of [`BAD_READ_CLASSES`]
    pub tests: TestOutcome<Vec<ChiSquareResult>>,
}

impl BadReadTable {
    fn new(name: impl Into<String>, rows: Vec<(String, BadReadTally)>) -> Result<Self> {
        let table: Vec<Vec<f64>> = rows.iter().map(|(_, tally)| tally.classes()).collect();
        Ok(BadReadTable {
            name: name.into(),
            tests: TestOutcome::from_result(chi_square_columns(&table))?,
            rows,
        })
    }

    /// Count classes whose distribution differs between rows
    pub fn significant_classes(&self, alpha: f64) -> Vec<&'static str> {
        self.tests
            .completed()
            .map(|results| {
                results
                    .iter()
                    .zip(BAD_READ_CLASSES)
                    .filter(|(r, _)| r.is_significant(alpha))
                    .map(|(_, class)| class)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BadReadAnalysis {
    /// Labels compared within each category
    pub per_category: Vec<BadReadTable>,
    /// Trackers compared at the same position, summed over categories
    pub per_position: Vec<BadReadTable>,
    /// Category totals compared, when there is more than one category
    pub across_categories: Option<BadReadTable>,
}

impl BadReadAnalysis {
    /// Tallies are keyed by category, then by "tracker :: position" label
    pub fn analyze(tallies: &BTreeMap<Category, BTreeMap<String, BadReadTally>>) -> Result<Self> {
        let mut per_category = Vec::new();
        let mut positions: BTreeMap<String, BTreeMap<String, BadReadTally>> = BTreeMap::new();
        let mut totals = Vec::new();

        for (category, labels) in tallies {
            let rows: Vec<(String, BadReadTally)> =
                labels.iter().map(|(label, tally)| (label.clone(), *tally)).collect();
            per_category.push(BadReadTable::new(category.to_string(), rows)?);

            let mut total = BadReadTally::default();
            for (label, tally) in labels {
                total.merge(tally);
                if let Some((tracker, position)) = label.split_once(" :: ") {
                    positions
                        .entry(position.to_string())
                        .or_default()
                        .entry(tracker.to_string())
                        .or_default()
                        .merge(tally);
                }
            }
            totals.push((category.to_string(), total));
        }

        let per_position = positions
            .into_iter()
            .filter(|(_, trackers)| trackers.len() > 1)
            .map(|(position, trackers)| BadReadTable::new(position, trackers.into_iter().collect()))
            .collect::<Result<Vec<_>>>()?;

        let across_categories = if totals.len() > 1 {
            Some(BadReadTable::new("All", totals)?)
        } else {
            None
        };

        Ok(BadReadAnalysis {
            per_category,
            per_position,
            across_categories,
        })
    }
}
