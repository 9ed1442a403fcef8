//! Comparative analysis of accuracy and precision across participant groups.
//!
//! Participants are split by a [`GroupingKey`]. Within each category the
//! tracker/position labels are compared with each other, and when there is
//! more than one category each label is compared across categories. Two
//! groups use Mann-Whitney U; three or more use Kruskal-Wallis followed by a
//! Bonferroni-corrected Dunn test when the result is significant.
//!
//! Every test that lacks data reports [`TestOutcome::Insufficient`] instead of
//! failing the whole comparison.

pub mod bad_reads;
pub mod grouping;
pub mod spectacles;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collated::CollatedStats;
use crate::config::SignificanceConfig;
use crate::error::{AnalysisError, Result};
use crate::results::TargetId;
use crate::stats::{
    confidence_interval, describe, dunn_bonferroni, kruskal_wallis, linear_fit, mann_whitney_u,
    pstdev, sem, spearman, ConfidenceInterval, Description, DunnMatrix, LinearFit, SpearmanResult,
    TestResult,
};

pub use bad_reads::{BadReadAnalysis, BadReadTable, BadReadTally};
pub use grouping::{Category, GroupingKey};
pub use spectacles::{
    analyze_spectacle_rx, analyze_validation_errors, RxAnalysis, RxSeries, ValidationErrorAnalysis,
    ValidationErrorPoint, ValidationErrorSeries,
};

/// Result of a test that may not have had enough data to run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome<T> {
    Completed(T),
    Insufficient(String),
}

impl<T> TestOutcome<T> {
    /// Convert a test result, keeping only insufficient-data errors
    pub fn from_result(result: Result<T>) -> Result<Self> {
        match result {
            Ok(value) => Ok(TestOutcome::Completed(value)),
            Err(AnalysisError::InsufficientData(reason)) => {
                warn!("Insufficient data: {}", reason);
                Ok(TestOutcome::Insufficient(reason))
            }
            Err(e) => Err(e),
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            TestOutcome::Completed(value) => Some(value),
            TestOutcome::Insufficient(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stat {
    Accuracy,
    Precision,
}

impl Stat {
    pub const BOTH: [Stat; 2] = [Stat::Accuracy, Stat::Precision];
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Accuracy => write!(f, "Accuracy"),
            Stat::Precision => write!(f, "Precision"),
        }
    }
}

/// Degree samples for one category, per stat and label
#[derive(Debug, Clone, Default)]
struct CategorySamples {
    accuracy: BTreeMap<String, Vec<f64>>,
    precision: BTreeMap<String, Vec<f64>>,
}

impl CategorySamples {
    fn get(&self, stat: Stat) -> &BTreeMap<String, Vec<f64>> {
        match stat {
            Stat::Accuracy => &self.accuracy,
            Stat::Precision => &self.precision,
        }
    }
}

/// Summary of one group in a comparison
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub description: Description,
    pub confidence: TestOutcome<ConfidenceInterval>,
}

/// Significance test applied to a set of groups
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonTest {
    /// Fewer than two groups had data
    NotEnoughGroups,
    MannWhitney(TestOutcome<TestResult>),
    KruskalWallis {
        kruskal: TestOutcome<TestResult>,
        /// Run only when Kruskal-Wallis is significant
        dunn: Option<TestOutcome<DunnMatrix>>,
    },
}

impl ComparisonTest {
    /// Choose and run the test for the number of groups
    pub fn run(groups: &[&[f64]], significance: f64) -> Result<Self> {
        match groups.len() {
            0 | 1 => Ok(ComparisonTest::NotEnoughGroups),
            2 => Ok(ComparisonTest::MannWhitney(TestOutcome::from_result(
                mann_whitney_u(groups[0], groups[1]),
            )?)),
            _ => {
                let kruskal = TestOutcome::from_result(kruskal_wallis(groups))?;
                let dunn = match kruskal.completed() {
                    Some(result) if result.is_significant(significance) => {
                        Some(TestOutcome::from_result(dunn_bonferroni(groups))?)
                    }
                    _ => None,
                };
                Ok(ComparisonTest::KruskalWallis { kruskal, dunn })
            }
        }
    }

    /// Whether the main test rejected the null hypothesis
    pub fn is_significant(&self, significance: f64) -> bool {
        match self {
            ComparisonTest::NotEnoughGroups => false,
            ComparisonTest::MannWhitney(outcome) | ComparisonTest::KruskalWallis { kruskal: outcome, .. } => {
                outcome
                    .completed()
                    .is_some_and(|r| r.is_significant(significance))
            }
        }
    }
}

/// Comparison of several groups for one stat
#[derive(Debug, Clone, Serialize)]
pub struct GroupComparison {
    pub stat: Stat,
    /// Category (within-category comparisons) or label (across categories)
    pub context: String,
    pub groups: Vec<GroupSummary>,
    pub test: ComparisonTest,
}

impl GroupComparison {
    fn build<'a, I>(stat: Stat, context: String, groups: I, config: &SignificanceConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (String, &'a [f64])>,
    {
        let mut summaries = Vec::new();
        let mut samples: Vec<&[f64]> = Vec::new();
        for (name, values) in groups {
            let Some(description) = describe(values) else {
                continue;
            };
            summaries.push(GroupSummary {
                name,
                description,
                confidence: TestOutcome::from_result(confidence_interval(values, config.confidence))?,
            });
            samples.push(values);
        }

        let test = ComparisonTest::run(&samples, config.significance)?;
        Ok(GroupComparison {
            stat,
            context,
            groups: summaries,
            test,
        })
    }
}

/// Mean and standard error of one category, for error bar plots
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBarPoint {
    pub category: Category,
    pub mean: f64,
    /// `None` for a single observation
    pub sem: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBarSeries {
    pub label: String,
    pub stat: Stat,
    pub points: Vec<ErrorBarPoint>,
}

/// Fit of category value against category mean, for numeric categories
#[derive(Debug, Clone, Serialize)]
pub struct Regression {
    pub label: String,
    pub stat: Stat,
    pub fit: TestOutcome<LinearFit>,
    pub spearman: TestOutcome<SpearmanResult>,
    /// n - 2
    pub df: usize,
}

/// Raw values behind an error bar, one row of the error bar CSV
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBarValues {
    pub label: String,
    pub stat: Stat,
    pub category: Category,
    pub values: Vec<f64>,
}

/// Everything computed for one grouping key
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub key: GroupingKey,
    pub title: String,
    /// Participants per category
    pub counts: Vec<(Category, usize)>,
    pub bad_reads: BadReadAnalysis,
    /// Labels compared within each category
    pub within_category: Vec<GroupComparison>,
    /// Categories compared for each label; empty with a single category
    pub across_categories: Vec<GroupComparison>,
    pub error_bars: Vec<ErrorBarSeries>,
    pub regressions: Vec<Regression>,
    #[serde(skip)]
    pub error_bar_values: Vec<ErrorBarValues>,
}

impl ComparisonReport {
    pub fn has_multiple_categories(&self) -> bool {
        self.counts.len() > 1
    }

    /// Write `label,stat,category,values` with the values comma separated
    /// inside a single quoted field.
    pub fn write_error_bar_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["label", "stat", "category", "values"])?;
        for row in &self.error_bar_values {
            let values = row
                .values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",");
            writer.write_record([
                row.label.as_str(),
                &row.stat.to_string(),
                &row.category.to_string(),
                &values,
            ])?;
        }
        writer
            .flush()
            .map_err(|e| AnalysisError::io("<error bar output>", e))?;
        Ok(())
    }
}

/// Group participants by `key` and compare accuracy and precision.
///
/// Accuracy samples are every raw distance converted to degrees with the
/// participant's own factor; precision samples are the population standard
/// deviation of each target's distances.
pub fn compare_samples(
    stats: &CollatedStats,
    key: GroupingKey,
    config: &SignificanceConfig,
) -> Result<ComparisonReport> {
    info!("Comparing samples: {}", key.title());

    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    let mut samples: BTreeMap<Category, CategorySamples> = BTreeMap::new();
    let mut tallies: BTreeMap<Category, BTreeMap<String, BadReadTally>> = BTreeMap::new();

    for participant in stats.participants.values() {
        let category = key.category(participant);
        *counts.entry(category.clone()).or_insert(0) += 1;

        let Some(factor) = participant.px_to_deg else {
            warn!(
                "Participant {} has no pixel to degree factor, skipping",
                participant.id
            );
            continue;
        };

        let category_samples = samples.entry(category.clone()).or_default();
        let category_tallies = tallies.entry(category.clone()).or_default();

        for target in &participant.target_stats {
            let accuracy = category_samples
                .accuracy
                .entry(target.label.clone())
                .or_default();
            let tally = category_tallies.entry(target.label.clone()).or_default();
            if target.target_id == TargetId::All {
                tally.add(target.record_n, &target.bad_data);
            }

            let degrees: Vec<f64> = target
                .raw_distances_px
                .iter()
                .map(|d| d * factor)
                .collect();
            accuracy.extend_from_slice(&degrees);

            let precision = category_samples
                .precision
                .entry(target.label.clone())
                .or_default();
            if let Some(sd) = pstdev(&degrees) {
                precision.push(sd);
            }
        }
    }

    debug!("Category counts: {:?}", counts);
    let bad_reads = BadReadAnalysis::analyze(&tallies)?;

    let mut within_category = Vec::new();
    // stat -> label -> category -> values
    let mut by_label: BTreeMap<Stat, BTreeMap<String, BTreeMap<Category, Vec<f64>>>> = BTreeMap::new();

    for (category, category_samples) in &samples {
        for stat in Stat::BOTH {
            let labels = category_samples.get(stat);
            for (label, values) in labels {
                if values.is_empty() {
                    continue;
                }
                by_label
                    .entry(stat)
                    .or_default()
                    .entry(label.clone())
                    .or_default()
                    .entry(category.clone())
                    .or_default()
                    .extend_from_slice(values);
            }

            let groups = labels
                .iter()
                .filter(|(_, values)| !values.is_empty())
                .map(|(label, values)| (label.clone(), values.as_slice()));
            within_category.push(GroupComparison::build(stat, category.to_string(), groups, config)?);
        }
    }

    let mut across_categories = Vec::new();
    let mut error_bars = Vec::new();
    let mut error_bar_values = Vec::new();
    let mut regressions = Vec::new();

    if samples.len() > 1 {
        for (stat, labels) in &by_label {
            for (label, categories) in labels {
                let mut points = Vec::new();
                for (category, values) in categories {
                    if category.is_missing() {
                        continue;
                    }
                    error_bar_values.push(ErrorBarValues {
                        label: label.clone(),
                        stat: *stat,
                        category: category.clone(),
                        values: values.clone(),
                    });
                    if let Some(description) = describe(values) {
                        points.push(ErrorBarPoint {
                            category: category.clone(),
                            mean: description.mean,
                            sem: sem(values),
                        });
                    }
                }

                let groups = categories
                    .iter()
                    .map(|(category, values)| (category.to_string(), values.as_slice()));
                across_categories.push(GroupComparison::build(*stat, label.clone(), groups, config)?);

                if let Some(regression) = regress(label, *stat, &points)? {
                    regressions.push(regression);
                }
                error_bars.push(ErrorBarSeries {
                    label: label.clone(),
                    stat: *stat,
                    points,
                });
            }
        }
    }

    Ok(ComparisonReport {
        key,
        title: key.title().to_string(),
        counts: counts.into_iter().collect(),
        bad_reads,
        within_category,
        across_categories,
        error_bars,
        regressions,
        error_bar_values,
    })
}

/// Regress category means on numeric category values
fn regress(label: &str, stat: Stat, points: &[ErrorBarPoint]) -> Result<Option<Regression>> {
    if !points
        .first()
        .is_some_and(|p| p.category.as_number().is_some())
    {
        return Ok(None);
    }
    let (x, y): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter_map(|p| p.category.as_number().map(|x| (x, p.mean)))
        .unzip();

    Ok(Some(Regression {
        label: label.to_string(),
        stat,
        fit: TestOutcome::from_result(linear_fit(&x, &y))?,
        spearman: TestOutcome::from_result(spearman(&x, &y))?,
        df: x.len().saturating_sub(2),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collated::{ParticipantRecord, TargetStats};
    use crate::gaze::BadDataCounts;

    pub(super) fn participant(id: u32, eye_colour: &str, panto: Option<f64>) -> ParticipantRecord {
        ParticipantRecord {
            id,
            eye_colour: eye_colour.to_string(),
            correction: "None".to_string(),
            eye_conditions: String::new(),
            posture_3m: 0.0,
            posture_33cm: 0.0,
            has_ar_coat: false,
            vert_right: String::new(),
            vert_left: String::new(),
            spherical_dist_rx: 0.0,
            mf_add: None,
            panto,
            validation_errors_top: None,
            validation_errors_bottom: None,
            px_to_deg: Some(0.1),
            target_stats: Vec::new(),
        }
    }

    pub(super) fn target(participant: u32, label: &str, target_id: TargetId, raw: Vec<f64>) -> TargetStats {
        TargetStats {
            participant,
            label: label.to_string(),
            target_id,
            test_n: 1,
            record_n: 10,
            working_distance_cm: Some(65.0),
            accuracy_px: 10.0,
            accuracy_deg: Some(1.0),
            precision_px: Some(1.0),
            precision_deg: Some(0.1),
            bad_data: BadDataCounts {
                right: 1,
                left: 1,
                both: 2,
            },
            position: Some(label.rsplit(" :: ").next().unwrap_or_default().to_string()),
            raw_distances_px: raw,
        }
    }

    fn collated() -> CollatedStats {
        let mut stats = CollatedStats::default();
        for (id, colour, offset) in [(2, "Blue", 0.0), (3, "Brown", 50.0), (4, "Brown", 60.0), (5, "Green", 5.0)] {
            let mut p = participant(id, colour, Some(id as f64));
            for label in ["GP3 :: top", "GP3 :: bottom"] {
                p.target_stats.push(target(id, label, TargetId::All, Vec::new()));
                p.target_stats.push(target(
                    id,
                    label,
                    TargetId::Id(0),
                    vec![offset + 10.0, offset + 20.0, offset + 30.0],
                ));
            }
            stats.participants.insert(id, p);
        }
        stats
    }

    #[test]
    fn test_single_category() {
        let report = compare_samples(&collated(), GroupingKey::All, &SignificanceConfig::default()).unwrap();
        assert_eq!(report.counts, vec![(Category::from("all"), 4)]);
        assert!(!report.has_multiple_categories());
        assert!(report.across_categories.is_empty());
        assert!(report.error_bars.is_empty());

        // accuracy and precision, each comparing top with bottom
        assert_eq!(report.within_category.len(), 2);
        let accuracy = &report.within_category[0];
        assert_eq!(accuracy.stat, Stat::Accuracy);
        assert_eq!(accuracy.groups.len(), 2);
        assert_eq!(accuracy.groups[0].description.n, 12);
        assert!(matches!(accuracy.test, ComparisonTest::MannWhitney(TestOutcome::Completed(_))));
        // identical distributions at both positions
        assert!(!accuracy.test.is_significant(0.05));
    }

    #[test]
    fn test_accuracy_uses_participant_factor() {
        let report = compare_samples(&collated(), GroupingKey::EyesBlue, &SignificanceConfig::default()).unwrap();
        let blue = report
            .within_category
            .iter()
            .find(|c| c.context == "Blue eyes" && c.stat == Stat::Accuracy)
            .unwrap();
        // raw distances 10, 20, 30 px at 0.1 deg/px
        assert!((blue.groups[0].description.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_across_categories_kruskal() {
        let report = compare_samples(&collated(), GroupingKey::EyeColour, &SignificanceConfig::default()).unwrap();
        assert!(report.has_multiple_categories());
        // two stats x two labels
        assert_eq!(report.across_categories.len(), 4);
        let comparison = &report.across_categories[0];
        assert_eq!(comparison.groups.len(), 3);
        assert!(matches!(comparison.test, ComparisonTest::KruskalWallis { .. }));
        assert!(report.regressions.is_empty());
    }

    #[test]
    fn test_numeric_categories_regress() {
        let report = compare_samples(&collated(), GroupingKey::Panto, &SignificanceConfig::default()).unwrap();
        assert_eq!(report.regressions.len(), 4);
        let regression = &report.regressions[0];
        assert_eq!(regression.df, 2);
        assert!(regression.fit.completed().is_some());
        assert!(regression.spearman.completed().is_some());

        let mut out = Vec::new();
        report.write_error_bar_csv(&mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert!(csv.starts_with("label,stat,category,values\n"));
        // 30 * 0.1 is not exactly 3
        assert!(csv.contains("GP3 :: bottom,Accuracy,2,\"1,2,3"));
    }

    #[test]
    fn test_single_observation_is_insufficient() {
        let groups: [&[f64]; 2] = [&[1.0], &[2.0, 3.0]];
        let test = ComparisonTest::run(&groups, 0.05).unwrap();
        assert!(matches!(test, ComparisonTest::MannWhitney(TestOutcome::Insufficient(_))));
        assert!(!test.is_significant(0.05));

        let one: [&[f64]; 1] = [&[1.0, 2.0]];
        assert!(matches!(ComparisonTest::run(&one, 0.05).unwrap(), ComparisonTest::NotEnoughGroups));
    }

    #[test]
    fn test_dunn_only_after_significant_kruskal() {
        let separated: [&[f64]; 3] = [&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[7.0, 8.0, 9.0]];
        match ComparisonTest::run(&separated, 0.05).unwrap() {
            ComparisonTest::KruskalWallis { dunn, .. } => assert!(dunn.is_some()),
            other => panic!("unexpected test {:?}", other),
        }

        let mixed: [&[f64]; 3] = [&[1.0, 5.0, 9.0], &[2.0, 6.0, 7.0], &[3.0, 4.0, 8.0]];
        match ComparisonTest::run(&mixed, 0.05).unwrap() {
            ComparisonTest::KruskalWallis { dunn, .. } => assert!(dunn.is_none()),
            other => panic!("unexpected test {:?}", other),
        }
    }
}
