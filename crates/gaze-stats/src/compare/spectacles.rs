//! Accuracy against spectacle power and against calibration validation errors.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{Regression, Stat, TestOutcome};
use crate::collated::CollatedStats;
use crate::config::SignificanceConfig;
use crate::error::Result;
use crate::results::ScreenRegion;
use crate::stats::{confidence_interval, linear_fit, spearman, ConfidenceInterval, SpearmanResult};

/// Spectacle wearers for one label, with a fit per stat
#[derive(Debug, Clone, Serialize)]
pub struct RxSeries {
    pub label: String,
    pub ids: Vec<u32>,
    /// Spherical equivalent in diopters
    pub rx: Vec<f64>,
    pub accuracy: Vec<f64>,
    pub precision: Vec<f64>,
    pub regressions: Vec<Regression>,
}

impl RxSeries {
    fn new(label: String) -> Self {
        RxSeries {
            label,
            ids: Vec::new(),
            rx: Vec::new(),
            accuracy: Vec::new(),
            precision: Vec::new(),
            regressions: Vec::new(),
        }
    }

    pub fn values(&self, stat: Stat) -> &[f64] {
        match stat {
            Stat::Accuracy => &self.accuracy,
            Stat::Precision => &self.precision,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RxAnalysis {
    pub series: Vec<RxSeries>,
    /// Spectacle wearers without an all-targets stats row
    pub missing: Vec<u32>,
}

/// Regress accuracy and precision in degrees on spherical equivalent, per
/// label, for every participant who wears spectacles.
pub fn analyze_spectacle_rx(stats: &CollatedStats) -> Result<RxAnalysis> {
    let mut series: BTreeMap<String, RxSeries> = BTreeMap::new();
    let mut missing = Vec::new();

    for participant in stats.participants.values() {
        if !participant.wears_spectacles() {
            continue;
        }

        let mut found = false;
        for row in participant.summary_stats() {
            found = true;
            let (Some(accuracy), Some(precision)) = (row.accuracy_deg, row.precision_deg) else {
                warn!(
                    "Participant {} has no degree values for {}, skipping",
                    participant.id, row.label
                );
                continue;
            };
            let entry = series
                .entry(row.label.clone())
                .or_insert_with(|| RxSeries::new(row.label.clone()));
            entry.ids.push(participant.id);
            entry.rx.push(participant.spherical_dist_rx);
            entry.accuracy.push(accuracy);
            entry.precision.push(precision);
        }

        if !found {
            error!("Could not find 'all' stats for participant {}", participant.id);
            missing.push(participant.id);
        }
    }

    let mut series: Vec<RxSeries> = series.into_values().collect();
    for entry in &mut series {
        for stat in Stat::BOTH {
            let y = entry.values(stat);
            let regression = Regression {
                label: entry.label.clone(),
                stat,
                fit: TestOutcome::from_result(linear_fit(&entry.rx, y))?,
                spearman: TestOutcome::from_result(spearman(&entry.rx, y))?,
                df: entry.rx.len().saturating_sub(2),
            };
            entry.regressions.push(regression);
        }
        info!("Spectacle Rx: {} wearers for {}", entry.ids.len(), entry.label);
    }

    Ok(RxAnalysis { series, missing })
}

/// Targets of every participant with the same number of validation errors
#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorPoint {
    pub errors: u32,
    pub accuracy: TestOutcome<ConfidenceInterval>,
    pub precision: TestOutcome<ConfidenceInterval>,
}

impl ValidationErrorPoint {
    pub fn get(&self, stat: Stat) -> &TestOutcome<ConfidenceInterval> {
        match stat {
            Stat::Accuracy => &self.accuracy,
            Stat::Precision => &self.precision,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorSeries {
    pub region: ScreenRegion,
    pub points: Vec<ValidationErrorPoint>,
    /// Error count against mean accuracy
    pub accuracy: TestOutcome<SpearmanResult>,
    /// Error count against mean precision
    pub precision: TestOutcome<SpearmanResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorAnalysis {
    pub series: Vec<ValidationErrorSeries>,
}

/// Group each screen position's targets by the participant's validation
/// error count for that position.
///
/// Participants without a recorded error count are left out.
pub fn analyze_validation_errors(
    stats: &CollatedStats,
    config: &SignificanceConfig,
) -> Result<ValidationErrorAnalysis> {
    let mut series = Vec::new();

    for region in [ScreenRegion::Top, ScreenRegion::Bottom] {
        // errors -> (accuracy, precision)
        let mut groups: BTreeMap<u32, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for participant in stats.participants.values() {
            let Some(errors) = participant.validation_errors(region) else {
                continue;
            };
            let group = groups.entry(errors).or_default();
            for target in &participant.target_stats {
                let at_region = target
                    .position
                    .as_deref()
                    .is_some_and(|p| ScreenRegion::from_label(p) == region);
                if !at_region {
                    continue;
                }
                group.0.extend(target.accuracy_deg);
                group.1.extend(target.precision_deg);
            }
        }

        let mut points = Vec::new();
        for (errors, (accuracy, precision)) in groups {
            points.push(ValidationErrorPoint {
                errors,
                accuracy: TestOutcome::from_result(confidence_interval(&accuracy, config.confidence))?,
                precision: TestOutcome::from_result(confidence_interval(&precision, config.confidence))?,
            });
        }

        let correlate = |stat: Stat| -> Result<TestOutcome<SpearmanResult>> {
            let (x, y): (Vec<f64>, Vec<f64>) = points
                .iter()
                .filter_map(|p| p.get(stat).completed().map(|ci| (p.errors as f64, ci.mean)))
                .unzip();
            TestOutcome::from_result(spearman(&x, &y))
        };

        series.push(ValidationErrorSeries {
            region,
            accuracy: correlate(Stat::Accuracy)?,
            precision: correlate(Stat::Precision)?,
            points,
        });
    }

    Ok(ValidationErrorAnalysis { series })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{participant, target};
    use super::*;
    use crate::results::TargetId;

    #[test]
    fn test_rx_series_per_label() {
        let mut stats = CollatedStats::default();
        for (id, rx) in [(2, -1.0), (3, -2.0), (4, -3.0)] {
            let mut p = participant(id, "Blue", None);
            p.vert_right = "x".to_string();
            p.spherical_dist_rx = rx;
            let mut row = target(id, "GP3 :: top", TargetId::All, Vec::new());
            row.accuracy_deg = Some(-rx);
            p.target_stats.push(row);
            stats.participants.insert(id, p);
        }
        // no spectacles
        let mut p = participant(5, "Blue", None);
        p.target_stats.push(target(5, "GP3 :: top", TargetId::All, Vec::new()));
        stats.participants.insert(5, p);
        // spectacles but no summary row
        let mut p = participant(6, "Blue", None);
        p.vert_left = "x".to_string();
        stats.participants.insert(6, p);

        let analysis = analyze_spectacle_rx(&stats).unwrap();
        assert_eq!(analysis.missing, vec![6]);
        assert_eq!(analysis.series.len(), 1);

        let series = &analysis.series[0];
        assert_eq!(series.ids, vec![2, 3, 4]);
        let accuracy = &series.regressions[0];
        assert_eq!(accuracy.stat, Stat::Accuracy);
        assert_eq!(accuracy.df, 1);
        let fit = accuracy.fit.completed().unwrap();
        assert!((fit.slope + 1.0).abs() < 1e-12);
        assert!((accuracy.spearman.completed().unwrap().rho + 1.0).abs() < 1e-12);
        // precision is constant
        assert!(matches!(series.regressions[1].spearman, TestOutcome::Insufficient(_)));
    }

    #[test]
    fn test_validation_errors_grouped_by_count() {
        let mut stats = CollatedStats::default();
        for (id, errors) in [(2, 0), (3, 0), (4, 1), (5, 1), (6, 2), (7, 2)] {
            let mut p = participant(id, "Blue", None);
            p.validation_errors_top = Some(errors);
            p.validation_errors_bottom = Some(0);
            for (target_id, extra) in [(0, 0.0), (1, 0.2)] {
                let mut row = target(id, "GP3 :: top", TargetId::Id(target_id), Vec::new());
                row.accuracy_deg = Some(1.0 + errors as f64 + extra);
                p.target_stats.push(row);
            }
            stats.participants.insert(id, p);
        }

        let analysis = analyze_validation_errors(&stats, &SignificanceConfig::default()).unwrap();
        let top = &analysis.series[0];
        assert_eq!(top.region, ScreenRegion::Top);
        assert_eq!(top.points.len(), 3);
        let ci = top.points[1].accuracy.completed().unwrap();
        assert!((ci.mean - 2.1).abs() < 1e-12);
        assert!((top.accuracy.completed().unwrap().rho - 1.0).abs() < 1e-12);

        // every participant reported zero errors at the bottom, with no samples there
        let bottom = &analysis.series[1];
        assert_eq!(bottom.points.len(), 1);
        assert!(matches!(bottom.points[0].accuracy, TestOutcome::Insufficient(_)));
        assert!(matches!(bottom.accuracy, TestOutcome::Insufficient(_)));
    }
}
