//! Per-identifier accuracy and precision from raw gaze samples.
//!
//! [`ExperimentResults`] streams a raw sample file once, reconciles both eyes
//! for every reading and keeps the reconciled positions grouped by subject and
//! identifier (tracker and position label). Statistics are computed on demand
//! and cached; see [`ExperimentResults::stats`].

pub mod stats;
pub mod targets;

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::gaze::{BadDataCounts, BadSide, DuplicateFilter, GazeReconciler};
use crate::geometry::{pixel_distance, ScreenGeometry};
use crate::raw::{read_raw_rows, RawRow, RawSample};
use crate::stats::{ks_normal, mean, pstdev};

pub use stats::{ExperimentStats, StatsRow, StatsSummary, TargetId};
pub use targets::{ScreenRegion, TargetRegistry, TargetSubset};

/// One experimental condition: a tracker at a screen position
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ident {
    pub tracker: String,
    pub label: String,
}

impl Ident {
    pub fn new(tracker: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            tracker: tracker.into(),
            label: label.into(),
        }
    }

    pub fn region(&self) -> ScreenRegion {
        ScreenRegion::from_label(&self.label)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.tracker, self.label)
    }
}

/// A retained, reconciled reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazePoint {
    pub target_id: u32,
    pub x: f64,
    pub y: f64,
}

impl GazePoint {
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Default)]
struct IdentTally {
    test_n: u64,
    record_n: BTreeMap<u32, u64>,
    bad_data: BadDataCounts,
    target_bad_data: BTreeMap<u32, BadDataCounts>,
}

/// Filters applied by [`ExperimentResults::stats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsQuery {
    pub subject: Option<String>,
    pub ident: Option<Ident>,
    pub distance_cm: Option<f64>,
    /// Written to the participant column; does not filter
    pub participant: Option<String>,
}

/// Loaded experiment: target coordinates and reconciled gaze per subject
#[derive(Debug)]
pub struct ExperimentResults {
    screen: ScreenGeometry,
    significance: f64,
    targets: TargetRegistry,
    subject_data: BTreeMap<String, BTreeMap<Ident, Vec<GazePoint>>>,
    tallies: BTreeMap<Ident, IdentTally>,
    total_rows: usize,
    ignored_rows: usize,
    stats: OnceCell<(StatsQuery, Vec<ExperimentStats>)>,
}

impl ExperimentResults {
    /// Load and reconcile a raw sample file.
    ///
    /// # Errors
    ///
    /// Fails on a missing or malformed file, and with
    /// [`AnalysisError::InconsistentTarget`](crate::AnalysisError::InconsistentTarget)
    /// when a target id is recorded at two different positions.
    pub fn load<P: AsRef<Path>>(path: P, config: &AnalysisConfig, subset: &TargetSubset) -> Result<Self> {
        let path = path.as_ref();
        info!("Using input file: {}", path.display());
        let rows = read_raw_rows(path)?;
        Self::from_rows(rows, config, subset)
    }

    pub fn from_rows<I>(rows: I, config: &AnalysisConfig, subset: &TargetSubset) -> Result<Self>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let screen = ScreenGeometry::from(&config.screen);
        let reconciler = GazeReconciler::new(screen);
        let mut duplicates = DuplicateFilter::new(config.processing.remove_duplicate_readings);

        let mut results = ExperimentResults {
            screen,
            significance: config.analysis.significance,
            targets: TargetRegistry::new(),
            subject_data: BTreeMap::new(),
            tallies: BTreeMap::new(),
            total_rows: 0,
            ignored_rows: 0,
            stats: OnceCell::new(),
        };

        let mut unfiltered_labels = BTreeSet::new();
        let mut session_started = false;
        for row in rows {
            results.total_rows += 1;
            let sample = match row {
                RawRow::Header(fields) => {
                    debug!("Ignoring header row: {:?}", fields);
                    results.ignored_rows += 1;
                    session_started = true;
                    continue;
                }
                RawRow::Sample(sample) => sample,
            };

            results.subject_data.entry(sample.subject.clone()).or_default();

            let region = ScreenRegion::from_label(&sample.label);
            if region == ScreenRegion::Other
                && subset.is_filtering()
                && unfiltered_labels.insert(sample.label.clone())
            {
                info!("Label '{}' is neither top nor bottom, keeping all targets", sample.label);
            }
            if !subset.allows(region, sample.target_id) {
                continue;
            }
            results.targets.register(region, sample.target_id, sample.target)?;

            let ident = Ident::new(sample.tracker.as_str(), sample.label.as_str());
            let tally = results.tallies.entry(ident.clone()).or_default();
            *tally.record_n.entry(sample.target_id).or_insert(0) += 1;
            if session_started {
                tally.test_n += 1;
                session_started = false;
            }

            let gaze = reconciler.reconcile(sample.right_eye, sample.left_eye);
            if let Some(side) = gaze.bad_side {
                tally.bad_data.record(side);
                tally
                    .target_bad_data
                    .entry(sample.target_id)
                    .or_default()
                    .record(side);
            }

            if !gaze.is_usable() {
                debug!(
                    "Ignoring invalid data: right = {:?} left = {:?}",
                    sample.right_eye, sample.left_eye
                );
                results.ignored_rows += 1;
                continue;
            }

            if !duplicates.retain(gaze.position()) {
                debug!("Ignoring duplicate data: {:?}", gaze.position());
                results.ignored_rows += 1;
                tally.bad_data.record(BadSide::Both);
                continue;
            }

            results.push_point(&sample, ident, gaze.position());
        }

        info!(
            "{} data rows found, {} rows ignored",
            results.total_rows - results.ignored_rows,
            results.ignored_rows
        );
        Ok(results)
    }

    fn push_point(&mut self, sample: &RawSample, ident: Ident, (x, y): (f64, f64)) {
        self.subject_data
            .entry(sample.subject.clone())
            .or_default()
            .entry(ident)
            .or_default()
            .push(GazePoint {
                target_id: sample.target_id,
                x,
                y,
            });
    }

    pub fn screen(&self) -> &ScreenGeometry {
        &self.screen
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    /// Subjects seen in data rows, in sorted order
    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subject_data.keys().map(String::as_str)
    }

    pub fn subject_count(&self) -> usize {
        self.subject_data.len()
    }

    /// Retained gaze points per identifier, merged across matching subjects.
    ///
    /// `None` for either filter matches everything.
    pub fn gaze_points(&self, subject: Option<&str>, ident: Option<&Ident>) -> BTreeMap<Ident, Vec<GazePoint>> {
        let mut filtered: BTreeMap<Ident, Vec<GazePoint>> = BTreeMap::new();
        for (subj, idents) in &self.subject_data {
            if subject.is_some_and(|s| s != subj) {
                continue;
            }
            for (id, points) in idents {
                if ident.is_some_and(|wanted| wanted != id) {
                    continue;
                }
                filtered.entry(id.clone()).or_default().extend_from_slice(points);
            }
        }
        filtered
    }

    pub fn bad_data(&self, ident: &Ident) -> Option<BadDataCounts> {
        self.tallies.get(ident).map(|t| t.bad_data)
    }

    /// Number of rows in the file, headers included
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Header rows plus readings dropped as invalid or duplicate
    pub fn ignored_rows(&self) -> usize {
        self.ignored_rows
    }

    /// Accuracy and precision per identifier.
    ///
    /// The first call computes and caches the result. Later calls return the
    /// cached statistics even when `query` differs; build a new
    /// `ExperimentResults` to compute a different scope.
    pub fn stats(&self, query: &StatsQuery) -> Result<&[ExperimentStats]> {
        if let Some((cached_query, stats)) = self.stats.get() {
            if cached_query != query {
                warn!(
                    "Stats already computed for {:?}; ignoring new query {:?}",
                    cached_query, query
                );
            }
            return Ok(stats);
        }

        let computed = self.compute_stats(query)?;
        let (_, stats) = self.stats.get_or_init(|| (query.clone(), computed));
        Ok(stats)
    }

    fn compute_stats(&self, query: &StatsQuery) -> Result<Vec<ExperimentStats>> {
        let mut distances: BTreeMap<Ident, Vec<f64>> = BTreeMap::new();
        let mut target_distances: BTreeMap<Ident, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();

        let points = self.gaze_points(query.subject.as_deref(), query.ident.as_ref());
        for (ident, points) in &points {
            let region = ident.region();
            let all = distances.entry(ident.clone()).or_default();
            let per_target = target_distances.entry(ident.clone()).or_default();

            for point in points {
                let Some(target) = self.targets.get(region, point.target_id) else {
                    warn!("Not including target {} for {}", point.target_id, ident);
                    continue;
                };
                let distance = pixel_distance(point.position(), target);
                all.push(distance);
                per_target.entry(point.target_id).or_default().push(distance);
            }
        }

        let conversion = query.distance_cm.map(|d| self.screen.degrees_per_pixel(d));
        let mut stats = Vec::with_capacity(distances.len());

        for (ident, samples) in &distances {
            let Some(tally) = self.tallies.get(ident) else {
                continue;
            };
            let Some(mut summary) = self.summarise(query, conversion, ident, samples, tally.bad_data)? else {
                warn!("No usable readings for {}", ident);
                continue;
            };
            summary.test_n = tally.test_n;
            summary.record_n = tally.record_n.values().sum();

            if let Some(per_target) = target_distances.get(ident) {
                for (&target_id, samples) in per_target {
                    let bad = tally
                        .target_bad_data
                        .get(&target_id)
                        .copied()
                        .unwrap_or_default();
                    if let Some(mut target) = self.summarise(query, conversion, ident, samples, bad)? {
                        target.target = Some(target_id);
                        target.test_n = tally.test_n;
                        target.record_n = tally.record_n.get(&target_id).copied().unwrap_or(0);
                        summary.targets.push(target);
                    }
                }
            }
            stats.push(summary);
        }

        Ok(stats)
    }

    fn summarise(
        &self,
        query: &StatsQuery,
        conversion: Option<f64>,
        ident: &Ident,
        samples: &[f64],
        bad_data: BadDataCounts,
    ) -> Result<Option<ExperimentStats>> {
        let (Some(accuracy_px), Some(precision_px)) = (mean(samples), pstdev(samples)) else {
            return Ok(None);
        };
        let parametric = ks_normal(samples)?.is_normal(self.significance);

        Ok(Some(ExperimentStats {
            participant: query.participant.clone(),
            label: ident.to_string(),
            target: None,
            test_n: 0,
            record_n: 0,
            distance_cm: query.distance_cm,
            accuracy_px,
            precision_px,
            accuracy_deg: conversion.map(|c| accuracy_px * c),
            precision_deg: conversion.map(|c| precision_px * c),
            bad_data,
            parametric,
            targets: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::raw::read_raw_rows_from;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Label,Subject,Tracker,Timestamp,Target-ID,Target-X,Target-Y,Cursor-X,Cursor-Y,Actual-X-Right,Actual-Y-Right,Actual-X-Left,Actual-Y-Left";

    fn row(label: &str, subject: &str, target: u32, coords: (i64, i64), right: (i64, i64), left: (i64, i64)) -> String {
        format!(
            "{},{},GP3,0,{},{},{},0,0,{},{},{},{}",
            label, subject, target, coords.0, coords.1, right.0, right.1, left.0, left.1
        )
    }

    fn load(lines: &[String], config: &AnalysisConfig, subset: &TargetSubset) -> Result<ExperimentResults> {
        let data = lines.join("\n");
        let rows = read_raw_rows_from(data.as_bytes())?;
        ExperimentResults::from_rows(rows, config, subset)
    }

    fn three_samples() -> Vec<String> {
        let target = (960, 540);
        vec![
            HEADER.to_string(),
            row("top", "1", 0, target, (960, 540), (960, 540)),
            row("top", "1", 0, target, (970, 540), (970, 540)),
            row("top", "1", 0, target, (950, 540), (950, 540)),
        ]
    }

    #[test]
    fn test_accuracy_and_precision() {
        let results = load(&three_samples(), &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        let stats = results.stats(&StatsQuery::default()).unwrap();

        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!(s.label, "GP3 :: top");
        assert!((s.accuracy_px - 20.0 / 3.0).abs() < 1e-9);
        assert!((s.precision_px - 4.714045).abs() < 1e-6);
        assert_eq!(s.test_n, 1);
        assert_eq!(s.record_n, 3);
        assert_eq!(s.accuracy_deg, None);
        assert_eq!(s.targets.len(), 1);
        assert_eq!(s.targets[0].target, Some(0));
        assert_eq!(s.targets[0].accuracy_px, s.accuracy_px);
    }

    #[test]
    fn test_degree_conversion() {
        let results = load(&three_samples(), &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        let query = StatsQuery {
            distance_cm: Some(65.0),
            participant: Some("4".to_string()),
            ..StatsQuery::default()
        };
        let stats = results.stats(&query).unwrap();
        let factor = ScreenGeometry::default().degrees_per_pixel(65.0);
        assert_eq!(stats[0].accuracy_deg, Some(stats[0].accuracy_px * factor));
        assert_eq!(stats[0].participant.as_deref(), Some("4"));
        assert_eq!(stats[0].distance_cm, Some(65.0));
    }

    #[test]
    fn test_bad_reads_counted_but_excluded() {
        let mut lines = three_samples();
        lines.push(row("top", "1", 0, (960, 540), (99999, 99999), (99999, 99999)));
        lines.push(row("top", "1", 0, (960, 540), (960, 540), (99999, 540)));

        let results = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        let stats = results.stats(&StatsQuery::default()).unwrap();
        let s = &stats[0];
        assert_eq!(s.record_n, 5);
        assert_eq!(s.bad_data, BadDataCounts { right: 0, left: 1, both: 1 });
        assert_eq!(s.targets[0].bad_data, s.bad_data);
        // both-bad sample excluded, one-eye sample kept at distance 0
        assert!((s.accuracy_px - 5.0).abs() < 1e-9);
        assert_eq!(results.ignored_rows(), 2);
    }

    #[test]
    fn test_sessions_counted_per_header() {
        let mut lines = three_samples();
        lines.push(HEADER.to_string());
        lines.push(row("top", "2", 0, (960, 540), (960, 540), (960, 540)));
        let results = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        assert_eq!(results.subject_count(), 2);

        let stats = results.stats(&StatsQuery::default()).unwrap();
        assert_eq!(stats[0].test_n, 2);
        assert_eq!(stats[0].record_n, 4);
    }

    #[test]
    fn test_inconsistent_target_is_fatal() {
        let mut lines = three_samples();
        lines.push(row("top", "1", 0, (961, 540), (960, 540), (960, 540)));
        let err = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap_err();
        assert!(matches!(err, AnalysisError::InconsistentTarget { target_id: 0, .. }));
    }

    #[test]
    fn test_regions_have_separate_targets() {
        let lines = vec![
            row("mf - top", "1", 0, (100, 100), (100, 100), (100, 100)),
            row("mf - bottom", "1", 0, (100, 900), (100, 900), (100, 900)),
        ];
        let results = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        assert_eq!(results.targets().get(ScreenRegion::Top, 0), Some((100, 100)));
        assert_eq!(results.targets().get(ScreenRegion::Bottom, 0), Some((100, 900)));

        let stats = results.stats(&StatsQuery::default()).unwrap();
        assert!(stats.iter().all(|s| s.accuracy_px == 0.0));
    }

    #[test]
    fn test_subset_filters_rows() {
        let lines = vec![
            row("top", "1", 0, (100, 100), (100, 100), (100, 100)),
            row("top", "1", 1, (200, 100), (210, 100), (210, 100)),
        ];
        let subset = TargetSubset::from_reader("top,1\n".as_bytes()).unwrap();
        let results = load(&lines, &AnalysisConfig::default(), &subset).unwrap();
        let stats = results.stats(&StatsQuery::default()).unwrap();
        assert_eq!(stats[0].record_n, 1);
        assert_eq!(stats[0].targets.len(), 1);
        assert_eq!(stats[0].targets[0].target, Some(1));
        assert!((stats[0].accuracy_px - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_subset_matches_capitalised_labels() {
        let lines = vec![
            row("mf - Top", "1", 0, (100, 100), (100, 100), (100, 100)),
            row("mf - Top", "1", 1, (200, 100), (210, 100), (210, 100)),
            row("mf - Bottom", "1", 0, (100, 900), (100, 900), (100, 900)),
        ];
        let subset = TargetSubset::from_reader("Top,1
Bottom,5
".as_bytes()).unwrap();
        let results = load(&lines, &AnalysisConfig::default(), &subset).unwrap();
        let stats = results.stats(&StatsQuery::default()).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].targets.len(), 1);
        assert_eq!(stats[0].targets[0].target, Some(1));
    }

    #[test]
    fn test_duplicate_readings_removed_when_enabled() {
        let mut lines = three_samples();
        lines.push(row("top", "1", 0, (960, 540), (950, 540), (950, 540)));

        let mut config = AnalysisConfig::default();
        config.processing.remove_duplicate_readings = true;
        let results = load(&lines, &config, &TargetSubset::all()).unwrap();
        let stats = results.stats(&StatsQuery::default()).unwrap();
        assert_eq!(stats[0].bad_data.both, 1);
        assert!((stats[0].accuracy_px - 20.0 / 3.0).abs() < 1e-9);

        let results = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        let stats = results.stats(&StatsQuery::default()).unwrap();
        assert_eq!(stats[0].bad_data.both, 0);
        assert!((stats[0].accuracy_px - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_stats_are_cached() {
        let mut lines = three_samples();
        lines.push(row("bottom", "1", 0, (960, 540), (960, 540), (960, 540)));
        let results = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap();

        let first = results
            .stats(&StatsQuery {
                ident: Some(Ident::new("GP3", "top")),
                ..StatsQuery::default()
            })
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = results.stats(&StatsQuery::default()).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].label, "GP3 :: top");
    }

    #[test]
    fn test_subject_filter() {
        let lines = vec![
            row("top", "1", 0, (100, 100), (100, 100), (100, 100)),
            row("top", "2", 0, (100, 100), (110, 100), (110, 100)),
        ];
        let results = load(&lines, &AnalysisConfig::default(), &TargetSubset::all()).unwrap();
        let stats = results
            .stats(&StatsQuery {
                subject: Some("2".to_string()),
                ..StatsQuery::default()
            })
            .unwrap();
        assert_eq!(stats[0].accuracy_px, 10.0);
        assert_eq!(results.subjects().collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
