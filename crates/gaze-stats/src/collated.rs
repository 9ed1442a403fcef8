//! Survey responses joined with per-participant accuracy statistics.
//!
//! Three tables are merged by participant ID: the simplified survey, the
//! stats summary produced for every participant, and the raw gaze samples.
//! The raw samples are needed because precision is recomputed from the
//! individual distances for each target.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, Study};
use crate::error::{require_file, AnalysisError, Result};
use crate::gaze::{BadDataCounts, GazeReconciler};
use crate::geometry::{pixel_distance, ScreenGeometry};
use crate::raw::{read_raw_rows_from, RawRow};
use crate::results::{Ident, ScreenRegion, TargetId};

/// Simplified survey row
#[derive(Debug, Deserialize)]
struct SurveyRow {
    #[serde(rename = "ID")]
    id: u32,
    #[serde(rename = "EyeColour")]
    eye_colour: String,
    #[serde(rename = "Correction")]
    correction: String,
    #[serde(rename = "EyeConditions", default)]
    eye_conditions: String,
    #[serde(rename = "Posture3mVal")]
    posture_3m: f64,
    #[serde(rename = "Posture33cmVal")]
    posture_33cm: f64,
    #[serde(rename = "HasARCoat", default)]
    has_ar_coat: String,
    #[serde(rename = "VertRight", default)]
    vert_right: String,
    #[serde(rename = "VertLeft", default)]
    vert_left: String,
    #[serde(rename = "SphericalDistRx")]
    spherical_dist_rx: f64,
    #[serde(rename = "MFAdd", default)]
    mf_add: Option<f64>,
    #[serde(rename = "Panto", default)]
    panto: Option<f64>,
    #[serde(rename = "ValidationErrorsTop", default)]
    validation_errors_top: Option<f64>,
    #[serde(rename = "ValidationErrorsBottom", default)]
    validation_errors_bottom: Option<f64>,
}

/// Stats summary row as read for collation. Precision is kept as text so a
/// literal "0" can be told apart from a computed zero.
#[derive(Debug, Deserialize)]
struct ParticipantStatsRow {
    participant: u32,
    label: String,
    target_id: TargetId,
    test_n: u64,
    record_n: u64,
    working_distance_cm: Option<f64>,
    accuracy_px: f64,
    accuracy_deg: Option<f64>,
    precision_px: String,
    precision_deg: String,
    bad_both: u64,
    bad_right: u64,
    bad_left: u64,
}

fn optional_float(column: &str, value: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AnalysisError::invalid_field(column, value))
}

/// Accuracy statistics for one label and target of a participant
#[derive(Debug, Clone, PartialEq)]
pub struct TargetStats {
    pub participant: u32,
    /// "tracker :: label"
    pub label: String,
    pub target_id: TargetId,
    pub test_n: u64,
    pub record_n: u64,
    pub working_distance_cm: Option<f64>,
    pub accuracy_px: f64,
    pub accuracy_deg: Option<f64>,
    /// `None` when the stats file recorded no precision
    pub precision_px: Option<f64>,
    pub precision_deg: Option<f64>,
    pub bad_data: BadDataCounts,
    /// Position label of the raw samples attached to this record
    pub position: Option<String>,
    pub raw_distances_px: Vec<f64>,
}

/// One survey respondent and their accuracy results
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    pub id: u32,
    pub eye_colour: String,
    pub correction: String,
    pub eye_conditions: String,
    pub posture_3m: f64,
    pub posture_33cm: f64,
    pub has_ar_coat: bool,
    pub vert_right: String,
    pub vert_left: String,
    pub spherical_dist_rx: f64,
    pub mf_add: Option<f64>,
    pub panto: Option<f64>,
    pub validation_errors_top: Option<u32>,
    pub validation_errors_bottom: Option<u32>,
    /// Degrees per pixel, from the first stats row of this participant
    pub px_to_deg: Option<f64>,
    pub target_stats: Vec<TargetStats>,
}

impl ParticipantRecord {
    fn from_survey(row: SurveyRow, study: Study) -> Result<Self> {
        let errors = |value: Option<f64>, column: &str| -> Result<Option<u32>> {
            match (study, value) {
                (Study::Position, None) => Err(AnalysisError::MissingColumn(column.to_string())),
                (_, value) => Ok(value.map(|v| v as u32)),
            }
        };

        Ok(ParticipantRecord {
            id: row.id,
            validation_errors_top: errors(row.validation_errors_top, "ValidationErrorsTop")?,
            validation_errors_bottom: errors(row.validation_errors_bottom, "ValidationErrorsBottom")?,
            eye_colour: row.eye_colour,
            correction: row.correction,
            eye_conditions: row.eye_conditions,
            posture_3m: row.posture_3m,
            posture_33cm: row.posture_33cm,
            has_ar_coat: row.has_ar_coat.trim() == "1",
            vert_right: row.vert_right,
            vert_left: row.vert_left,
            spherical_dist_rx: row.spherical_dist_rx,
            mf_add: row.mf_add,
            panto: row.panto,
            px_to_deg: None,
            target_stats: Vec::new(),
        })
    }

    pub fn eyes_blue(&self) -> &'static str {
        if self.eye_colour == "Blue" {
            "Blue eyes"
        } else {
            "Not blue eyes"
        }
    }

    pub fn eyes_dark(&self) -> &'static str {
        if matches!(self.eye_colour.as_str(), "Brown" | "Dark Brown") {
            "Dark eyes"
        } else {
            "Light eyes"
        }
    }

    /// Whether frame measurements were recorded, i.e. spectacles were worn
    pub fn wears_spectacles(&self) -> bool {
        !(self.vert_right.is_empty() && self.vert_left.is_empty())
    }

    pub fn validation_errors(&self, region: ScreenRegion) -> Option<u32> {
        match region {
            ScreenRegion::Top => self.validation_errors_top,
            ScreenRegion::Bottom => self.validation_errors_bottom,
            ScreenRegion::Other => None,
        }
    }

    /// The summary row over all targets for each label
    pub fn summary_stats(&self) -> impl Iterator<Item = &TargetStats> {
        self.target_stats
            .iter()
            .filter(|t| t.target_id == TargetId::All)
    }
}

/// All participants of a study
#[derive(Debug, Clone, Default)]
pub struct CollatedStats {
    pub study: Study,
    pub participants: BTreeMap<u32, ParticipantRecord>,
    /// Participants with stats or raw samples but no survey response
    pub unsurveyed: BTreeSet<u32>,
}

impl CollatedStats {
    /// Load and join the three input files.
    ///
    /// # Errors
    ///
    /// Fails when a file is missing or malformed. Participants that appear
    /// in the stats or raw files but not in the survey are skipped.
    pub fn load<P1, P2, P3>(
        survey: P1,
        participant_stats: P2,
        raw: P3,
        study: Study,
        config: &AnalysisConfig,
    ) -> Result<Self>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
    {
        let open = |path: &Path| -> Result<File> {
            require_file(path)?;
            File::open(path).map_err(|e| AnalysisError::io(path, e))
        };
        Self::from_readers(
            open(survey.as_ref())?,
            open(participant_stats.as_ref())?,
            open(raw.as_ref())?,
            study,
            config,
        )
    }

    pub fn from_readers<R1: Read, R2: Read, R3: Read>(
        survey: R1,
        participant_stats: R2,
        raw: R3,
        study: Study,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        let mut collated = CollatedStats {
            study,
            participants: BTreeMap::new(),
            unsurveyed: BTreeSet::new(),
        };
        collated.load_survey(survey)?;
        collated.load_participant_stats(participant_stats)?;
        collated.load_raw(raw, ScreenGeometry::from(&config.screen))?;
        Ok(collated)
    }

    fn load_survey<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        for row in reader.deserialize::<SurveyRow>() {
            let record = ParticipantRecord::from_survey(row?, self.study)?;
            self.participants.insert(record.id, record);
        }
        info!("Loaded {} survey responses", self.participants.len());
        Ok(())
    }

    fn load_participant_stats<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        for row in reader.deserialize::<ParticipantStatsRow>() {
            let row = row?;
            let Some(participant) = self.participants.get_mut(&row.participant) else {
                info!("Skipping stats for participant {}: not in survey", row.participant);
                self.unsurveyed.insert(row.participant);
                continue;
            };

            let (precision_px, precision_deg) = if row.precision_px == "0" && row.precision_deg == "0" {
                (None, None)
            } else {
                (
                    optional_float("precision_px", &row.precision_px)?,
                    optional_float("precision_deg", &row.precision_deg)?,
                )
            };

            if participant.px_to_deg.is_none() {
                participant.px_to_deg = match row.accuracy_deg {
                    Some(deg) if row.accuracy_px > 0.0 => Some(deg / row.accuracy_px),
                    _ => None,
                };
            }

            participant.target_stats.push(TargetStats {
                participant: row.participant,
                label: row.label,
                target_id: row.target_id,
                test_n: row.test_n,
                record_n: row.record_n,
                working_distance_cm: row.working_distance_cm,
                accuracy_px: row.accuracy_px,
                accuracy_deg: row.accuracy_deg,
                precision_px,
                precision_deg,
                bad_data: BadDataCounts {
                    right: row.bad_right,
                    left: row.bad_left,
                    both: row.bad_both,
                },
                position: None,
                raw_distances_px: Vec::new(),
            });
        }
        Ok(())
    }

    fn load_raw<R: Read>(&mut self, reader: R, screen: ScreenGeometry) -> Result<()> {
        let reconciler = GazeReconciler::new(screen);
        let mut attached = 0usize;

        for row in read_raw_rows_from(reader)? {
            let RawRow::Sample(sample) = row else {
                continue;
            };
            let subject = sample.subject.trim();
            let id = subject
                .parse::<u32>()
                .map_err(|_| AnalysisError::invalid_field("Subject", subject))?;
            let Some(participant) = self.participants.get_mut(&id) else {
                if self.unsurveyed.insert(id) {
                    info!("Skipping raw samples for participant {}: not in survey", id);
                }
                continue;
            };

            let gaze = reconciler.reconcile(sample.right_eye, sample.left_eye);
            if !gaze.is_usable() {
                continue;
            }

            let label = Ident::new(sample.tracker.as_str(), sample.label.as_str()).to_string();
            let target = TargetId::Id(sample.target_id);
            let Some(record) = participant
                .target_stats
                .iter_mut()
                .find(|t| t.label == label && t.target_id == target)
            else {
                debug!("No target record for {} :: {} :: {}", label, sample.target_id, id);
                continue;
            };

            record
                .raw_distances_px
                .push(pixel_distance(gaze.position(), sample.target));
            record.position = Some(sample.label.clone());
            attached += 1;
        }

        info!("Attached {} raw samples to target records", attached);
        let without_factor = self
            .participants
            .values()
            .filter(|p| p.px_to_deg.is_none() && !p.target_stats.is_empty())
            .count();
        if without_factor > 0 {
            warn!(
                "{} participants have no pixel to degree factor and will be skipped",
                without_factor
            );
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
