//! Configuration for eye tracker analysis runs
//!
//! This module provides TOML-based configuration for the screen geometry,
//! sample processing policy, significance thresholds and clustering parameters.
//! Every section is optional; missing values fall back to the settings used for
//! the 23.8in 1920x1080 monitor the experiments were recorded on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AnalysisError, Result};

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Physical and pixel dimensions of the display
    #[serde(default)]
    pub screen: ScreenConfig,
    /// Raw sample handling
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Hypothesis test settings
    #[serde(default)]
    pub analysis: SignificanceConfig,
    /// K-means settings used by the target clusterer
    #[serde(default)]
    pub clustering: ClusterConfig,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use gaze_stats::config::AnalysisConfig;
    ///
    /// # fn example() -> gaze_stats::Result<()> {
    /// let config = AnalysisConfig::from_file("analysis.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use gaze_stats::config::AnalysisConfig;
    ///
    /// let config = AnalysisConfig::from_str(r#"
    ///     [screen]
    ///     resolution = [2560, 1440]
    /// "#).unwrap();
    /// assert_eq!(config.screen.resolution, [2560, 1440]);
    /// assert_eq!(config.clustering.seed, 3142);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Display geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Width and height in pixels. Gaze coordinates outside
    /// `[0, resolution]` on either axis are treated as bad reads.
    pub resolution: [i64; 2],
    /// Physical diagonal in inches
    pub diagonal_in: f64,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            resolution: [1920, 1080],
            diagonal_in: 23.8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Drop a sample whose reconciled position repeats the previous retained
    /// sample. Only useful for trackers that report their last good reading
    /// instead of an out-of-range value.
    pub remove_duplicate_readings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    /// p-value below which a comparison is reported as significant
    pub significance: f64,
    /// Confidence level for Student-t intervals
    pub confidence: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub seed: u64,
    pub k_min: usize,
    pub k_max: usize,
    /// Number of random initialisations per fit; the lowest inertia wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance, relative to the mean feature variance
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            seed: 3142,
            k_min: 2,
            k_max: 10,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

/// The two experiment designs the data was collected under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Study {
    /// Tracker mounted above and below the screen
    Position,
    /// Several viewing distances with and without a chinrest
    #[default]
    Validation,
}

impl Study {
    /// Screen positions reported in target tables for this study
    pub fn positions(&self) -> &'static [&'static str] {
        match self {
            Study::Position => &["Top", "Bottom"],
            Study::Validation => &[
                "far_chinrest",
                "mid_chinrest",
                "mid_unrestricted",
                "near_chinrest",
            ],
        }
    }
}

impl FromStr for Study {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "position" => Ok(Study::Position),
            "validation" => Ok(Study::Validation),
            other => Err(AnalysisError::InvalidStudy(other.to_string())),
        }
    }
}

impl fmt::Display for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Study::Position => write!(f, "position"),
            Study::Validation => write!(f, "validation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AnalysisConfig::from_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.screen.resolution, [1920, 1080]);
        assert!(!config.processing.remove_duplicate_readings);
        assert_eq!(config.clustering.k_max, 10);
    }

    #[test]
    fn test_partial_sections() {
        let config = AnalysisConfig::from_str(
            r#"
            [processing]
            remove_duplicate_readings = true

            [clustering]
            seed = 93
            "#,
        )
        .unwrap();
        assert!(config.processing.remove_duplicate_readings);
        assert_eq!(config.clustering.seed, 93);
        assert_eq!(config.clustering.n_init, 10);
        assert_eq!(config.analysis.confidence, 0.95);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            AnalysisConfig::from_str("[screen\nresolution = 3"),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_study_parse() {
        assert_eq!("position".parse::<Study>().unwrap(), Study::Position);
        assert_eq!("validation".parse::<Study>().unwrap(), Study::Validation);
        assert!(matches!(
            "pilot".parse::<Study>(),
            Err(AnalysisError::InvalidStudy(s)) if s == "pilot"
        ));
    }

    #[test]
    fn test_study_positions() {
        assert_eq!(Study::Position.positions(), &["Top", "Bottom"]);
        assert_eq!(Study::Validation.positions().len(), 4);
    }
}
