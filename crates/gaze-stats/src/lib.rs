//! Accuracy and precision statistics for eye tracker experiments
//!
//! This crate turns raw gaze recordings into per-target accuracy and
//! precision figures and compares them across trackers, screen positions
//! and participant groups.
//!
//! # Features
//!
//! - **Gaze reconciliation**: Combine the two eyes of every sample, count bad reads
//! - **Accuracy statistics**: Per-label and per-target accuracy and precision in
//!   pixels and visual degrees, with a normality check
//! - **Collation**: Join survey answers with per-participant stats and raw distances
//! - **Comparison**: Mann-Whitney, Kruskal-Wallis with Dunn, chi-square and
//!   Spearman tests across participant groups
//! - **Target clustering**: Seeded K-means with knee detection to pick the best
//!   subset of screen targets
//! - **Reports**: Console and JSON output
//!
//! # Example
//!
//! ```no_run
//! use gaze_stats::results::{ExperimentResults, StatsQuery, StatsSummary, TargetSubset};
//! use gaze_stats::AnalysisConfig;
//!
//! # fn example() -> gaze_stats::Result<()> {
//! let config = AnalysisConfig::from_file("analysis.toml")?;
//! let results = ExperimentResults::load("session.csv", &config, &TargetSubset::all())?;
//!
//! let query = StatsQuery {
//!     distance_cm: Some(65.0),
//!     ..Default::default()
//! };
//! let stats = results.stats(&query)?;
//! StatsSummary::write_to_file("session.stats.csv", stats)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Runs are configured with an optional TOML file:
//!
//! ```toml
//! [screen]
//! resolution = [1920, 1080]
//! diagonal_in = 23.8
//!
//! [processing]
//! remove_duplicate_readings = false
//!
//! [analysis]
//! significance = 0.05
//! confidence = 0.95
//!
//! [clustering]
//! seed = 3142
//! k_min = 2
//! k_max = 10
//! ```

pub mod cluster;
pub mod collated;
pub mod compare;
pub mod config;
pub mod error;
pub mod gaze;
pub mod geometry;
pub mod raw;
pub mod reporter;
pub mod results;
pub mod stats;
pub mod survey;
pub mod target_table;

pub use config::{AnalysisConfig, Study};
pub use error::{AnalysisError, Result};
