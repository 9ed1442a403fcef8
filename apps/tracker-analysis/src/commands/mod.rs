//! Subcommand arguments and handlers

mod analyze;
mod compare;
mod targets;

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};

pub use analyze::{analyze, AnalyzeArgs};
pub use compare::{compare, simplify_survey, CompareArgs, SimplifySurveyArgs};
pub use targets::{
    cluster, target_compare, target_stats, ClusterArgs, TargetCompareArgs, TargetStatsArgs,
};

use crate::prompt::confirm_overwrite;

/// Confirm and create an output file
fn create_output(path: &Path) -> Result<File> {
    confirm_overwrite(path)?;
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}
