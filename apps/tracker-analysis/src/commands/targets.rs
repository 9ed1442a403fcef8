use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gaze_stats::cluster::{write_best_clusters, TargetClusterer};
use gaze_stats::reporter::{OutputFormat, Reporter, TargetCompareReport};
use gaze_stats::results::StatsSummary;
use gaze_stats::target_table::{compare_targets, TargetTable};
use gaze_stats::{AnalysisConfig, Study};
use tracing::info;

use super::create_output;
use crate::plots::plot_clusters;
use crate::prompt::confirm_overwrite;

#[derive(Args, Debug)]
pub struct TargetStatsArgs {
    /// Stats summary written by `analyze`
    pub input_stats_csv: PathBuf,
    pub output_csv: PathBuf,
    /// position or validation
    #[arg(default_value_t = Study::default())]
    pub study: Study,
}

#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Target table written by `target-stats`
    pub target_stats_csv: PathBuf,
    /// Best targets per screen position
    pub outfile_csv: PathBuf,
    pub outfile_svg: PathBuf,
    #[arg(default_value_t = Study::default())]
    pub study: Study,
}

#[derive(Args, Debug)]
pub struct TargetCompareArgs {
    /// Target table of a position study
    pub target_csv: PathBuf,
    #[arg(short, long, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,
}

pub fn target_stats(args: TargetStatsArgs) -> Result<()> {
    let rows = StatsSummary::read(&args.input_stats_csv)?;
    let table = TargetTable::from_stats(&rows, args.study)?;

    let file = create_output(&args.output_csv)?;
    table.write(file)?;
    info!(
        "Wrote {} targets over {} positions to {}",
        table.rows.len(),
        table.positions.len(),
        args.output_csv.display()
    );
    Ok(())
}

pub fn cluster(config: &AnalysisConfig, args: ClusterArgs) -> Result<()> {
    let table = TargetTable::from_file(&args.target_stats_csv, args.study)?;
    confirm_overwrite(&args.outfile_csv)?;
    confirm_overwrite(&args.outfile_svg)?;

    let clusters = TargetClusterer::new(config.clustering.clone()).cluster_table(&table)?;
    for position in &clusters {
        info!(
            "{}: k = {}, best targets {:?}",
            position.position,
            position.k,
            position.best_targets()
        );
    }

    let file = File::create(&args.outfile_csv)
        .with_context(|| format!("Failed to create {}", args.outfile_csv.display()))?;
    write_best_clusters(file, &clusters)?;
    plot_clusters(&clusters, &args.outfile_svg)?;
    Ok(())
}

pub fn target_compare(config: &AnalysisConfig, args: TargetCompareArgs) -> Result<()> {
    let table = TargetTable::from_file(&args.target_csv, Study::Position)?;
    let report = TargetCompareReport {
        source: args.target_csv.display().to_string(),
        significance: config.analysis.significance,
        comparisons: compare_targets(&table)?,
    };
    Reporter::new(args.format).report(&report)?;
    Ok(())
}
