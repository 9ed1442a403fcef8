//! Eye tracker analysis command line
//!
//! Entry point for the analysis pipeline: raw gaze samples to stats
//! summaries, target tables, target clusters and participant comparisons.

mod commands;
mod plots;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gaze_stats::AnalysisConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{
    AnalyzeArgs, ClusterArgs, CompareArgs, SimplifySurveyArgs, TargetCompareArgs, TargetStatsArgs,
};

#[derive(Parser, Debug)]
#[command(name = "tracker-analysis")]
#[command(
    version,
    about = "Accuracy and precision analysis for eye tracker experiments"
)]
struct Args {
    /// TOML configuration file (screen, processing, analysis, clustering)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plot raw gaze data and compute accuracy and precision
    Analyze(AnalyzeArgs),
    /// Pivot a stats summary into one row per target
    TargetStats(TargetStatsArgs),
    /// Cluster targets and report the best subset per screen position
    Cluster(ClusterArgs),
    /// Compare participant groups using the survey answers
    Compare(CompareArgs),
    /// Reduce a raw survey export to the columns used by `compare`
    SimplifySurvey(SimplifySurveyArgs),
    /// Compare target locations within a target table
    TargetCompare(TargetCompareArgs),
}

fn init_tracing() {
    // stdout carries stats and reports, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Analyze(cmd) => commands::analyze(&config, cmd),
        Command::TargetStats(cmd) => commands::target_stats(cmd),
        Command::Cluster(cmd) => commands::cluster(&config, cmd),
        Command::Compare(cmd) => commands::compare(&config, cmd),
        Command::SimplifySurvey(cmd) => commands::simplify_survey(cmd),
        Command::TargetCompare(cmd) => commands::target_compare(&config, cmd),
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();
    tracing::info!("Starting tracker-analysis v{}", env!("CARGO_PKG_VERSION"));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use gaze_stats::Study;
    use plots::GraphType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_analyze_defaults() {
        let args = Args::try_parse_from(["tracker-analysis", "analyze", "session.csv"]).unwrap();
        let Command::Analyze(cmd) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(cmd.data_csv, PathBuf::from("session.csv"));
        assert_eq!(cmd.graph_type, GraphType::Scatter);
        assert_eq!(cmd.distance_cm, None);
        assert_eq!(cmd.output, None);
    }

    #[test]
    fn test_analyze_positional_arguments() {
        let args = Args::try_parse_from([
            "tracker-analysis",
            "analyze",
            "session.csv",
            "vector",
            "65",
            "plots/session.svg",
            "None",
            "subset.csv",
        ])
        .unwrap();
        let Command::Analyze(cmd) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(cmd.graph_type, GraphType::Vector);
        assert_eq!(cmd.distance_cm, Some(65.0));
        assert_eq!(cmd.participant(), None);
        assert_eq!(cmd.subset_file, Some(PathBuf::from("subset.csv")));
    }

    #[test]
    fn test_invalid_graph_type_rejected() {
        let result = Args::try_parse_from(["tracker-analysis", "analyze", "session.csv", "heatmap"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compare_arguments() {
        let args = Args::try_parse_from([
            "tracker-analysis",
            "--config",
            "analysis.toml",
            "compare",
            "survey.csv",
            "stats.csv",
            "raw.csv",
            "position",
            "position",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("analysis.toml")));
        let Command::Compare(cmd) = args.command else {
            panic!("expected compare");
        };
        assert_eq!(cmd.study, Study::Position);
        assert_eq!(cmd.format, gaze_stats::reporter::OutputFormat::Json);
        assert!(cmd.key.is_empty());
    }

    #[test]
    fn test_invalid_study_rejected() {
        let result =
            Args::try_parse_from(["tracker-analysis", "target-stats", "in.csv", "out.csv", "both"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_arguments_rejected() {
        assert!(Args::try_parse_from(["tracker-analysis", "cluster", "targets.csv"]).is_err());
    }
}
