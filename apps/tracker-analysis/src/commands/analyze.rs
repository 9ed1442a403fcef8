use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use gaze_stats::results::{ExperimentResults, StatsQuery, StatsSummary, TargetSubset};
use gaze_stats::AnalysisConfig;
use tracing::info;

use crate::plots::{GazePlot, GraphType};
use crate::prompt::confirm_overwrite;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Raw gaze sample CSV
    pub data_csv: PathBuf,

    /// scatter or vector
    #[arg(default_value_t = GraphType::Scatter)]
    pub graph_type: GraphType,

    /// Viewing distance; enables degree values and the polar grid
    pub distance_cm: Option<f64>,

    /// SVG plot path; stats go to `<output>.stats.csv`. Without it only the
    /// stats are printed to stdout.
    pub output: Option<PathBuf>,

    /// Participant id written into the stats; "None" for none
    pub participant: Option<String>,

    /// CSV of top/bottom target ids to keep
    pub subset_file: Option<PathBuf>,
}

impl AnalyzeArgs {
    pub fn participant(&self) -> Option<&str> {
        self.participant.as_deref().filter(|p| *p != "None")
    }
}

/// `<output>.stats.csv`
pub fn stats_path(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".stats.csv");
    PathBuf::from(path)
}

pub fn analyze(config: &AnalysisConfig, args: AnalyzeArgs) -> Result<()> {
    let subset = match &args.subset_file {
        Some(path) => TargetSubset::from_file(path)
            .with_context(|| format!("Failed to load target subset {}", path.display()))?,
        None => TargetSubset::all(),
    };

    if let Some(output) = &args.output {
        confirm_overwrite(output)?;
        confirm_overwrite(&stats_path(output))?;
        info!("Writing output to: {}", output.display());
    }

    let results = ExperimentResults::load(&args.data_csv, config, &subset)?;
    if results.subject_count() == 0 {
        bail!("No subject data found in {}", args.data_csv.display());
    }
    let subject = if results.subject_count() == 1 {
        results.subjects().next().map(str::to_string)
    } else {
        None
    };

    if let Some(output) = &args.output {
        let plot = GazePlot::new(&results, args.distance_cm);
        if args.graph_type == GraphType::Vector {
            for path in plot.vector_paths(subject.as_deref(), output) {
                confirm_overwrite(&path)?;
            }
        }
        match args.graph_type {
            GraphType::Scatter => plot.scatter(subject.as_deref(), output)?,
            GraphType::Vector => {
                let written = plot.vector(subject.as_deref(), output)?;
                info!("Wrote {} per-identifier vector plots", written.len());
            }
        }
    }

    let query = StatsQuery {
        subject,
        ident: None,
        distance_cm: args.distance_cm,
        participant: args.participant().map(str::to_string),
    };
    let stats = results.stats(&query)?;

    match &args.output {
        Some(output) => {
            let path = stats_path(output);
            StatsSummary::write_to_file(&path, stats)?;
            info!("Wrote stats to {}", path.display());
        }
        None => {
            let csv = StatsSummary::to_csv_string(stats)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(csv.as_bytes())?;
            stdout.flush()?;
        }
    }

    info!("Finished");
    Ok(())
}
