use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use gaze_stats::collated::CollatedStats;
use gaze_stats::compare::{analyze_spectacle_rx, analyze_validation_errors, compare_samples, GroupingKey};
use gaze_stats::reporter::{CompareReport, OutputFormat, Reporter};
use gaze_stats::survey::SimplifiedSurvey;
use gaze_stats::{AnalysisConfig, Study};
use tracing::info;

use super::create_output;
use crate::plots::{plot_error_bars, plot_rx_scatter, plot_validation_errors};
use crate::prompt::confirm_overwrite;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Simplified survey written by `simplify-survey`
    pub survey_csv: PathBuf,
    /// Stats summaries of every participant
    pub participant_stats_csv: PathBuf,
    /// Raw gaze samples of every participant
    pub raw_csv: PathBuf,
    /// Project directory; plots go to `<project>/all/plots/`
    pub project: PathBuf,
    #[arg(default_value_t = Study::default())]
    pub study: Study,

    #[arg(short, long, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Grouping to compare; repeat for several. Defaults to all data, eye
    /// darkness, correction, pantoscopic tilt and both vergence postures.
    #[arg(short, long)]
    pub key: Vec<GroupingKey>,
}

#[derive(Args, Debug)]
pub struct SimplifySurveyArgs {
    /// Raw survey export
    pub survey_export_csv: PathBuf,
    pub output_csv: PathBuf,
    #[arg(default_value_t = Study::default())]
    pub study: Study,
}

fn project_name(project: &Path) -> String {
    project
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

pub fn compare(config: &AnalysisConfig, args: CompareArgs) -> Result<()> {
    let stats = CollatedStats::load(
        &args.survey_csv,
        &args.participant_stats_csv,
        &args.raw_csv,
        args.study,
        config,
    )?;
    info!("Collated {} participants", stats.len());

    let name = project_name(&args.project);
    let plots_dir = args.project.join("all").join("plots");
    fs::create_dir_all(&plots_dir)
        .with_context(|| format!("Failed to create {}", plots_dir.display()))?;

    let spectacle_rx = analyze_spectacle_rx(&stats)?;
    let rx_plot = plots_dir.join(format!("{}_Rx_scatter.svg", name));
    confirm_overwrite(&rx_plot)?;
    plot_rx_scatter(&spectacle_rx, &rx_plot)?;

    let keys = if args.key.is_empty() {
        GroupingKey::DEFAULT_KEYS.to_vec()
    } else {
        args.key.clone()
    };
    let mut comparisons = Vec::with_capacity(keys.len());
    for key in keys {
        let report = compare_samples(&stats, key, &config.analysis)?;
        if report.has_multiple_categories() {
            let plot = plots_dir.join(format!("{}_{}_error_bars.svg", name, key));
            confirm_overwrite(&plot)?;
            plot_error_bars(&report, &plot)?;

            let csv = plots_dir.join(format!("{}_{}_error_bars.csv", name, key));
            report.write_error_bar_csv(create_output(&csv)?)?;
            info!("Wrote error bar data to {}", csv.display());
        }
        comparisons.push(report);
    }

    let validation_errors = match args.study {
        Study::Position => {
            let analysis = analyze_validation_errors(&stats, &config.analysis)?;
            let plot = plots_dir.join(format!("{}_validation_error_bars.svg", name));
            confirm_overwrite(&plot)?;
            plot_validation_errors(&analysis, &plot)?;
            Some(analysis)
        }
        Study::Validation => None,
    };

    let report = CompareReport {
        project: name,
        study: args.study,
        participants: stats.len(),
        significance: config.analysis.significance,
        comparisons,
        spectacle_rx,
        validation_errors,
    };
    Reporter::new(args.format).report(&report)?;
    Ok(())
}

pub fn simplify_survey(args: SimplifySurveyArgs) -> Result<()> {
    let same_file = args.survey_export_csv == args.output_csv
        || matches!(
            (args.survey_export_csv.canonicalize(), args.output_csv.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        );
    if same_file {
        bail!("Input and output paths must be different");
    }

    let survey = SimplifiedSurvey::from_file(&args.survey_export_csv, args.study)?;
    survey.write(create_output(&args.output_csv)?)?;
    info!(
        "Wrote {} participants to {}",
        survey.rows.len(),
        args.output_csv.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_project_name() {
        assert_eq!(project_name(Path::new("studies/position")), "position");
        assert_eq!(project_name(Path::new("/")), "project");
    }

    #[test]
    fn test_simplify_survey_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.csv");
        fs::write(&path, "ID\n").unwrap();

        let err = simplify_survey(SimplifySurveyArgs {
            survey_export_csv: path.clone(),
            output_csv: dir.path().join(".").join("survey.csv"),
            study: Study::Validation,
        })
        .unwrap_err();
        assert!(err.to_string().contains("must be different"));
        assert_eq!(fs::read_to_string(path).unwrap(), "ID\n");
    }

    #[test]
    fn test_compare_writes_plots() {
        let dir = tempfile::tempdir().unwrap();
        let survey = dir.path().join("survey.csv");
        fs::write(
            &survey,
            "ID,EyeColour,Correction,EyeConditions,Posture3m,Posture3mVal,Posture33cm,Posture33cmVal,HasARCoat,VertRight,VertLeft,SphericalDistRx,MFAdd,Panto\n\
             \"2\",\"Brown\",\"None\",\"\",\"Cover Test\",\"0.0\",\"Cover Test\",\"0.0\",\"\",\"\",\"\",\"0.0\",\"\",\"\"\n",
        )
        .unwrap();
        let stats = dir.path().join("stats.csv");
        fs::write(
            &stats,
            "participant,label,target_id,test_n,record_n,working_distance_cm,accuracy_px,accuracy_deg,precision_px,precision_deg,bad_both,bad_right,bad_left,parametric\n\
             2,GP3 :: far_chinrest,all,1,2,65,10,0.3,1,0.03,0,0,0,False\n\
             2,GP3 :: far_chinrest,0,1,2,65,10,0.3,1,0.03,0,0,0,False\n",
        )
        .unwrap();
        let raw = dir.path().join("raw.csv");
        fs::write(
            &raw,
            "Label,Subject,Tracker,Timestamp,Target-ID,Target-X,Target-Y,Cursor-X,Cursor-Y,Actual-X-Right,Actual-Y-Right,Actual-X-Left,Actual-Y-Left\n\
             far_chinrest,2,GP3,0,0,100,100,0,0,110,100,110,100\n\
             far_chinrest,2,GP3,0,0,100,100,0,0,90,100,90,100\n",
        )
        .unwrap();

        let project = dir.path().join("validation");
        compare(
            &AnalysisConfig::default(),
            CompareArgs {
                survey_csv: survey,
                participant_stats_csv: stats,
                raw_csv: raw,
                project: project.clone(),
                study: Study::Validation,
                format: OutputFormat::Json,
                key: vec![GroupingKey::All],
            },
        )
        .unwrap();

        let plots = project.join("all").join("plots");
        assert!(plots.join("validation_Rx_scatter.svg").exists());
        // a single category has no error bars
        assert!(!plots.join("validation_all_error_bars.svg").exists());
    }
}
