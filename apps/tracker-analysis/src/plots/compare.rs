//! Charts for the participant comparisons

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use gaze_stats::compare::{
    Category, ComparisonReport, Regression, RxAnalysis, Stat, TestOutcome, ValidationErrorAnalysis,
};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use super::{padded_range, series_colour, PLOT_SIZE};

/// Maps categories onto the x axis. Numeric categories sit at their value,
/// anything else at its index in sorted order.
#[derive(Debug, Clone, PartialEq)]
struct CategoryAxis {
    categories: Vec<Category>,
    numeric: bool,
}

impl CategoryAxis {
    fn new<'a, I: IntoIterator<Item = &'a Category>>(categories: I) -> Self {
        let categories: Vec<Category> = categories
            .into_iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let numeric = !categories.is_empty() && categories.iter().all(|c| c.as_number().is_some());
        Self {
            categories,
            numeric,
        }
    }

    fn x(&self, category: &Category) -> f64 {
        match category.as_number() {
            Some(value) if self.numeric => value,
            _ => self
                .categories
                .iter()
                .position(|c| c == category)
                .unwrap_or_default() as f64,
        }
    }

    fn label(&self, x: f64) -> String {
        if self.numeric {
            return format!("{}", x);
        }
        let index = x.round();
        if (x - index).abs() > 1e-6 || index < 0.0 {
            return String::new();
        }
        self.categories
            .get(index as usize)
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

fn regression_for<'a>(regressions: &'a [Regression], label: &str, stat: Stat) -> Option<&'a Regression> {
    regressions.iter().find(|r| r.label == label && r.stat == stat)
}

/// Spectacle prescription against accuracy and precision, with the fitted
/// line per label
pub fn plot_rx_scatter(analysis: &RxAnalysis, output: &Path) -> Result<()> {
    let root = SVGBackend::new(output, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    let x_range = padded_range(analysis.series.iter().flat_map(|s| s.rx.iter().copied()));
    for (area, stat) in panels.iter().zip(Stat::BOTH) {
        let y_range = padded_range(analysis.series.iter().flat_map(|s| s.values(stat).iter().copied()));
        let mut chart = ChartBuilder::on(area)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), y_range)?;
        chart
            .configure_mesh()
            .x_desc("Spectacle strength in diopters (average spherical equivalent)")
            .y_desc(format!("{} in degrees", stat))
            .draw()?;

        for (i, series) in analysis.series.iter().enumerate() {
            let colour = series_colour(i);
            chart
                .draw_series(
                    series
                        .rx
                        .iter()
                        .zip(series.values(stat))
                        .map(|(&x, &y)| Circle::new((x, y), 4, colour.filled())),
                )?
                .label(series.label.clone())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, colour.filled()));

            if let Some(fit) = regression_for(&series.regressions, &series.label, stat)
                .and_then(|r| r.fit.completed())
            {
                let line = [x_range.start, x_range.end].map(|x| (x, fit.predict(x)));
                chart.draw_series(LineSeries::new(line, colour.stroke_width(2)))?;
            }
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    info!("Wrote spectacle Rx plot to {}", output.display());
    Ok(())
}

/// Category means with standard error bars for every label, one panel per
/// stat. Numeric categories also get the regression line.
pub fn plot_error_bars(report: &ComparisonReport, output: &Path) -> Result<()> {
    let root = SVGBackend::new(output, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    let axis = CategoryAxis::new(
        report
            .error_bars
            .iter()
            .flat_map(|s| s.points.iter().map(|p| &p.category)),
    );
    let x_range = padded_range(axis.categories.iter().map(|c| axis.x(c)));
    let labels: Vec<&str> = report
        .error_bars
        .iter()
        .map(|s| s.label.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    for (area, stat) in panels.iter().zip(Stat::BOTH) {
        let series: Vec<_> = report.error_bars.iter().filter(|s| s.stat == stat).collect();
        let y_range = padded_range(series.iter().flat_map(|s| {
            s.points.iter().flat_map(|p| {
                let sem = p.sem.unwrap_or(0.0);
                [p.mean - sem, p.mean + sem]
            })
        }));

        let mut chart = ChartBuilder::on(area)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), y_range)?;
        chart
            .configure_mesh()
            .x_desc(report.key.axis_label())
            .y_desc(format!("{} in degrees", stat))
            .x_label_formatter(&|x| axis.label(*x))
            .draw()?;

        for s in series {
            let index = labels.iter().position(|l| *l == s.label).unwrap_or_default();
            let colour = series_colour(index);
            chart
                .draw_series(s.points.iter().map(|p| {
                    let sem = p.sem.unwrap_or(0.0);
                    let x = axis.x(&p.category);
                    ErrorBar::new_vertical(x, p.mean - sem, p.mean, p.mean + sem, colour.filled(), 10)
                }))?
                .label(s.label.clone())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, colour.filled()));

            if axis.numeric {
                if let Some(fit) = regression_for(&report.regressions, &s.label, stat)
                    .and_then(|r| r.fit.completed())
                {
                    let line = [x_range.start, x_range.end].map(|x| (x, fit.predict(x)));
                    chart.draw_series(LineSeries::new(line, colour.stroke_width(2)))?;
                }
            }
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    info!("Wrote error bar plot to {}", output.display());
    Ok(())
}

fn draw_validation_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    analysis: &ValidationErrorAnalysis,
    stat: Stat,
) -> Result<()> {
    let intervals: Vec<(usize, u32, f64, f64, f64)> = analysis
        .series
        .iter()
        .enumerate()
        .flat_map(|(i, series)| {
            series.points.iter().filter_map(move |point| match point.get(stat) {
                TestOutcome::Completed(ci) => Some((i, point.errors, ci.lower, ci.mean, ci.upper)),
                TestOutcome::Insufficient(_) => None,
            })
        })
        .collect();

    let x_range = padded_range(intervals.iter().map(|p| p.1 as f64));
    let y_range = padded_range(intervals.iter().flat_map(|p| [p.2, p.4]));
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;
    chart
        .configure_mesh()
        .x_desc("Number of validation errors")
        .y_desc(format!("{} in degrees", stat))
        .draw()?;

    for (i, series) in analysis.series.iter().enumerate() {
        let colour = series_colour(i);
        chart
            .draw_series(
                intervals
                    .iter()
                    .filter(|p| p.0 == i)
                    .map(|&(_, errors, lower, mean, upper)| {
                        ErrorBar::new_vertical(errors as f64, lower, mean, upper, colour.filled(), 10)
                    }),
            )?
            .label(format!("{:?}", series.region))
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, colour.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Confidence intervals of accuracy and precision per validation error count
pub fn plot_validation_errors(analysis: &ValidationErrorAnalysis, output: &Path) -> Result<()> {
    let root = SVGBackend::new(output, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));
    for (area, stat) in panels.iter().zip(Stat::BOTH) {
        draw_validation_panel(area, analysis, stat)?;
    }
    root.present()?;
    info!("Wrote validation error plot to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_category_axis() {
        let categories = [Category::Number(4.0), Category::Number(-2.0), Category::Number(4.0)];
        let axis = CategoryAxis::new(&categories);
        assert!(axis.numeric);
        assert_eq!(axis.categories.len(), 2);
        assert_eq!(axis.x(&Category::Number(-2.0)), -2.0);
        assert_eq!(axis.label(1.5), "1.5");
    }

    #[test]
    fn test_text_category_axis() {
        let categories = [
            Category::from("light"),
            Category::from("dark"),
            Category::Missing,
        ];
        let axis = CategoryAxis::new(&categories);
        assert!(!axis.numeric);
        // missing sorts first, then text alphabetically
        assert_eq!(axis.x(&Category::Missing), 0.0);
        assert_eq!(axis.x(&Category::from("dark")), 1.0);
        assert_eq!(axis.label(2.0), "light");
        assert_eq!(axis.label(0.5), "");
        assert_eq!(axis.label(7.0), "");
    }
}
