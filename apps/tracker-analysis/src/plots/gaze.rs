//! Scatter and vector plots of reconciled gaze positions

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use gaze_stats::geometry::{pixel_distance, ScreenGeometry};
use gaze_stats::results::{ExperimentResults, GazePoint, Ident, ScreenRegion};
use gaze_stats::stats::{mean, pstdev};
use gaze_stats::AnalysisError;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{info, warn};

use super::{circle_points, series_colour, PLOT_PADDING, PLOT_SIZE};

/// Spacing of the polar grid rings, in degrees
const POLAR_GRID_STEP_DEG: f64 = 5.0;

type ScreenChart<'a, 'b> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const SINGLE_COLOURS: [RGBColor; 2] = [RGBColor(0x01, 0x16, 0x1E), RGBColor(0x49, 0x11, 0x1C)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphType {
    #[default]
    Scatter,
    Vector,
}

impl FromStr for GraphType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scatter" => Ok(GraphType::Scatter),
            "vector" => Ok(GraphType::Vector),
            other => Err(AnalysisError::InvalidGraphType(other.to_string())),
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphType::Scatter => write!(f, "scatter"),
            GraphType::Vector => write!(f, "vector"),
        }
    }
}

/// Mean gaze position and spread for one target
#[derive(Debug, Clone, Copy, PartialEq)]
struct TargetVector {
    target: (f64, f64),
    mean: (f64, f64),
    /// Rounded-up population standard deviation of the gaze distances
    precision_px: f64,
}

fn target_vector(target: (i64, i64), points: &[(f64, f64)]) -> Option<TargetVector> {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let distances: Vec<f64> = points
        .iter()
        .map(|&p| pixel_distance(p, target))
        .collect();
    Some(TargetVector {
        target: (target.0 as f64, target.1 as f64),
        mean: (mean(&xs)?, mean(&ys)?),
        precision_px: pstdev(&distances)?.ceil(),
    })
}

/// Path of the per-identifier plot derived from the combined plot path
pub fn ident_plot_path(output: &Path, ident: &Ident) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix: String = format!("{}_{}", ident.tracker, ident.label)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    output.with_file_name(format!("{}_{}.svg", stem, suffix))
}

pub struct GazePlot<'a> {
    results: &'a ExperimentResults,
    distance_cm: Option<f64>,
}

impl<'a> GazePlot<'a> {
    pub fn new(results: &'a ExperimentResults, distance_cm: Option<f64>) -> Self {
        Self {
            results,
            distance_cm,
        }
    }

    fn screen(&self) -> &ScreenGeometry {
        self.results.screen()
    }

    /// Every retained gaze point, one colour per identifier
    pub fn scatter(&self, subject: Option<&str>, output: &Path) -> Result<()> {
        let data = self.results.gaze_points(subject, None);
        let root = SVGBackend::new(output, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let h = self.screen().height_px as f64;
        let mut chart = self.screen_chart(&root, "Gaze positions")?;
        for (i, (ident, points)) in data.iter().enumerate() {
            let colour = series_colour(i);
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|p| Circle::new((p.x, h - p.y), 2, colour.filled())),
                )?
                .label(ident.to_string())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, colour.filled()));
        }
        self.draw_targets(&mut chart, None)?;
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        info!("Wrote scatter plot to {}", output.display());
        Ok(())
    }

    /// Per-identifier files [`GazePlot::vector`] writes next to `output`
    pub fn vector_paths(&self, subject: Option<&str>, output: &Path) -> Vec<PathBuf> {
        self.results
            .gaze_points(subject, None)
            .keys()
            .map(|ident| ident_plot_path(output, ident))
            .collect()
    }

    /// One vector plot per identifier plus a combined plot with a panel per
    /// identifier. Returns the per-identifier paths.
    pub fn vector(&self, subject: Option<&str>, output: &Path) -> Result<Vec<PathBuf>> {
        let data = self.results.gaze_points(subject, None);
        let mut written = Vec::new();

        for (i, (ident, points)) in data.iter().enumerate() {
            let path = ident_plot_path(output, ident);
            let root = SVGBackend::new(&path, PLOT_SIZE).into_drawing_area();
            root.fill(&WHITE)?;
            self.draw_vector_panel(&root, ident, points, SINGLE_COLOURS[i % 2].mix(0.5))?;
            root.present()?;
            info!("Wrote vector plot for {} to {}", ident, path.display());
            drop(root);
            written.push(path);
        }

        let panels = data.len().max(1);
        let root =
            SVGBackend::new(output, (PLOT_SIZE.0, PLOT_SIZE.1 * panels as u32)).into_drawing_area();
        root.fill(&WHITE)?;
        let areas = root.split_evenly((panels, 1));
        // bottom to top
        for (i, (ident, points)) in data.iter().enumerate() {
            self.draw_vector_panel(&areas[panels - 1 - i], ident, points, series_colour(i).mix(0.5))?;
        }
        root.present()?;
        info!("Wrote combined vector plot to {}", output.display());

        Ok(written)
    }

    fn screen_chart<'b, 'c>(
        &self,
        area: &'b DrawingArea<SVGBackend<'c>, Shift>,
        caption: &str,
    ) -> Result<ScreenChart<'b, 'c>> {
        let w = self.screen().width_px as f64;
        let h = self.screen().height_px as f64;
        let mut chart = ChartBuilder::on(area)
            .caption(caption, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-PLOT_PADDING..w + PLOT_PADDING, -PLOT_PADDING..h + PLOT_PADDING)?;

        // screen y grows downwards
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Screen x position (pixels)")
            .y_desc("Screen y position (pixels)")
            .y_label_formatter(&|y| format!("{:.0}", h - y))
            .draw()?;
        Ok(chart)
    }

    fn draw_vector_panel(
        &self,
        area: &DrawingArea<SVGBackend<'_>, Shift>,
        ident: &Ident,
        points: &[GazePoint],
        colour: RGBAColor,
    ) -> Result<()> {
        let h = self.screen().height_px as f64;
        let flip = |(x, y): (f64, f64)| (x, h - y);
        let mut chart = self.screen_chart(area, &ident.to_string())?;

        for (target_id, coords) in self.results.targets().targets(ident.region()) {
            let gazes: Vec<(f64, f64)> = points
                .iter()
                .filter(|p| p.target_id == target_id)
                .map(GazePoint::position)
                .collect();
            let Some(vector) = target_vector(coords, &gazes) else {
                warn!("No valid data for target {} of {}", target_id, ident);
                continue;
            };

            chart.draw_series(std::iter::once(Polygon::new(
                circle_points(vector.mean, vector.precision_px)
                    .into_iter()
                    .map(flip)
                    .collect::<Vec<_>>(),
                colour.mix(0.2).filled(),
            )))?;
            for segment in arrow(vector.target, vector.mean) {
                chart.draw_series(std::iter::once(PathElement::new(
                    segment.into_iter().map(flip).collect::<Vec<_>>(),
                    colour.stroke_width(2),
                )))?;
            }
        }

        let w = self.screen().width_px as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, 0.0), (w, h)],
            BLACK.mix(0.5).stroke_width(1),
        )))?;
        self.draw_polar_grid(&mut chart)?;
        self.draw_targets(&mut chart, Some(ident))?;
        Ok(())
    }

    /// Rings every few degrees around the screen centre
    fn draw_polar_grid(
        &self,
        chart: &mut ScreenChart<'_, '_>,
    ) -> Result<()> {
        let Some(distance_cm) = self.distance_cm else {
            return Ok(());
        };
        let screen = self.screen();
        let h = screen.height_px as f64;
        let grey = RGBColor(0x77, 0x77, 0x77);
        let px_per_deg = screen.pixels_per_degree(distance_cm);
        let origin = screen.center();
        let rings = (screen.diagonal_px() / 2.0 / px_per_deg / POLAR_GRID_STEP_DEG) as usize;

        for n in 1..=rings {
            let radius = n as f64 * px_per_deg * POLAR_GRID_STEP_DEG;
            chart.draw_series(std::iter::once(PathElement::new(
                circle_points(origin, radius)
                    .into_iter()
                    .map(|(x, y)| (x, h - y))
                    .collect::<Vec<_>>(),
                grey,
            )))?;
            let label = format!("{}°", n as f64 * POLAR_GRID_STEP_DEG);
            let style = ("sans-serif", 14).into_font().color(&grey);
            chart.draw_series([
                Text::new(label.clone(), (origin.0 + radius - 30.0, h - origin.1), style.clone()),
                Text::new(label, (origin.0 - radius + 5.0, h - origin.1), style),
            ])?;
        }
        chart.draw_series(std::iter::once(Cross::new(
            (origin.0, h - origin.1),
            6,
            grey,
        )))?;
        Ok(())
    }

    /// Target crosses; all regions when no identifier is given
    fn draw_targets(
        &self,
        chart: &mut ScreenChart<'_, '_>,
        ident: Option<&Ident>,
    ) -> Result<()> {
        let h = self.screen().height_px as f64;
        let registry = self.results.targets();
        let targets: Vec<(i64, i64)> = match ident {
            Some(ident) => registry.targets(ident.region()).map(|(_, c)| c).collect(),
            None => [ScreenRegion::Top, ScreenRegion::Bottom, ScreenRegion::Other]
            .into_iter()
            .flat_map(|region| registry.targets(region).map(|(_, c)| c).collect::<Vec<_>>())
            .collect(),
        };
        chart.draw_series(targets.into_iter().map(|(x, y)| {
            Cross::new((x as f64, h - y as f64), 12, BLACK.mix(0.5).stroke_width(2))
        }))?;
        Ok(())
    }
}

/// Shaft and head segments of an arrow from `from` to `to`
fn arrow(from: (f64, f64), to: (f64, f64)) -> Vec<Vec<(f64, f64)>> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = dx.hypot(dy);
    if length < f64::EPSILON {
        return Vec::new();
    }
    let head = (length * 0.4).min(20.0);
    let angle = dy.atan2(dx);
    let barb = |offset: f64| {
        let a = angle + std::f64::consts::PI + offset;
        (to.0 + head * a.cos(), to.1 + head * a.sin())
    };
    let spread = 25f64.to_radians();
    vec![vec![from, to], vec![barb(spread), to, barb(-spread)]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_graph_type_parse() {
        assert_eq!("scatter".parse::<GraphType>().unwrap(), GraphType::Scatter);
        assert_eq!("vector".parse::<GraphType>().unwrap(), GraphType::Vector);
        assert!(matches!(
            "heatmap".parse::<GraphType>(),
            Err(AnalysisError::InvalidGraphType(_))
        ));
    }

    #[test]
    fn test_target_vector() {
        let vector = target_vector((100, 100), &[(110.0, 100.0), (100.0, 110.0), (90.0, 100.0)]).unwrap();
        assert_eq!(vector.target, (100.0, 100.0));
        assert!((vector.mean.0 - 100.0).abs() < 1e-12);
        assert!((vector.mean.1 - 310.0 / 3.0).abs() < 1e-12);
        // every distance is 10, so no spread
        assert_eq!(vector.precision_px, 0.0);

        assert_eq!(target_vector((0, 0), &[]), None);
    }

    #[test]
    fn test_arrow() {
        assert!(arrow((1.0, 1.0), (1.0, 1.0)).is_empty());

        let segments = arrow((0.0, 0.0), (100.0, 0.0));
        assert_eq!(segments[0], vec![(0.0, 0.0), (100.0, 0.0)]);
        let head = &segments[1];
        assert_eq!(head[1], (100.0, 0.0));
        assert!(head[0].0 < 100.0 && head[2].0 < 100.0);
        assert!((head[0].1 + head[2].1).abs() < 1e-9);
    }

    #[test]
    fn test_ident_plot_path() {
        let path = ident_plot_path(Path::new("plots/session.svg"), &Ident::new("GP3", "Top"));
        assert_eq!(path, PathBuf::from("plots/session_GP3_Top.svg"));
    }
}
