//! Inertia curves and 3D cluster scatters for the target clustering

use std::path::Path;

use anyhow::Result;
use gaze_stats::cluster::PositionClusters;
use plotters::prelude::*;
use tracing::info;

use super::{padded_range, series_colour, PLOT_SIZE};

/// One row per screen position: the inertia curve with the selected cluster
/// count marked, and the targets in (accuracy, precision, invalid) space
/// coloured by cluster rank.
pub fn plot_clusters(clusters: &[PositionClusters], output: &Path) -> Result<()> {
    let rows = clusters.len().max(1);
    let root = SVGBackend::new(output, (PLOT_SIZE.0, PLOT_SIZE.1 * rows as u32 / 2)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((rows, 2));

    for (row, position) in clusters.iter().enumerate() {
        draw_inertia(&areas[row * 2], position)?;
        draw_scatter(&areas[row * 2 + 1], position)?;
    }

    root.present()?;
    info!("Wrote cluster plot to {}", output.display());
    Ok(())
}

fn draw_inertia(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    position: &PositionClusters,
) -> Result<()> {
    let k_range = padded_range(position.inertia.iter().map(|&(k, _)| k as f64));
    let y_range = padded_range(position.inertia.iter().map(|&(_, sse)| sse));

    let mut chart = ChartBuilder::on(area)
        .caption(format!("{}: inertia per cluster count", position.position), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(k_range, y_range)?;
    chart
        .configure_mesh()
        .x_desc("Number of clusters")
        .y_desc("Sum of squared distances")
        .draw()?;

    let curve: Vec<(f64, f64)> = position.inertia.iter().map(|&(k, sse)| (k as f64, sse)).collect();
    chart.draw_series(LineSeries::new(curve.iter().copied(), &BLUE))?;
    chart.draw_series(curve.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))?;
    if let Some(&selected) = curve.iter().find(|(k, _)| *k == position.k as f64) {
        chart.draw_series(std::iter::once(Cross::new(selected, 10, BLACK.stroke_width(2))))?;
    }
    Ok(())
}

fn draw_scatter(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    position: &PositionClusters,
) -> Result<()> {
    let axis = |i: usize| {
        let range = padded_range(position.features.iter().map(|f| f[i]));
        range.start.min(0.0)..range.end
    };

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{}: accuracy / precision / invalid (k = {})", position.position, position.k),
            ("sans-serif", 20),
        )
        .margin(20)
        .build_cartesian_3d(axis(0), axis(1), axis(2))?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.3;
        pb.scale = 0.8;
        pb.into_matrix()
    });
    chart.configure_axes().draw()?;

    chart.draw_series(
        position
            .features
            .iter()
            .zip(&position.ranks)
            .map(|(f, &rank)| Circle::new((f[0], f[1], f[2]), 5, series_colour(rank).filled())),
    )?;
    Ok(())
}
