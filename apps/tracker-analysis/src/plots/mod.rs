//! SVG charts for the analysis subcommands

pub mod clusters;
pub mod compare;
pub mod gaze;

use std::f64::consts::TAU;
use std::ops::Range;

use plotters::prelude::*;

pub use clusters::plot_clusters;
pub use compare::{plot_error_bars, plot_rx_scatter, plot_validation_errors};
pub use gaze::{GazePlot, GraphType};

/// Canvas size of a single panel
pub const PLOT_SIZE: (u32, u32) = (1920, 1080);

/// Margin around the screen area in gaze plots, in pixels
pub const PLOT_PADDING: f64 = 100.0;

const CIRCLE_SEGMENTS: usize = 72;

pub fn series_colour(index: usize) -> RGBAColor {
    Palette99::pick(index).mix(0.9)
}

/// Closed polygon approximating a circle in data coordinates
pub fn circle_points(center: (f64, f64), radius: f64) -> Vec<(f64, f64)> {
    (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            (center.0 + radius * angle.cos(), center.1 + radius * angle.sin())
        })
        .collect()
}

/// Axis range covering `values` with 10% headroom on both sides
pub fn padded_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return 0.0..1.0;
    }
    let pad = if max > min { 0.1 * (max - min) } else { 0.5 };
    (min - pad)..(max + pad)
}
