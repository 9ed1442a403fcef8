//! Screen geometry and target distances.
//!
//! Converts pixel distances into visual angle for a given viewing distance.

use crate::config::ScreenConfig;

const CM_PER_INCH: f64 = 2.54;

/// Pixel and physical dimensions of the display used for an experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGeometry {
    pub width_px: i64,
    pub height_px: i64,
    pub diagonal_cm: f64,
}

impl ScreenGeometry {
    pub fn new(width_px: i64, height_px: i64, diagonal_in: f64) -> Self {
        Self {
            width_px,
            height_px,
            diagonal_cm: diagonal_in * CM_PER_INCH,
        }
    }

    /// Length of the screen diagonal in pixels
    pub fn diagonal_px(&self) -> f64 {
        (self.width_px as f64).hypot(self.height_px as f64)
    }

    /// Physical size of one pixel, assuming square pixels
    pub fn pixel_size_cm(&self) -> f64 {
        self.diagonal_cm / self.diagonal_px()
    }

    /// Angle in degrees subtended by a single pixel at `distance_cm`.
    ///
    /// Multiplying a pixel distance by this factor gives degrees of visual
    /// angle. The factor grows as the viewer moves closer.
    ///
    /// ```
    /// use gaze_stats::geometry::ScreenGeometry;
    ///
    /// let screen = ScreenGeometry::default();
    /// assert!(screen.degrees_per_pixel(50.0) > screen.degrees_per_pixel(65.0));
    /// ```
    pub fn degrees_per_pixel(&self, distance_cm: f64) -> f64 {
        (self.pixel_size_cm() / distance_cm).atan().to_degrees()
    }

    pub fn pixels_per_degree(&self, distance_cm: f64) -> f64 {
        1.0 / self.degrees_per_pixel(distance_cm)
    }

    /// Whether `value` lies within the valid range for `axis` (0 = x, 1 = y)
    pub fn in_range(&self, axis: usize, value: i64) -> bool {
        let max = if axis == 0 {
            self.width_px
        } else {
            self.height_px
        };
        (0..=max).contains(&value)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width_px as f64 / 2.0, self.height_px as f64 / 2.0)
    }
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        ScreenGeometry::from(&ScreenConfig::default())
    }
}

impl From<&ScreenConfig> for ScreenGeometry {
    fn from(config: &ScreenConfig) -> Self {
        ScreenGeometry::new(
            config.resolution[0],
            config.resolution[1],
            config.diagonal_in,
        )
    }
}

/// Euclidean distance in pixels between a gaze position and a target
pub fn pixel_distance(gaze: (f64, f64), target: (i64, i64)) -> f64 {
    (target.0 as f64 - gaze.0).hypot(target.1 as f64 - gaze.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size() {
        let screen = ScreenGeometry::default();
        let expected = 23.8 * 2.54 / (1920f64 * 1920.0 + 1080.0 * 1080.0).sqrt();
        assert!((screen.pixel_size_cm() - expected).abs() < 1e-12);
        // a 23.8in 1080p panel has pixels of roughly 0.0275cm
        assert!((screen.pixel_size_cm() - 0.0275).abs() < 0.0005);
    }

    #[test]
    fn test_degrees_per_pixel_round_trip() {
        let screen = ScreenGeometry::default();
        let dpp = screen.degrees_per_pixel(65.0);
        assert!((dpp * screen.pixels_per_degree(65.0) - 1.0).abs() < 1e-12);
        // roughly 41 pixels per degree at 65cm
        assert!((screen.pixels_per_degree(65.0) - 41.2).abs() < 0.5);
    }

    #[test]
    fn test_degree_conversion_is_monotonic() {
        let screen = ScreenGeometry::default();
        let distances = [30.0, 45.0, 60.0, 80.0, 120.0];
        for pair in distances.windows(2) {
            assert!(screen.degrees_per_pixel(pair[0]) > screen.degrees_per_pixel(pair[1]));
        }
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let screen = ScreenGeometry::default();
        assert!(screen.in_range(0, 0));
        assert!(screen.in_range(0, 1920));
        assert!(!screen.in_range(0, 1921));
        assert!(screen.in_range(1, 1080));
        assert!(!screen.in_range(1, 1081));
        assert!(!screen.in_range(1, -1));
    }

    #[test]
    fn test_pixel_distance() {
        assert_eq!(pixel_distance((960.0, 540.0), (960, 540)), 0.0);
        assert_eq!(pixel_distance((963.0, 544.0), (960, 540)), 5.0);
    }
}
