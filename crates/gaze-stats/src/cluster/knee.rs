//! Kneedle knee detection for convex, decreasing curves such as K-means
//! inertia against cluster count.

/// Locate the knee of a convex decreasing curve with sensitivity 1.
///
/// `x` must be strictly increasing. Returns `None` when the curve has no
/// knee, e.g. when it is a straight line or has fewer than three points.
pub fn find_knee(x: &[f64], y: &[f64]) -> Option<f64> {
    const SENSITIVITY: f64 = 1.0;

    let n = x.len();
    if n < 3 || y.len() != n {
        return None;
    }

    let x_norm = normalize(x)?;
    // convex decreasing: flip y so the knee becomes a maximum of y - x
    let y_norm: Vec<f64> = normalize(y)?.into_iter().map(|v| 1.0 - v).collect();
    let difference: Vec<f64> = y_norm.iter().zip(&x_norm).map(|(y, x)| y - x).collect();

    let maxima = extrema(&difference, |a, b| a >= b);
    let minima = extrema(&difference, |a, b| a <= b);
    let first_maximum = *maxima.first()?;

    let mean_step = x_norm.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (n - 1) as f64;
    let thresholds: Vec<f64> = maxima
        .iter()
        .map(|&i| difference[i] - SENSITIVITY * mean_step.abs())
        .collect();

    let mut threshold = 0.0;
    let mut threshold_index = first_maximum;
    let mut maxima_seen = 0;
    for i in first_maximum..n - 1 {
        if maxima.contains(&i) {
            threshold = thresholds[maxima_seen];
            threshold_index = i;
            maxima_seen += 1;
        }
        if minima.contains(&i) {
            threshold = 0.0;
        }
        if difference[i + 1] < threshold {
            return Some(x[threshold_index]);
        }
    }
    None
}

fn normalize(values: &[f64]) -> Option<Vec<f64>> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !(range > 0.0) {
        return None;
    }
    Some(values.iter().map(|v| (v - min) / range).collect())
}

/// Indices where `keep(value, neighbour)` holds for both neighbours, with
/// the end points compared against themselves
fn extrema(values: &[f64], keep: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let last = values.len() - 1;
    (0..values.len())
        .filter(|&i| {
            let before = values[i.saturating_sub(1)];
            let after = values[(i + 1).min(last)];
            keep(values[i], before) && keep(values[i], after)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ks() -> Vec<f64> {
        (2..=10).map(|k| k as f64).collect()
    }

    #[test]
    fn test_sharp_elbow() {
        let inertia = [100.0, 30.0, 25.0, 21.0, 18.0, 16.0, 14.0, 13.0, 12.0];
        assert_eq!(find_knee(&ks(), &inertia), Some(3.0));
    }

    #[test]
    fn test_later_elbow() {
        let inertia = [200.0, 150.0, 100.0, 40.0, 35.0, 31.0, 28.0, 26.0, 25.0];
        assert_eq!(find_knee(&ks(), &inertia), Some(5.0));
    }

    #[test]
    fn test_straight_line_has_no_knee() {
        let inertia: Vec<f64> = (0..9).map(|i| 90.0 - 10.0 * i as f64).collect();
        assert_eq!(find_knee(&ks(), &inertia), None);
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(find_knee(&[1.0, 2.0], &[2.0, 1.0]), None);
        assert_eq!(find_knee(&ks(), &[5.0; 9]), None);
    }
}
