//! Summary statistics for distance samples.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::distribution_error;
use crate::error::{AnalysisError, Result};

/// Arithmetic mean, or `None` for an empty slice
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation (divides by n).
///
/// This is the precision measure: the spread of gaze distances around their
/// mean across repeated samples of the same target.
///
/// ```
/// use gaze_stats::stats::pstdev;
///
/// let sd = pstdev(&[0.0, 10.0, 10.0]).unwrap();
/// assert!((sd - 4.714045).abs() < 1e-6);
/// assert_eq!(pstdev(&[7.0]), Some(0.0));
/// ```
pub fn pstdev(samples: &[f64]) -> Option<f64> {
    let m = mean(samples)?;
    let ss: f64 = samples.iter().map(|&x| (x - m).powi(2)).sum();
    Some((ss / samples.len() as f64).sqrt())
}

/// Sample variance (divides by n - 1), `None` below two samples
pub fn variance(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples)?;
    let ss: f64 = samples.iter().map(|&x| (x - m).powi(2)).sum();
    Some(ss / (samples.len() - 1) as f64)
}

/// Standard error of the mean using the sample standard deviation
pub fn sem(samples: &[f64]) -> Option<f64> {
    variance(samples).map(|v| (v / samples.len() as f64).sqrt())
}

/// Calculate percentile value from a slice of f64 samples.
///
/// Uses linear interpolation between nearest ranks.
///
/// # Returns
///
/// * `Some(value)` - The percentile value
/// * `None` - If samples is empty or p is outside 0..=100
///
/// ```
/// use gaze_stats::stats::percentile;
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile(&data, 50.0), Some(3.0));
/// ```
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower_index = rank.floor() as usize;
    let upper_index = rank.ceil() as usize;

    if lower_index == upper_index {
        Some(sorted[lower_index])
    } else {
        let lower_value = sorted[lower_index];
        let upper_value = sorted[upper_index];
        let fraction = rank - lower_index as f64;
        Some(lower_value + fraction * (upper_value - lower_value))
    }
}

pub fn median(samples: &[f64]) -> Option<f64> {
    percentile(samples, 50.0)
}

/// Descriptive summary of one group of observations
#[derive(Debug, Clone, Serialize)]
pub struct Description {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample variance, `None` for a single observation
    pub variance: Option<f64>,
    /// Population standard deviation
    pub std_dev: f64,
    /// Biased (moment) skewness, `None` when all values are equal
    pub skewness: Option<f64>,
}

/// Summarise a sample, or `None` if it is empty
pub fn describe(samples: &[f64]) -> Option<Description> {
    let m = mean(samples)?;
    let n = samples.len();
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let m2 = samples.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / n as f64;
    let m3 = samples.iter().map(|&x| (x - m).powi(3)).sum::<f64>() / n as f64;
    let skewness = if m2 > 0.0 { Some(m3 / m2.powf(1.5)) } else { None };

    Some(Description {
        n,
        min,
        max,
        mean: m,
        median: median(samples)?,
        variance: variance(samples),
        std_dev: m2.sqrt(),
        skewness,
    })
}

/// Student-t confidence interval around a sample mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub sem: f64,
    pub confidence: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Student-t interval at `confidence` (e.g. 0.95) with n - 1 degrees of freedom.
///
/// # Errors
///
/// Returns [`AnalysisError::InsufficientData`] for fewer than two samples.
pub fn confidence_interval(samples: &[f64], confidence: f64) -> Result<ConfidenceInterval> {
    if samples.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "confidence interval needs at least 2 observations, have {}",
            samples.len()
        )));
    }
    let m = mean(samples).unwrap_or_default();
    let se = sem(samples).unwrap_or_default();
    let df = (samples.len() - 1) as f64;

    let half_width = if se > 0.0 {
        let t = StudentsT::new(0.0, 1.0, df).map_err(distribution_error)?;
        t.inverse_cdf(0.5 + confidence / 2.0) * se
    } else {
        0.0
    };

    Ok(ConfidenceInterval {
        mean: m,
        sem: se,
        confidence,
        lower: m - half_width,
        upper: m + half_width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_pstdev_of_accuracy_example() {
        let distances = [0.0, 10.0, 10.0];
        assert!((mean(&distances).unwrap() - 20.0 / 3.0).abs() < 1e-12);
        let expected = (200.0f64 / 9.0).sqrt();
        assert!((pstdev(&distances).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(mean(&[]), None);
        assert_eq!(pstdev(&[]), None);
        assert_eq!(sem(&[1.0]), None);
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn test_variance_and_sem() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let expected = 32.0 / 7.0;
        assert!((variance(&samples).unwrap() - expected).abs() < 1e-12);
        assert!((sem(&samples).unwrap() - (expected / 8.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_with_interpolation() {
        let samples: Vec<f64> = (1..=10).map(f64::from).collect();
        assert!((percentile(&samples, 25.0).unwrap() - 3.25).abs() < 1e-10);
        assert!((percentile(&samples, 75.0).unwrap() - 7.75).abs() < 1e-10);
        assert_eq!(median(&samples), Some(5.5));
    }

    #[test]
    fn test_percentile_invalid_p() {
        assert_eq!(percentile(&[1.0, 2.0], -1.0), None);
        assert_eq!(percentile(&[1.0, 2.0], 101.0), None);
    }

    #[test]
    fn test_describe() {
        let d = describe(&[1.0, 2.0, 3.0, 10.0]).unwrap();
        assert_eq!(d.n, 4);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 10.0);
        assert_eq!(d.mean, 4.0);
        assert_eq!(d.median, 2.5);
        assert!(d.skewness.unwrap() > 0.0);

        let flat = describe(&[3.0, 3.0]).unwrap();
        assert_eq!(flat.skewness, None);
        assert_eq!(flat.variance, Some(0.0));
    }

    #[test]
    fn test_confidence_interval() {
        let samples = [10.0, 12.0, 14.0, 16.0, 18.0];
        let ci = confidence_interval(&samples, 0.95).unwrap();
        assert_eq!(ci.mean, 14.0);
        // t(0.975, 4) = 2.776, sem = sqrt(10 / 5)
        let half = 2.776445 * 2.0f64.sqrt();
        assert!((ci.upper - (14.0 + half)).abs() < 1e-4);
        assert!((ci.lower - (14.0 - half)).abs() < 1e-4);
    }

    #[test]
    fn test_confidence_interval_constant_samples() {
        let ci = confidence_interval(&[5.0, 5.0, 5.0], 0.95).unwrap();
        assert_eq!(ci.lower, 5.0);
        assert_eq!(ci.upper, 5.0);
    }

    #[test]
    fn test_confidence_interval_insufficient() {
        assert!(matches!(
            confidence_interval(&[1.0], 0.95),
            Err(AnalysisError::InsufficientData(_))
        ));
    }
}
