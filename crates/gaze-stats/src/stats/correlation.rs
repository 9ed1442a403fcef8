//! Rank correlation and least-squares regression against a continuous
//! predictor such as spectacle power.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::distribution_error;
use super::rank::rank_average;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpearmanResult {
    pub rho: f64,
    pub p_value: f64,
    /// n - 2
    pub df: usize,
}

fn require_pairs(x: &[f64], y: &[f64], min: usize, what: &str) -> Result<()> {
    if x.len() != y.len() {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: predictor has {} values but response has {}",
            what,
            x.len(),
            y.len()
        )));
    }
    if x.len() < min {
        return Err(AnalysisError::InsufficientData(format!(
            "{} needs at least {} pairs, have {}",
            what,
            min,
            x.len()
        )));
    }
    Ok(())
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman rank correlation with a two-sided t-distribution p-value.
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] for fewer than three pairs, mismatched
/// lengths, or a constant input.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<SpearmanResult> {
    require_pairs(x, y, 3, "Spearman correlation")?;

    let rho = pearson(&rank_average(x), &rank_average(y)).ok_or_else(|| {
        AnalysisError::InsufficientData("Spearman correlation: input is constant".to_string())
    })?;
    let df = x.len() - 2;

    let p_value = if rho.abs() >= 1.0 {
        0.0
    } else {
        let t = rho * (df as f64 / ((1.0 + rho) * (1.0 - rho))).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df as f64).map_err(distribution_error)?;
        2.0 * dist.sf(t.abs())
    };

    Ok(SpearmanResult {
        rho,
        p_value: p_value.clamp(0.0, 1.0),
        df,
    })
}

/// Ordinary least-squares line y = slope * x + intercept
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a degree-1 polynomial by least squares.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    require_pairs(x, y, 2, "linear regression")?;

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON * sum_x2.max(1.0) {
        return Err(AnalysisError::InsufficientData(
            "linear regression: predictor is constant".to_string(),
        ));
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Ok(LinearFit { slope, intercept })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spearman_monotonic() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        let result = spearman(&x, &y).unwrap();
        assert_eq!(result.rho, 1.0);
        assert_eq!(result.p_value, 0.0);
        assert_eq!(result.df, 3);

        let inverse: Vec<f64> = y.iter().rev().copied().collect();
        assert_eq!(spearman(&x, &inverse).unwrap().rho, -1.0);
    }

    #[test]
    fn test_spearman_known_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let result = spearman(&x, &y).unwrap();
        // 1 - 6 * 4 / (5 * 24)
        assert!((result.rho - 0.8).abs() < 1e-12);
        assert!((result.p_value - 0.1041).abs() < 1e-3);
    }

    #[test]
    fn test_spearman_insufficient() {
        assert!(spearman(&[1.0, 2.0], &[3.0, 4.0]).is_err());
        assert!(spearman(&[1.0, 1.0, 1.0], &[3.0, 4.0, 5.0]).is_err());
        assert!(spearman(&[1.0, 2.0, 3.0], &[3.0, 4.0]).is_err());
    }

    #[test]
    fn test_linear_fit() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_fit(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.predict(10.0) - 21.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_fit_constant_predictor() {
        assert!(linear_fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(linear_fit(&[2.0], &[1.0]).is_err());
    }
}
