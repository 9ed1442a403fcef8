//! One-sample Kolmogorov-Smirnov test against the standard normal.
//!
//! The p-value uses the Marsaglia-Tsang-Wang matrix method for the exact
//! distribution of D_n, with their closed-form approximation in the far tail.
//! Very large samples fall back to the asymptotic Kolmogorov distribution.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use super::distribution_error;
use crate::error::{AnalysisError, Result};

/// Above this sample size the exact matrix method gets too expensive
const EXACT_MAX_N: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

impl KsResult {
    /// True when the sample is indistinguishable from normal at `alpha`
    pub fn is_normal(&self, alpha: f64) -> bool {
        self.p_value >= alpha
    }
}

/// Two-sided KS goodness-of-fit test of `samples` against N(0, 1).
///
/// ```
/// use gaze_stats::stats::ks_normal;
///
/// // pixel distances are nowhere near a standard normal
/// let result = ks_normal(&[12.0, 15.5, 9.0, 30.2, 18.1]).unwrap();
/// assert!(!result.is_normal(0.05));
/// ```
pub fn ks_normal(samples: &[f64]) -> Result<KsResult> {
    if samples.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Kolmogorov-Smirnov test needs at least 1 observation".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0).map_err(distribution_error)?;
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let nf = n as f64;
    let mut d: f64 = 0.0;
    for (i, &x) in sorted.iter().enumerate() {
        let cdf = normal.cdf(x);
        let d_plus = (i + 1) as f64 / nf - cdf;
        let d_minus = cdf - i as f64 / nf;
        d = d.max(d_plus).max(d_minus);
    }

    Ok(KsResult {
        statistic: d,
        p_value: ks_p_value(n, d).clamp(0.0, 1.0),
    })
}

/// P(D_n >= d)
fn ks_p_value(n: usize, d: f64) -> f64 {
    let nf = n as f64;
    if d >= 1.0 {
        return 0.0;
    }
    if d <= 0.5 / nf {
        return 1.0;
    }
    if n > EXACT_MAX_N {
        let lambda = (nf.sqrt() + 0.12 + 0.11 / nf.sqrt()) * d;
        return kolmogorov_sf(lambda);
    }
    1.0 - kolmogorov_cdf(n, d)
}

/// Asymptotic Kolmogorov survival function
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    for k in 1..=100 {
        let k = k as f64;
        let term = (-2.0 * k * k * lambda * lambda).exp();
        sum += if k as u64 % 2 == 1 { term } else { -term };
        if term < 1e-16 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// P(D_n < d) by Marsaglia, Tsang and Wang (2003)
fn kolmogorov_cdf(n: usize, d: f64) -> f64 {
    let nf = n as f64;
    let s = d * d * nf;
    if s > 7.24 || (s > 3.76 && n > 99) {
        return 1.0 - 2.0 * (-(2.000071 + 0.331 / nf.sqrt() + 1.409 / nf) * s).exp();
    }

    let k = (nf * d) as usize + 1;
    let m = 2 * k - 1;
    let h = k as f64 - nf * d;

    let mut matrix = vec![0.0; m * m];
    for i in 0..m {
        for j in 0..m {
            if i + 1 >= j {
                matrix[i * m + j] = 1.0;
            }
        }
    }
    for i in 0..m {
        matrix[i * m] -= h.powi(i as i32 + 1);
        matrix[(m - 1) * m + i] -= h.powi((m - i) as i32);
    }
    if 2.0 * h - 1.0 > 0.0 {
        matrix[(m - 1) * m] += (2.0 * h - 1.0).powi(m as i32);
    }
    for i in 0..m {
        for j in 0..m {
            if i + 1 > j {
                for g in 1..=(i + 1 - j) {
                    matrix[i * m + j] /= g as f64;
                }
            }
        }
    }

    let (power, mut exponent) = matrix_power(&matrix, 0, m, n);
    let mut s = power[(k - 1) * m + k - 1];
    for i in 1..=n {
        s = s * i as f64 / nf;
        if s < 1e-140 {
            s *= 1e140;
            exponent -= 140;
        }
    }
    s * 10f64.powi(exponent)
}

fn matrix_multiply(a: &[f64], b: &[f64], m: usize) -> Vec<f64> {
    let mut c = vec![0.0; m * m];
    for i in 0..m {
        for k in 0..m {
            let aik = a[i * m + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..m {
                c[i * m + j] += aik * b[k * m + j];
            }
        }
    }
    c
}

/// Raise `a` (scaled by 10^exponent) to the power `n`, rescaling to keep the
/// entries in range. Returns the matrix and its decimal exponent.
fn matrix_power(a: &[f64], exponent: i32, m: usize, n: usize) -> (Vec<f64>, i32) {
    if n == 1 {
        return (a.to_vec(), exponent);
    }
    let (half, half_exp) = matrix_power(a, exponent, m, n / 2);
    let squared = matrix_multiply(&half, &half, m);
    let squared_exp = 2 * half_exp;

    let (mut result, mut result_exp) = if n % 2 == 0 {
        (squared, squared_exp)
    } else {
        (matrix_multiply(a, &squared, m), exponent + squared_exp)
    };

    if result[(m / 2) * m + m / 2] > 1e140 {
        for value in result.iter_mut() {
            *value *= 1e-140;
        }
        result_exp += 140;
    }
    (result, result_exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_normal_quantiles_pass() {
        // evenly spaced quantiles of N(0, 1)
        let normal = Normal::new(0.0, 1.0).unwrap();
        let samples: Vec<f64> = (1..=20)
            .map(|i| normal.inverse_cdf(i as f64 / 21.0))
            .collect();
        let result = ks_normal(&samples).unwrap();
        assert!(result.statistic < 0.06);
        assert!(result.is_normal(0.05));
    }

    #[test]
    fn test_pixel_distances_fail() {
        let samples = [0.0, 10.0, 10.0, 12.0, 25.0, 40.0];
        let result = ks_normal(&samples).unwrap();
        assert!(result.statistic > 0.4);
        assert!(!result.is_normal(0.05));
    }

    #[test]
    fn test_single_value_at_mean() {
        // D = 0.5 for a single value at 0, P(D_1 >= 0.5) = 1
        let result = ks_normal(&[0.0]).unwrap();
        assert!((result.statistic - 0.5).abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_distribution_small_n() {
        // P(D_1 < d) = 2d - 1 for 0.5 <= d <= 1
        assert!((kolmogorov_cdf(1, 0.75) - 0.5).abs() < 1e-9);
        // for n = 2 and 0.5 <= d <= 1, P(D_2 < d) = 1 - 2(1 - d)^2
        assert!((kolmogorov_cdf(2, 0.75) - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_asymptotic_tail() {
        assert!((kolmogorov_sf(0.2) - 1.0).abs() < 1e-6);
        // Q_KS(1.36) ~ 0.05
        assert!((kolmogorov_sf(1.36) - 0.0494).abs() < 1e-3);
    }

    #[test]
    fn test_empty() {
        assert!(ks_normal(&[]).is_err());
    }
}
