//! Rank-based significance tests.
//!
//! Gaze distance distributions are rarely normal, so groups are compared with
//! Mann-Whitney U (two groups) or Kruskal-Wallis H (three or more), followed by
//! Dunn's pairwise test with a Bonferroni correction when Kruskal-Wallis
//! rejects.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use super::rank::{rank_average, tie_term};
use super::{distribution_error, require_group_sizes, TestResult};
use crate::error::{AnalysisError, Result};

/// Exact p-values are used when one group is this small and there are no ties
const EXACT_MAX_GROUP: usize = 8;

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(distribution_error)
}

/// Two-sided Mann-Whitney U test.
///
/// The reported statistic is U for the first sample. The p-value is exact when
/// either sample has at most eight observations and there are no ties,
/// otherwise it uses the tie-corrected normal approximation with continuity
/// correction.
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] when either group has fewer than two
/// observations.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<TestResult> {
    require_group_sizes(&[x, y], "Mann-Whitney U test")?;

    let n1 = x.len();
    let n2 = y.len();
    let combined: Vec<f64> = x.iter().chain(y.iter()).copied().collect();
    let ranks = rank_average(&combined);

    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u = u1.max(u2);
    let ties = tie_term(&combined);

    let p_value = if ties == 0.0 && n1.min(n2) <= EXACT_MAX_GROUP {
        2.0 * exact_u_sf(u.round() as usize, n1, n2)
    } else {
        let n = (n1 + n2) as f64;
        let mu = (n1 * n2) as f64 / 2.0;
        let s = ((n1 * n2) as f64 / 12.0 * ((n + 1.0) - ties / (n * (n - 1.0)))).sqrt();
        if s == 0.0 {
            1.0
        } else {
            let z = (u - mu - 0.5) / s;
            2.0 * standard_normal()?.sf(z)
        }
    };

    Ok(TestResult {
        statistic: u1,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

/// P(U >= u) under the null hypothesis with no ties.
///
/// The number of arrangements giving each U is a coefficient of the Gaussian
/// binomial [n1 + n2, n1]_q, built up one factor at a time.
fn exact_u_sf(u: usize, n1: usize, n2: usize) -> f64 {
    let (m, n) = if n1 <= n2 { (n1, n2) } else { (n2, n1) };
    let max_u = m * n;
    let mut counts = vec![0.0f64; max_u + 1];
    counts[0] = 1.0;

    for i in 1..=m {
        let shift = n + i;
        for k in (shift..=max_u).rev() {
            counts[k] -= counts[k - shift];
        }
        for k in i..=max_u {
            counts[k] += counts[k - i];
        }
    }

    let total: f64 = counts.iter().sum();
    if u > max_u {
        return 0.0;
    }
    counts[u..].iter().sum::<f64>() / total
}

/// Kruskal-Wallis H test with tie correction.
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] for fewer than two groups, a group with
/// fewer than two observations, or when every value is identical.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<TestResult> {
    if groups.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "Kruskal-Wallis test needs at least 2 groups, have {}",
            groups.len()
        )));
    }
    require_group_sizes(groups, "Kruskal-Wallis test")?;

    let all: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = all.len() as f64;
    let ranks = rank_average(&all);

    let mut offset = 0;
    let mut h = 0.0;
    for group in groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        h += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    let correction = 1.0 - tie_term(&all) / (n * n * n - n);
    if correction <= 0.0 {
        return Err(AnalysisError::InsufficientData(
            "Kruskal-Wallis test: all values are identical".to_string(),
        ));
    }
    h /= correction;

    let chi2 = ChiSquared::new((groups.len() - 1) as f64).map_err(distribution_error)?;
    Ok(TestResult {
        statistic: h,
        p_value: chi2.sf(h).clamp(0.0, 1.0),
    })
}

/// Pairwise Dunn test p-values, Bonferroni adjusted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DunnMatrix {
    /// Symmetric k x k matrix with ones on the diagonal
    pub p_values: Vec<Vec<f64>>,
}

impl DunnMatrix {
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.p_values[i][j]
    }

    /// Pairs (i < j) whose adjusted p-value is below `alpha`
    pub fn significant_pairs(&self, alpha: f64) -> Vec<(usize, usize, f64)> {
        let k = self.p_values.len();
        let mut pairs = Vec::new();
        for i in 0..k {
            for j in (i + 1)..k {
                if self.p_values[i][j] < alpha {
                    pairs.push((i, j, self.p_values[i][j]));
                }
            }
        }
        pairs
    }
}

/// Dunn's post-hoc test on every pair of groups with Bonferroni correction.
pub fn dunn_bonferroni(groups: &[&[f64]]) -> Result<DunnMatrix> {
    if groups.len() < 2 {
        return Err(AnalysisError::InsufficientData(
            "Dunn test needs at least 2 groups".to_string(),
        ));
    }
    require_group_sizes(groups, "Dunn test")?;

    let all: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = all.len() as f64;
    let ranks = rank_average(&all);

    let mut mean_ranks = Vec::with_capacity(groups.len());
    let mut offset = 0;
    for group in groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        mean_ranks.push(rank_sum / group.len() as f64);
        offset += group.len();
    }

    let ties = tie_term(&all) / (12.0 * (n - 1.0));
    let a = n * (n + 1.0) / 12.0;
    let normal = standard_normal()?;

    let k = groups.len();
    let comparisons = (k * (k - 1) / 2) as f64;
    let mut p_values = vec![vec![1.0; k]; k];

    for i in 0..k {
        for j in (i + 1)..k {
            let b = 1.0 / groups[i].len() as f64 + 1.0 / groups[j].len() as f64;
            let variance = (a - ties) * b;
            let p = if variance > 0.0 {
                let z = (mean_ranks[i] - mean_ranks[j]).abs() / variance.sqrt();
                2.0 * normal.sf(z)
            } else {
                1.0
            };
            let adjusted = (p * comparisons).min(1.0);
            p_values[i][j] = adjusted;
            p_values[j][i] = adjusted;
        }
    }

    Ok(DunnMatrix { p_values })
}
