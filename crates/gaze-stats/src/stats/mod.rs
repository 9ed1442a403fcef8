//! Statistical analysis of gaze distance samples
//!
//! This module provides the summary statistics and hypothesis tests used to
//! compare eye tracker accuracy and precision across conditions. Probability
//! distributions come from `statrs`. Every test is two-sided and tied values
//! get average ranks.
//!
//! # Examples
//!
//! ```
//! use gaze_stats::stats::{mean, pstdev, mann_whitney_u};
//!
//! let samples = vec![0.0, 10.0, 10.0];
//! assert!((mean(&samples).unwrap() - 6.667).abs() < 1e-3);
//! assert!((pstdev(&samples).unwrap() - 4.714).abs() < 1e-3);
//!
//! let result = mann_whitney_u(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
//! assert!(result.p_value > 0.05);
//! ```

pub mod chisquare;
pub mod correlation;
pub mod descriptive;
pub mod nonparametric;
pub mod normality;
pub mod rank;

use serde::Serialize;

use crate::error::{AnalysisError, Result};

pub use chisquare::{chi_square_columns, ChiSquareResult};
pub use correlation::{linear_fit, spearman, LinearFit, SpearmanResult};
pub use descriptive::{
    confidence_interval, describe, mean, median, percentile, pstdev, sem, ConfidenceInterval,
    Description,
};
pub use nonparametric::{dunn_bonferroni, kruskal_wallis, mann_whitney_u, DunnMatrix};
pub use normality::{ks_normal, KsResult};

/// Statistic and p-value of a hypothesis test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

impl TestResult {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Fail unless every group holds at least two observations.
pub(crate) fn require_group_sizes(groups: &[&[f64]], test: &str) -> Result<()> {
    for (i, group) in groups.iter().enumerate() {
        if group.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "{} needs at least 2 observations per group, group {} has {}",
                test,
                i + 1,
                group.len()
            )));
        }
    }
    Ok(())
}

/// Map a `statrs` parameter error into an insufficient-data error
pub(crate) fn distribution_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::InsufficientData(format!("invalid distribution parameters: {}", e))
}
