//! Chi-square tests on bad-read count tables.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::distribution_error;
use crate::error::{AnalysisError, Result};

/// Result for one count class (column) of a contingency table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub df: usize,
}

impl ChiSquareResult {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// One-way chi-square test applied independently to every column.
///
/// Each row is a group (a tracker, position or category) and each column a
/// count class (one eye bad, both eyes bad, none bad). Within a column the
/// expected count for every row is the column mean, so a column tests whether
/// that class of bad read is evenly spread across the groups. A column with no
/// counts at all has nothing to test and reports p = 1.
///
/// ```
/// use gaze_stats::stats::chi_square_columns;
///
/// let table = vec![vec![10.0, 50.0], vec![10.0, 10.0]];
/// let results = chi_square_columns(&table).unwrap();
/// assert_eq!(results[0].statistic, 0.0);
/// assert!(results[1].p_value < 0.05);
/// ```
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] with fewer than two rows, or rows of
/// differing length.
pub fn chi_square_columns(table: &[Vec<f64>]) -> Result<Vec<ChiSquareResult>> {
    if table.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "chi-square test needs at least 2 groups, have {}",
            table.len()
        )));
    }
    let columns = table[0].len();
    if table.iter().any(|row| row.len() != columns) {
        return Err(AnalysisError::InsufficientData(
            "chi-square table rows differ in length".to_string(),
        ));
    }

    let df = table.len() - 1;
    let chi2 = ChiSquared::new(df as f64).map_err(distribution_error)?;

    let results = (0..columns)
        .map(|col| {
            let expected = table.iter().map(|row| row[col]).sum::<f64>() / table.len() as f64;
            if expected <= 0.0 {
                return ChiSquareResult {
                    statistic: 0.0,
                    p_value: 1.0,
                    df,
                };
            }
            let statistic: f64 = table
                .iter()
                .map(|row| (row[col] - expected).powi(2) / expected)
                .sum();
            ChiSquareResult {
                statistic,
                p_value: chi2.sf(statistic).clamp(0.0, 1.0),
                df,
            }
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_counts_are_not_significant() {
        let table = vec![vec![20.0, 5.0, 100.0], vec![20.0, 5.0, 100.0]];
        for result in chi_square_columns(&table).unwrap() {
            assert_eq!(result.statistic, 0.0);
            assert_eq!(result.p_value, 1.0);
            assert_eq!(result.df, 1);
        }
    }

    #[test]
    fn test_known_statistic() {
        // expected 30 per row: (10-30)^2/30 + (50-30)^2/30 = 26.667
        let table = vec![vec![10.0], vec![50.0]];
        let result = chi_square_columns(&table).unwrap()[0];
        assert!((result.statistic - 80.0 / 3.0).abs() < 1e-10);
        assert!(result.is_significant(0.05));
    }

    #[test]
    fn test_three_groups_df() {
        let table = vec![vec![1.0], vec![2.0], vec![3.0]];
        assert_eq!(chi_square_columns(&table).unwrap()[0].df, 2);
    }

    #[test]
    fn test_empty_column() {
        let table = vec![vec![0.0, 4.0], vec![0.0, 6.0]];
        let results = chi_square_columns(&table).unwrap();
        assert_eq!(results[0].p_value, 1.0);
    }

    #[test]
    fn test_insufficient_rows() {
        assert!(matches!(
            chi_square_columns(&[vec![1.0, 2.0]]),
            Err(AnalysisError::InsufficientData(_))
        ));
        assert!(chi_square_columns(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }
}
