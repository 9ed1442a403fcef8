//! Console reporter
//!
//! Human-readable output with box-drawn tables and significance markers.

use std::fmt::{self, Write};

use serde::Serialize;

use super::{CompareReport, TargetCompareReport};
use crate::compare::{
    BadReadTable, ComparisonReport, ComparisonTest, GroupComparison, Regression, RxAnalysis,
    TestOutcome, ValidationErrorAnalysis,
};
use crate::error::Result;
use crate::stats::{ConfidenceInterval, SpearmanResult, TestResult};
use crate::target_table::TargetComparison;

const RULE: &str = "────────────────────────────────────────────────────────────────";

/// A report that can be rendered as console text
pub trait ConsoleReport: Serialize {
    fn format_console(&self, output: &mut String) -> fmt::Result;
}

pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn format<R: ConsoleReport>(report: &R) -> Result<String> {
        let mut output = String::new();
        report.format_console(&mut output)?;
        Ok(output)
    }
}

fn banner(output: &mut String, title: &str) -> fmt::Result {
    writeln!(output)?;
    writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
    writeln!(output, "║{:^62}║", title)?;
    writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
    writeln!(output)
}

fn section(output: &mut String, title: &str) -> fmt::Result {
    writeln!(output, "{}", RULE)?;
    writeln!(output, "{}", title)?;
    writeln!(output, "{}", RULE)?;
    writeln!(output)
}

fn marker(significant: bool) -> &'static str {
    if significant {
        " ✓ significant"
    } else {
        ""
    }
}

fn format_test(output: &mut String, indent: &str, name: &str, outcome: &TestOutcome<TestResult>, alpha: f64) -> fmt::Result {
    match outcome {
        TestOutcome::Completed(r) => writeln!(
            output,
            "{}{}: statistic={:.4}, p={:.4}{}",
            indent,
            name,
            r.statistic,
            r.p_value,
            marker(r.is_significant(alpha))
        ),
        TestOutcome::Insufficient(reason) => {
            writeln!(output, "{}{}: insufficient data ({})", indent, name, reason)
        }
    }
}

fn format_spearman(output: &mut String, indent: &str, name: &str, outcome: &TestOutcome<SpearmanResult>, alpha: f64) -> fmt::Result {
    match outcome {
        TestOutcome::Completed(s) => writeln!(
            output,
            "{}{}: Spearman rho={:.4}, p={:.4} (df={}){}",
            indent,
            name,
            s.rho,
            s.p_value,
            s.df,
            marker(s.p_value < alpha)
        ),
        TestOutcome::Insufficient(reason) => {
            writeln!(output, "{}{}: insufficient data ({})", indent, name, reason)
        }
    }
}

fn format_interval(outcome: &TestOutcome<ConfidenceInterval>) -> String {
    match outcome {
        TestOutcome::Completed(ci) => format!("{:.3} ± {:.3}", ci.mean, ci.upper - ci.mean),
        TestOutcome::Insufficient(_) => "n/a".to_string(),
    }
}

fn format_comparison(output: &mut String, comparison: &GroupComparison, alpha: f64) -> fmt::Result {
    writeln!(output, "  [{}] {}", comparison.stat, comparison.context)?;
    if comparison.groups.is_empty() {
        writeln!(output, "    no data")?;
        return writeln!(output);
    }

    writeln!(output, "    ┌──────────────────────────┬───────┬─────────┬─────────┬──────────┬──────────────────┐")?;
    writeln!(output, "    │ Group                    │   n   │  Mean   │ Median  │ Variance │      95% CI      │")?;
    writeln!(output, "    ├──────────────────────────┼───────┼─────────┼─────────┼──────────┼──────────────────┤")?;
    for group in &comparison.groups {
        let d = &group.description;
        let variance = d.variance.map_or("n/a".to_string(), |v| format!("{:.4}", v));
        writeln!(
            output,
            "    │ {:<24} │ {:>5} │ {:>7.3} │ {:>7.3} │ {:>8} │ {:>16} │",
            group.name,
            d.n,
            d.mean,
            d.median,
            variance,
            format_interval(&group.confidence)
        )?;
    }
    writeln!(output, "    └──────────────────────────┴───────┴─────────┴─────────┴──────────┴──────────────────┘")?;

    match &comparison.test {
        ComparisonTest::NotEnoughGroups => writeln!(output, "    fewer than two groups, no test")?,
        ComparisonTest::MannWhitney(outcome) => format_test(output, "    ", "Mann-Whitney U", outcome, alpha)?,
        ComparisonTest::KruskalWallis { kruskal, dunn } => {
            format_test(output, "    ", "Kruskal-Wallis H", kruskal, alpha)?;
            match dunn {
                Some(TestOutcome::Completed(matrix)) => {
                    for (i, j, p) in matrix.significant_pairs(alpha) {
                        writeln!(
                            output,
                            "      Dunn: {} vs {}: p={:.4}",
                            comparison.groups[i].name, comparison.groups[j].name, p
                        )?;
                    }
                }
                Some(TestOutcome::Insufficient(reason)) => {
                    writeln!(output, "      Dunn: insufficient data ({})", reason)?
                }
                None => {}
            }
        }
    }
    writeln!(output)
}

fn format_bad_reads(output: &mut String, table: &BadReadTable, alpha: f64) -> fmt::Result {
    writeln!(output, "  {}", table.name)?;
    for (label, tally) in &table.rows {
        writeln!(
            output,
            "    {:<32} n={:<7} one eye={:<6} both={:<6} none={}",
            label, tally.n, tally.one, tally.both, tally.none
        )?;
    }
    match &table.tests {
        TestOutcome::Completed(_) => {
            let classes = table.significant_classes(alpha);
            if classes.is_empty() {
                writeln!(output, "    chi-square: no significant differences")
            } else {
                writeln!(output, "    chi-square: significant for {}", classes.join(", "))
            }
        }
        TestOutcome::Insufficient(reason) => {
            writeln!(output, "    chi-square: insufficient data ({})", reason)
        }
    }
}

fn format_regression(output: &mut String, regression: &Regression, alpha: f64) -> fmt::Result {
    let name = format!("{} [{}]", regression.label, regression.stat);
    if let TestOutcome::Completed(fit) = &regression.fit {
        writeln!(
            output,
            "    {}: y = {:.4}x + {:.4}",
            name, fit.slope, fit.intercept
        )?;
    }
    format_spearman(output, "    ", &name, &regression.spearman, alpha)
}

fn format_grouping(output: &mut String, report: &ComparisonReport, alpha: f64) -> fmt::Result {
    section(output, &report.title)?;

    writeln!(output, "  Participants per category:")?;
    for (category, count) in &report.counts {
        writeln!(output, "    {:<24} {}", category.to_string(), count)?;
    }
    writeln!(output)?;

    writeln!(output, "  Bad reads per category:")?;
    for table in &report.bad_reads.per_category {
        format_bad_reads(output, table, alpha)?;
    }
    if !report.bad_reads.per_position.is_empty() {
        writeln!(output, "  Bad reads per position:")?;
        for table in &report.bad_reads.per_position {
            format_bad_reads(output, table, alpha)?;
        }
    }
    if let Some(table) = &report.bad_reads.across_categories {
        writeln!(output, "  Bad reads across categories:")?;
        format_bad_reads(output, table, alpha)?;
    }
    writeln!(output)?;

    for comparison in &report.within_category {
        format_comparison(output, comparison, alpha)?;
    }

    if report.has_multiple_categories() {
        writeln!(output, "  Across categories:")?;
        for comparison in &report.across_categories {
            format_comparison(output, comparison, alpha)?;
        }
    }

    if !report.regressions.is_empty() {
        writeln!(output, "  Regression on {}:", report.key)?;
        for regression in &report.regressions {
            format_regression(output, regression, alpha)?;
        }
        writeln!(output)?;
    }
    Ok(())
}

fn format_rx(output: &mut String, rx: &RxAnalysis, alpha: f64) -> fmt::Result {
    section(output, "Spectacle Rx (stat vs. power)")?;
    for series in &rx.series {
        writeln!(output, "  {} ({} participants)", series.label, series.ids.len())?;
        for regression in &series.regressions {
            format_regression(output, regression, alpha)?;
        }
    }
    for id in &rx.missing {
        writeln!(output, "  ✗ no 'all' stats for participant {}", id)?;
    }
    writeln!(output)
}

fn format_validation_errors(output: &mut String, analysis: &ValidationErrorAnalysis, alpha: f64) -> fmt::Result {
    section(output, "Validation errors")?;
    for series in &analysis.series {
        writeln!(output, "  {:?}", series.region)?;
        for point in &series.points {
            writeln!(
                output,
                "    {} errors: accuracy {}, precision {}",
                point.errors,
                format_interval(&point.accuracy),
                format_interval(&point.precision)
            )?;
        }
        format_spearman(output, "    ", "accuracy", &series.accuracy, alpha)?;
        format_spearman(output, "    ", "precision", &series.precision, alpha)?;
    }
    writeln!(output)
}

impl ConsoleReport for CompareReport {
    fn format_console(&self, output: &mut String) -> fmt::Result {
        banner(output, "COMPARISON RESULTS")?;
        writeln!(output, "Project:       {}", self.project)?;
        writeln!(output, "Study:         {}", self.study)?;
        writeln!(output, "Participants:  {}", self.participants)?;
        writeln!(output, "Significance:  p < {}", self.significance)?;
        writeln!(output)?;

        for comparison in &self.comparisons {
            format_grouping(output, comparison, self.significance)?;
        }
        format_rx(output, &self.spectacle_rx, self.significance)?;
        if let Some(validation) = &self.validation_errors {
            format_validation_errors(output, validation, self.significance)?;
        }
        Ok(())
    }
}

fn format_target_comparison(output: &mut String, comparison: &TargetComparison, alpha: f64) -> fmt::Result {
    writeln!(output, "### {} {}", comparison.position, comparison.measure.name())?;
    format_test(output, "  ", "inner vs. outer", &comparison.inner_outer, alpha)?;
    let edge = if comparison.position == "Top" {
        "top row vs. rest"
    } else {
        "bottom row vs. rest"
    };
    format_test(output, "  ", edge, &comparison.edge_rest, alpha)?;
    if let Some(spearman) = &comparison.invalid_per_column {
        format_spearman(output, "  ", "invalid per column", spearman, alpha)?;
    }
    writeln!(output)
}

impl ConsoleReport for TargetCompareReport {
    fn format_console(&self, output: &mut String) -> fmt::Result {
        banner(output, "TARGET COMPARISON")?;
        writeln!(output, "Source:  {}", self.source)?;
        writeln!(output)?;
        for comparison in &self.comparisons {
            format_target_comparison(output, comparison, self.significance)?;
        }
        Ok(())
    }
}
