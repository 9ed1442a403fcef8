//! JSON reporter

use serde::Serialize;

use crate::error::Result;

pub struct JsonReporter;

impl JsonReporter {
    /// Serialize a report, pretty-printed or compact
    pub fn format<R: Serialize>(report: &R, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_report;

    #[test]
    fn test_json_format_compact() {
        let output = JsonReporter::format(&sample_report(), false).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_json_format_pretty() {
        let output = JsonReporter::format(&sample_report(), true).unwrap();
        assert!(output.contains('\n'));
        assert!(output.contains("  "));
    }

    #[test]
    fn test_insufficient_outcome_serializes_reason() {
        let outcome: crate::compare::TestOutcome<f64> =
            crate::compare::TestOutcome::Insufficient("only one group".to_string());
        let output = JsonReporter::format(&outcome, false).unwrap();
        assert_eq!(output, r#"{"insufficient":"only one group"}"#);
    }
}
