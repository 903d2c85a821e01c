//! Report rendering

use clap::ValueEnum;
use simet_core::Report;
use std::fmt::Write;

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One aligned line per metric plus a verdict
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Render a report in the requested format
pub fn render(report: &Report, format: OutputFormat) -> simet_core::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => report.to_json(),
    }
}

fn render_text(report: &Report) -> String {
    let width = report
        .results
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max(6);

    let mut out = String::new();
    for result in &report.results {
        let verdict = if result.passed { "PASS" } else { "FAIL" };
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{:<width$}  {:<20}  {:<28}  {}",
            result.name,
            result.value.to_string(),
            result.bound.to_string(),
            verdict,
        );
    }

    let passed = report.results.iter().filter(|r| r.passed).count();
    let _ = writeln!(
        out,
        "{:<width$}  {}  ({}/{} restraints passed, run {}, {} ms)",
        "result",
        if report.passed { "PASS" } else { "FAIL" },
        passed,
        report.results.len(),
        report.run_id,
        report.duration_ms,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use simet_core::{Bound, MetricResult, MetricValue};
    use uuid::Uuid;

    fn report() -> Report {
        let results = vec![
            MetricResult::check(
                "fid",
                MetricValue::Scalar(4.5),
                Bound::scalar(0.0, 30.0).unwrap(),
            )
            .unwrap(),
            MetricResult::check(
                "precision_recall",
                MetricValue::Pair(0.65, 0.8),
                Bound::pair((0.7, 0.7), (1.0, 1.0)).unwrap(),
            )
            .unwrap(),
        ];
        Report::new(Uuid::new_v4(), Utc::now(), 12, results)
    }

    #[test]
    fn test_text_lines() {
        let text = render(&report(), OutputFormat::Text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("fid"));
        assert!(lines[0].contains("4.5000"));
        assert!(lines[0].ends_with("PASS"));
        assert!(lines[1].contains("(0.6500, 0.8000)"));
        assert!(lines[1].ends_with("FAIL"));
        assert!(lines[2].contains("FAIL"));
        assert!(lines[2].contains("1/2 restraints passed"));
    }

    #[test]
    fn test_json_round_trips() {
        let original = report();
        let json = render(&original, OutputFormat::Json).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results, original.results);
        assert_eq!(parsed.run_id, original.run_id);
        assert!(!parsed.passed);
    }
}
