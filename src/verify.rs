//! Single-period verification and its report.
//!
//! `verify_period` runs one forecast/observation pair through every bin of
//! a [`BinTable`] and keeps the intermediate products: category grids for
//! the map plots, counts for aggregation, rows for the tables.

use chrono::{DateTime, Utc};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::debug;

use crate::bins::BinTable;
use crate::classify::ThresholdClassifier;
use crate::exceedance::ExceedanceRow;
use crate::grid::CategoryGrid;
use crate::model::{ContingencyCount, Score, VerifyError};
use crate::table::{reduce, CategoryPanel, TableRow};

// ============================================================================
// Period verification
// ============================================================================

/// Everything computed for one period, indexed like the bin table.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodVerification {
    pub grids: Vec<CategoryGrid>,
    pub counts: Vec<ContingencyCount>,
    pub rows: Vec<TableRow>,
}

impl PeriodVerification {
    pub fn panel(&self, label: &str) -> CategoryPanel {
        CategoryPanel::new(label, self.rows.clone())
    }
}

pub fn verify_period(
    classifier: &ThresholdClassifier,
    bins: &BinTable,
    forecast: ArrayView2<f64>,
    observation: ArrayView2<f64>,
) -> Result<PeriodVerification, VerifyError> {
    let grids = classifier.classify_all(forecast, observation, bins)?;
    let counts: Vec<ContingencyCount> = grids.iter().map(|g| reduce(g.view())).collect();
    let rows = bins
        .iter()
        .zip(&counts)
        .map(|(bin, count)| TableRow::from_count(&bin.name, count))
        .collect();
    for (bin, count) in bins.iter().zip(&counts) {
        debug!(
            bin = %bin.name,
            hit = count.hit,
            miss = count.miss,
            false_alarm = count.false_alarm,
            correct_negative = count.correct_negative,
            undefined = count.undefined,
            "period counts"
        );
    }
    Ok(PeriodVerification { grids, counts, rows })
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub generated_at: String,
    pub label: String,
    pub rows: Vec<TableRow>,
    pub exceedance: Vec<ExceedanceRow>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub bins_scored: usize,
    /// Bins where at least one score had a zero denominator.
    pub bins_with_undefined_scores: usize,
    pub cells_classified: u64,
    pub cells_undefined: u64,
}

impl VerificationSummary {
    pub fn from_counts(counts: &[ContingencyCount]) -> Self {
        let mut summary = VerificationSummary::default();
        for count in counts {
            summary.bins_scored += 1;
            let scores = count.scores();
            if Score::ALL.iter().any(|s| scores.get(*s).is_none()) {
                summary.bins_with_undefined_scores += 1;
            }
            summary.cells_classified += count.total();
            summary.cells_undefined += count.undefined;
        }
        summary
    }
}

/// Bundles a period with optional exceedance rows. The timestamp is passed
/// in so reports are reproducible.
pub fn build_report(
    label: &str,
    period: &PeriodVerification,
    exceedance: Vec<ExceedanceRow>,
    generated_at: DateTime<Utc>,
) -> VerificationReport {
    VerificationReport {
        generated_at: generated_at.to_rfc3339(),
        label: label.to_string(),
        rows: period.rows.clone(),
        exceedance: exceedance.iter().map(ExceedanceRow::rounded).collect(),
        summary: VerificationSummary::from_counts(&period.counts),
    }
}

/// Plain-text summary table of a report.
pub fn render_summary(report: &VerificationReport) -> String {
    let rule = "=".repeat(72);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "VERIFICATION SUMMARY: {} ({})", report.label, report.generated_at);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<10} {:>8} {:>8} {:>8} {:>8} {:>10} {:>10} {:>10}",
        "category", "hit", "miss", "fa", "cn", "POD", "FAR", "CSI"
    );
    for row in &report.rows {
        let _ = writeln!(
            out,
            "{:<10} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>10} {:>10} {:>10}",
            row.category,
            row.hit,
            row.miss,
            row.false_alarm,
            row.correct_negative,
            TableRow::format_percent(row.pod),
            TableRow::format_percent(row.far),
            TableRow::format_percent(row.csi),
        );
    }
    let s = &report.summary;
    let _ = writeln!(
        out,
        "Bins: {} scored, {} with undefined scores. Cells: {} classified, {} undefined",
        s.bins_scored, s.bins_with_undefined_scores, s.cells_classified, s.cells_undefined
    );
    let _ = writeln!(out, "{}", rule);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    fn period() -> PeriodVerification {
        let fcst = array![[0.0, 0.0], [10.0, 0.0]];
        let obs = array![[0.0, 5.0], [10.0, 0.0]];
        verify_period(&ThresholdClassifier::default(), &BinTable::standard(), fcst.view(), obs.view())
            .expect("same shape")
    }

    #[test]
    fn test_verify_period_indexes_like_bin_table() {
        let p = period();
        assert_eq!(p.grids.len(), 6);
        assert_eq!(p.counts[0], ContingencyCount::new(1, 1, 0, 2));
        assert_eq!(p.rows[0].category, "total");
        assert_eq!(p.rows[0].pod, Some(50.0));
        // Only the 10/10 cell is scored by magnitude bins.
        assert_eq!(p.counts[2].hit, 1);
        assert_eq!(p.counts[2].undefined, 3);
        assert_eq!(p.panel("day").layout(3).len(), 2);
    }

    #[test]
    fn test_report_summary() {
        let p = period();
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid time");
        let report = build_report("2024-05-01", &p, Vec::new(), when);
        assert_eq!(report.generated_at, "2024-05-01T12:00:00+00:00");
        assert_eq!(report.summary.bins_scored, 6);
        // Each magnitude bin scores a single cell, so either POD or PCR
        // has a zero denominator.
        assert_eq!(report.summary.bins_with_undefined_scores, 5);
        assert_eq!(report.summary.cells_classified, 4 + 5);
        assert_eq!(report.summary.cells_undefined, 15);
    }

    #[test]
    fn test_render_summary_lists_every_row() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("valid time");
        let report = build_report("day", &period(), Vec::new(), when);
        let text = render_summary(&report);
        for name in ["total", "dry", "low", "moderate", "heavy", "extreme"] {
            assert!(text.contains(name), "missing {}", name);
        }
        assert!(text.contains("undefined"));
    }

    #[test]
    fn test_shape_mismatch_propagates() {
        let fcst = array![[0.0, 0.0]];
        let obs = array![[0.0], [0.0]];
        assert!(verify_period(&ThresholdClassifier::default(), &BinTable::standard(), fcst.view(), obs.view()).is_err());
    }
}
