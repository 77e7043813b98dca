//! Averaging contingency tables over a sequence of periods.
//!
//! Raw counts are summed across the window and divided by the number of
//! periods at the end. Skill scores are summed as per-period percentages.
//! A period whose score was undefined (zero denominator) does not add to the
//! sum; it bumps that score family's offset instead, and the final mean is
//! divided by `periods - offset`. Rare categories would otherwise look far
//! less skilful than they are.
//!
//! [`windows`] builds week and month windows on top of this; [`lead`] keys
//! the same running tables by forecast lead day.

pub mod lead;
pub mod windows;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bins::BinTable;
use crate::grid::ensure_same_shape;
use crate::model::{ContingencyCount, VerifyError};
use crate::table::TableRow;

// ---------------------------------------------------------------------------
// Offsets
// ---------------------------------------------------------------------------

/// Periods skipped per score family. Families share a counter when they
/// share a denominator: POD and BIAS (observed events), FAR and SR
/// (forecast events).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOffset {
    pub pod: u32,
    pub far_sr: u32,
    pub csi: u32,
    pub pcr: u32,
}

// ---------------------------------------------------------------------------
// Running table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct ScoreSums {
    pod: f64,
    far: f64,
    sr: f64,
    csi: f64,
    bias: f64,
    pcr: f64,
}

/// Running sums for one category over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningTable {
    pub category: String,
    pub periods: u32,
    pub offsets: AggregationOffset,
    counts: TableCounts,
    sums: ScoreSums,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct TableCounts {
    hit: f64,
    false_alarm: f64,
    miss: f64,
    correct_negative: f64,
    fcst_yes: f64,
    fcst_no: f64,
    obs_yes: f64,
    obs_no: f64,
    total_obs: f64,
    total_fcst: f64,
}

impl RunningTable {
    pub fn new(category: &str) -> Self {
        RunningTable {
            category: category.to_string(),
            periods: 0,
            offsets: AggregationOffset::default(),
            counts: TableCounts::default(),
            sums: ScoreSums::default(),
        }
    }

    /// Adds one period's row. Counts are always summed; each score either
    /// adds to its sum or bumps its family's offset.
    pub fn add_row(&mut self, row: &TableRow) {
        let c = &mut self.counts;
        c.hit += row.hit;
        c.false_alarm += row.false_alarm;
        c.miss += row.miss;
        c.correct_negative += row.correct_negative;
        c.fcst_yes += row.fcst_yes;
        c.fcst_no += row.fcst_no;
        c.obs_yes += row.obs_yes;
        c.obs_no += row.obs_no;
        c.total_obs += row.total_obs;
        c.total_fcst += row.total_fcst;

        let s = &mut self.sums;
        let o = &mut self.offsets;
        match (row.pod, row.bias) {
            (Some(pod), Some(bias)) => {
                s.pod += pod;
                s.bias += bias;
            }
            _ => o.pod += 1,
        }
        match (row.far, row.sr) {
            (Some(far), Some(sr)) => {
                s.far += far;
                s.sr += sr;
            }
            _ => o.far_sr += 1,
        }
        match row.csi {
            Some(csi) => s.csi += csi,
            None => o.csi += 1,
        }
        match row.pcr {
            Some(pcr) => s.pcr += pcr,
            None => o.pcr += 1,
        }
        self.periods += 1;
    }

    /// Per-period average of everything added so far.
    pub fn finalize(&self) -> Result<TableRow, VerifyError> {
        if self.periods == 0 {
            return Err(VerifyError::EmptyWindow {
                window: self.category.clone(),
            });
        }
        let n = self.periods as f64;
        let c = &self.counts;
        let mean = |sum: f64, offset: u32| {
            let used = self.periods.saturating_sub(offset);
            (used > 0).then(|| sum / used as f64)
        };
        Ok(TableRow {
            category: self.category.clone(),
            hit: c.hit / n,
            false_alarm: c.false_alarm / n,
            miss: c.miss / n,
            correct_negative: c.correct_negative / n,
            fcst_yes: c.fcst_yes / n,
            fcst_no: c.fcst_no / n,
            obs_yes: c.obs_yes / n,
            obs_no: c.obs_no / n,
            total_obs: c.total_obs / n,
            total_fcst: c.total_fcst / n,
            pod: mean(self.sums.pod, self.offsets.pod),
            far: mean(self.sums.far, self.offsets.far_sr),
            sr: mean(self.sums.sr, self.offsets.far_sr),
            csi: mean(self.sums.csi, self.offsets.csi),
            bias: mean(self.sums.bias, self.offsets.pod),
            pcr: mean(self.sums.pcr, self.offsets.pcr),
        })
    }
}

/// Folds one period's count into a running table.
pub fn accumulate(mut running: RunningTable, period: &ContingencyCount) -> RunningTable {
    let row = TableRow::from_count(&running.category, period);
    running.add_row(&row);
    running
}

/// Averages a running table over its periods.
pub fn finalize(running: &RunningTable) -> Result<TableRow, VerifyError> {
    running.finalize()
}

// ---------------------------------------------------------------------------
// Window aggregator
// ---------------------------------------------------------------------------

/// Running tables for every category of a bin table.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAggregator {
    label: String,
    tables: Vec<RunningTable>,
}

impl WindowAggregator {
    pub fn new(label: &str, bins: &BinTable) -> Self {
        Self::with_categories(label, bins.names())
    }

    pub fn with_categories<'a>(label: &str, categories: impl IntoIterator<Item = &'a str>) -> Self {
        WindowAggregator {
            label: label.to_string(),
            tables: categories.into_iter().map(RunningTable::new).collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn periods(&self) -> u32 {
        self.tables.first().map(|t| t.periods).unwrap_or(0)
    }

    pub fn tables(&self) -> &[RunningTable] {
        &self.tables
    }

    /// Adds one period: one row per category, in aggregator order.
    pub fn add_period(&mut self, rows: &[TableRow]) -> Result<(), VerifyError> {
        ensure_same_shape("period rows", &[self.tables.len()], &[rows.len()])?;
        if let Some((table, row)) = self
            .tables
            .iter()
            .zip(rows)
            .find(|(t, r)| t.category != r.category)
        {
            return Err(VerifyError::InvalidBinTable(format!(
                "expected category '{}', found '{}'",
                table.category, row.category
            )));
        }
        for (table, row) in self.tables.iter_mut().zip(rows) {
            table.add_row(row);
        }
        debug!(window = %self.label, periods = self.periods(), "added period");
        Ok(())
    }

    /// Averaged rows, or `EmptyWindow` if no period was added.
    pub fn finalize(&self) -> Result<Vec<TableRow>, VerifyError> {
        if self.periods() == 0 {
            return Err(VerifyError::EmptyWindow {
                window: self.label.clone(),
            });
        }
        self.tables.iter().map(RunningTable::finalize).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
