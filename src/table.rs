//! Contingency table reduction and tabular rows.
//!
//! Reduces classified grids to [`ContingencyCount`]s and renders them as
//! [`TableRow`]s: the record handed to plotting and export collaborators.
//! Row scores are percentages, matching the published tables; the
//! [`SkillScores`] on a count are fractions.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::model::{Category, ContingencyCount, SkillScores};

// ---------------------------------------------------------------------------
// Reduction
// ---------------------------------------------------------------------------

/// Tallies every cell of a category grid.
pub fn reduce(categories: ArrayView2<Category>) -> ContingencyCount {
    categories
        .iter()
        .fold(ContingencyCount::default(), |mut count, &cat| {
            count.record(cat);
            count
        })
}

/// Scores of a count. Shorthand for [`ContingencyCount::scores`].
pub fn scores(count: &ContingencyCount) -> SkillScores {
    count.scores()
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// One category's row of a contingency table.
///
/// Counts are `f64` because window averages are fractional. `pod`, `far`,
/// `sr`, `csi` and `pcr` are percentages; `bias` is a ratio. A `None` score
/// was undefined (zero denominator) and is exported as null/NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub category: String,
    pub hit: f64,
    pub false_alarm: f64,
    pub miss: f64,
    pub correct_negative: f64,
    pub fcst_yes: f64,
    pub fcst_no: f64,
    pub obs_yes: f64,
    pub obs_no: f64,
    pub total_obs: f64,
    pub total_fcst: f64,
    pub pod: Option<f64>,
    pub far: Option<f64>,
    pub sr: Option<f64>,
    pub csi: Option<f64>,
    pub bias: Option<f64>,
    pub pcr: Option<f64>,
}

impl TableRow {
    /// Row for a single period's count.
    pub fn from_count(category: &str, count: &ContingencyCount) -> Self {
        let s = count.scores();
        let pct = |v: Option<f64>| v.map(|x| x * 100.0);
        TableRow {
            category: category.to_string(),
            hit: count.hit as f64,
            false_alarm: count.false_alarm as f64,
            miss: count.miss as f64,
            correct_negative: count.correct_negative as f64,
            fcst_yes: count.fcst_yes() as f64,
            fcst_no: count.fcst_no() as f64,
            obs_yes: count.obs_yes() as f64,
            obs_no: count.obs_no() as f64,
            total_obs: count.total() as f64,
            total_fcst: count.total() as f64,
            pod: pct(s.pod),
            far: pct(s.far),
            sr: pct(s.sr),
            csi: pct(s.csi),
            bias: s.bias,
            pcr: pct(s.pcr),
        }
    }

    /// The 3×3 layout used by the table renderer:
    /// `[[hit, fa, fcst_yes], [miss, cn, fcst_no], [obs_yes, obs_no, total]]`,
    /// rounded to whole grid points.
    pub fn matrix(&self) -> [[i64; 3]; 3] {
        let r = |v: f64| v.round() as i64;
        let obs_yes = r(self.obs_yes);
        let obs_no = r(self.obs_no);
        [
            [r(self.hit), r(self.false_alarm), r(self.fcst_yes)],
            [r(self.miss), r(self.correct_negative), r(self.fcst_no)],
            [obs_yes, obs_no, obs_yes + obs_no],
        ]
    }

    /// Footer text of the published panels, e.g. `"50.00 %"`.
    pub fn format_percent(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:0.2} %", v),
            None => "undefined".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

/// All category rows for one period, laid out for a multi-panel figure
/// (2×3 for the six standard categories).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPanel {
    pub label: String,
    pub rows: Vec<TableRow>,
}

impl CategoryPanel {
    pub fn new(label: &str, rows: Vec<TableRow>) -> Self {
        CategoryPanel {
            label: label.to_string(),
            rows,
        }
    }

    /// Rows grouped into panel lines of `ncols` tables each.
    pub fn layout(&self, ncols: usize) -> Vec<Vec<&TableRow>> {
        if ncols == 0 {
            return Vec::new();
        }
        self.rows
            .chunks(ncols)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    pub fn row(&self, category: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.category == category)
    }
}

// ---------------------------------------------------------------------------
// Performance diagram
// ---------------------------------------------------------------------------

/// Coordinates of a count on a performance (Roebber) diagram: SR on the x
/// axis, POD on the y axis, with bias and CSI as the diagram's isolines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub sr: f64,
    pub pod: f64,
    pub bias: f64,
    pub csi: f64,
}

impl PerformancePoint {
    /// `None` unless SR and POD are both defined and non-zero.
    pub fn from_count(count: &ContingencyCount) -> Option<Self> {
        let sr = count.sr().ok()?;
        let pod = count.pod().ok()?;
        if sr == 0.0 || pod == 0.0 {
            return None;
        }
        Some(PerformancePoint {
            sr,
            pod,
            bias: pod / sr,
            csi: csi_isoline(sr, pod),
        })
    }
}

/// CSI implied by a (SR, POD) position on the diagram.
pub fn csi_isoline(sr: f64, pod: f64) -> f64 {
    1.0 / (1.0 / sr + 1.0 / pod - 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
