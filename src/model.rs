/// Category, RainfallBin, ContingencyCount, SkillScores, VerifyError
/// core data structures and error handling
///
/// Core data types for the precipitation verification engine.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no global state. Scores are computed here because
/// they are pure functions of a count and every other module needs them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Smallest accumulation (mm) treated as measurable rain by the magnitude
/// bins. Anything below this, including exact zeros, is a dry cell.
pub const TRACE_THRESHOLD_MM: f64 = 0.1;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Contingency category of a single grid cell.
///
/// `Undefined` marks cells excluded from scoring: dry or trace cells in the
/// magnitude bins, missing values, and exceedance cells that sit exactly on
/// the reference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Hit,
    Miss,
    FalseAlarm,
    CorrectNegative,
    Undefined,
}

impl Category {
    /// Integer code used by the map renderers (4 = hit ... 0 = undefined).
    pub fn code(self) -> u8 {
        match self {
            Category::Hit => 4,
            Category::FalseAlarm => 3,
            Category::Miss => 2,
            Category::CorrectNegative => 1,
            Category::Undefined => 0,
        }
    }

    /// Inverse of [`Category::code`]. Unknown codes map to `None`.
    pub fn from_code(code: u8) -> Option<Category> {
        match code {
            4 => Some(Category::Hit),
            3 => Some(Category::FalseAlarm),
            2 => Some(Category::Miss),
            1 => Some(Category::CorrectNegative),
            0 => Some(Category::Undefined),
            _ => None,
        }
    }

    /// Builds a category from the forecast/observed "event" flags.
    pub fn from_flags(forecast_yes: bool, observed_yes: bool) -> Category {
        match (forecast_yes, observed_yes) {
            (true, true) => Category::Hit,
            (true, false) => Category::FalseAlarm,
            (false, true) => Category::Miss,
            (false, false) => Category::CorrectNegative,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Hit => write!(f, "HIT"),
            Category::Miss => write!(f, "MISS"),
            Category::FalseAlarm => write!(f, "FALSE_ALARM"),
            Category::CorrectNegative => write!(f, "CORRECT_NEGATIVE"),
            Category::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rainfall bins
// ---------------------------------------------------------------------------

/// How a bin decides event membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinKind {
    /// Simple sign test: `> 0` is an event, `== 0` is a non-event.
    Total,
    /// Half-open magnitude interval `[lo, hi)`; dry cells are excluded.
    Magnitude,
}

/// A named rainfall intensity interval.
///
/// Magnitude bins are half-open `[lo, hi)`. The open-ended extreme bin uses
/// `hi = f64::INFINITY`. The total bin always covers `[0, ∞)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallBin {
    pub name: String,
    pub kind: BinKind,
    pub lo: f64,
    pub hi: f64,
}

impl RainfallBin {
    /// The sign-test bin covering all rain.
    pub fn total(name: &str) -> Self {
        RainfallBin {
            name: name.to_string(),
            kind: BinKind::Total,
            lo: 0.0,
            hi: f64::INFINITY,
        }
    }

    /// A magnitude bin `[lo, hi)`.
    pub fn magnitude(name: &str, lo: f64, hi: f64) -> Self {
        RainfallBin {
            name: name.to_string(),
            kind: BinKind::Magnitude,
            lo,
            hi,
        }
    }

    /// True if `value` falls inside `[lo, hi)`. NaN is never inside.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value < self.hi
    }

    pub fn is_open_ended(&self) -> bool {
        self.hi.is_infinite()
    }
}

// ---------------------------------------------------------------------------
// Contingency counts
// ---------------------------------------------------------------------------

/// Tally of categories over one classified grid (or one exceedance step).
///
/// `undefined` counts the cells that were classified but excluded from
/// scoring, so that
/// `hit + miss + false_alarm + correct_negative + undefined == cells`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyCount {
    pub hit: u64,
    pub miss: u64,
    pub false_alarm: u64,
    pub correct_negative: u64,
    pub undefined: u64,
}

impl ContingencyCount {
    pub fn new(hit: u64, miss: u64, false_alarm: u64, correct_negative: u64) -> Self {
        ContingencyCount {
            hit,
            miss,
            false_alarm,
            correct_negative,
            undefined: 0,
        }
    }

    /// Adds one classified cell to the tally.
    pub fn record(&mut self, category: Category) {
        match category {
            Category::Hit => self.hit += 1,
            Category::Miss => self.miss += 1,
            Category::FalseAlarm => self.false_alarm += 1,
            Category::CorrectNegative => self.correct_negative += 1,
            Category::Undefined => self.undefined += 1,
        }
    }

    pub fn fcst_yes(&self) -> u64 {
        self.hit + self.false_alarm
    }

    pub fn fcst_no(&self) -> u64 {
        self.miss + self.correct_negative
    }

    pub fn obs_yes(&self) -> u64 {
        self.hit + self.miss
    }

    pub fn obs_no(&self) -> u64 {
        self.false_alarm + self.correct_negative
    }

    /// Scored cells only; undefined cells never enter a total.
    pub fn total(&self) -> u64 {
        self.obs_yes() + self.obs_no()
    }

    /// Every classified cell, scored or not.
    pub fn cells(&self) -> u64 {
        self.total() + self.undefined
    }

    pub fn pod(&self) -> Result<f64, VerifyError> {
        ratio(Score::Pod, self.hit, self.hit + self.miss)
    }

    pub fn far(&self) -> Result<f64, VerifyError> {
        ratio(Score::Far, self.false_alarm, self.hit + self.false_alarm)
    }

    pub fn sr(&self) -> Result<f64, VerifyError> {
        ratio(Score::Sr, self.hit, self.hit + self.false_alarm)
    }

    pub fn csi(&self) -> Result<f64, VerifyError> {
        ratio(
            Score::Csi,
            self.hit,
            self.hit + self.false_alarm + self.miss,
        )
    }

    pub fn bias(&self) -> Result<f64, VerifyError> {
        ratio(Score::Bias, self.hit + self.false_alarm, self.hit + self.miss)
    }

    pub fn pcr(&self) -> Result<f64, VerifyError> {
        ratio(
            Score::Pcr,
            self.correct_negative,
            self.false_alarm + self.correct_negative,
        )
    }

    /// All six scores, with undefined ones kept as `None`.
    pub fn scores(&self) -> SkillScores {
        SkillScores {
            pod: self.pod().ok(),
            far: self.far().ok(),
            sr: self.sr().ok(),
            csi: self.csi().ok(),
            bias: self.bias().ok(),
            pcr: self.pcr().ok(),
        }
    }
}

impl std::ops::Add for ContingencyCount {
    type Output = ContingencyCount;

    fn add(self, rhs: ContingencyCount) -> ContingencyCount {
        ContingencyCount {
            hit: self.hit + rhs.hit,
            miss: self.miss + rhs.miss,
            false_alarm: self.false_alarm + rhs.false_alarm,
            correct_negative: self.correct_negative + rhs.correct_negative,
            undefined: self.undefined + rhs.undefined,
        }
    }
}

fn ratio(score: Score, numerator: u64, denominator: u64) -> Result<f64, VerifyError> {
    if denominator == 0 {
        return Err(VerifyError::UndefinedScore { score });
    }
    Ok(numerator as f64 / denominator as f64)
}

// ---------------------------------------------------------------------------
// Skill scores
// ---------------------------------------------------------------------------

/// Identifies one skill score. Used in errors and for offset bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Pod,
    Far,
    Sr,
    Csi,
    Bias,
    Pcr,
}

impl Score {
    pub const ALL: [Score; 6] = [Score::Pod, Score::Far, Score::Sr, Score::Csi, Score::Bias, Score::Pcr];
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Pod => write!(f, "POD"),
            Score::Far => write!(f, "FAR"),
            Score::Sr => write!(f, "SR"),
            Score::Csi => write!(f, "CSI"),
            Score::Bias => write!(f, "BIAS"),
            Score::Pcr => write!(f, "PCR"),
        }
    }
}

/// Categorical skill scores as fractions. `None` means the denominator was
/// zero for this count; it is never replaced by zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillScores {
    pub pod: Option<f64>,
    pub far: Option<f64>,
    pub sr: Option<f64>,
    pub csi: Option<f64>,
    pub bias: Option<f64>,
    pub pcr: Option<f64>,
}

impl SkillScores {
    pub fn get(&self, score: Score) -> Option<f64> {
        match score {
            Score::Pod => self.pod,
            Score::Far => self.far,
            Score::Sr => self.sr,
            Score::Csi => self.csi,
            Score::Bias => self.bias,
            Score::Pcr => self.pcr,
        }
    }

    /// Rounds every defined score to `decimals` places (export tables use 3).
    pub fn rounded(&self, decimals: i32) -> SkillScores {
        let factor = 10f64.powi(decimals);
        let round = |v: Option<f64>| v.map(|x| (x * factor).round() / factor);
        SkillScores {
            pod: round(self.pod),
            far: round(self.far),
            sr: round(self.sr),
            csi: round(self.csi),
            bias: round(self.bias),
            pcr: round(self.pcr),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by classification, reduction and aggregation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    /// A score's denominator was zero for a single period.
    #[error("{score} is undefined: zero denominator")]
    UndefinedScore { score: Score },
    /// Grids that must be co-registered have different shapes.
    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// The ARI magnitude column is not strictly increasing at these cells.
    #[error("reference table is not monotonic at {} cell(s)", cells.len())]
    NonMonotonicReferenceTable { cells: Vec<(usize, usize)> },
    /// No source data exists for a day or period.
    #[error("no data available for period {period}")]
    MissingPeriodData { period: String },
    /// Every period of an aggregation window was missing.
    #[error("no usable periods in window {window}")]
    EmptyWindow { window: String },
    #[error("invalid bin table: {0}")]
    InvalidBinTable(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl VerifyError {
    /// Local errors that skip a cell, score or period rather than aborting
    /// the whole operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VerifyError::UndefinedScore { .. }
                | VerifyError::MissingPeriodData { .. }
                | VerifyError::NonMonotonicReferenceTable { .. }
                | VerifyError::EmptyWindow { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
