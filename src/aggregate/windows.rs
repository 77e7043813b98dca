//! Calendar windows: weeks of daily tables and months of weekly tables.
//!
//! A week is `week_length_days` consecutive days ending on the requested
//! date. Days without data are dropped from the divisor. A month is built
//! from the weeks ending on `week_end` whose span overlaps the month by at
//! least `month_min_overlap_days` days; a boundary week that overlaps both
//! months enough counts toward both.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::WindowAggregator;
use crate::bins::BinTable;
use crate::classify::ThresholdClassifier;
use crate::grid::Grid;
use crate::logging::{log_period_failure, log_window_summary};
use crate::model::VerifyError;
use crate::table::TableRow;
use crate::verify::verify_period;

// ---------------------------------------------------------------------------
// Settings and data source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub week_length_days: u32,
    /// Weekday on which month-building weeks end.
    pub week_end: Weekday,
    pub month_min_overlap_days: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        WindowSettings {
            week_length_days: 7,
            week_end: Weekday::Sun,
            month_min_overlap_days: 3,
        }
    }
}

impl WindowSettings {
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.week_length_days == 0 {
            return Err(VerifyError::Config("week_length_days must be at least 1".into()));
        }
        if self.month_min_overlap_days == 0 || self.month_min_overlap_days > self.week_length_days {
            return Err(VerifyError::Config(format!(
                "month_min_overlap_days must be within 1..={}",
                self.week_length_days
            )));
        }
        Ok(())
    }
}

/// Forecast and observation grids for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodFields {
    pub forecast: Grid,
    pub observation: Grid,
}

/// Supplies the daily grids. `Ok(None)` means no data for that day.
pub trait PeriodSource {
    fn load(&self, date: NaiveDate) -> Result<Option<PeriodFields>, VerifyError>;
}

// ---------------------------------------------------------------------------
// Calendar helpers
// ---------------------------------------------------------------------------

/// The `length` days ending on `end`, oldest first.
pub fn week_dates(end: NaiveDate, length: u32) -> Vec<NaiveDate> {
    (0..length as i64)
        .rev()
        .map(|back| end - Duration::days(back))
        .collect()
}

/// Days of the window ending on `end` that fall in `year`/`month`.
pub fn overlap_days(end: NaiveDate, length: u32, year: i32, month: u32) -> u32 {
    week_dates(end, length)
        .iter()
        .filter(|d| d.year() == year && d.month() == month)
        .count() as u32
}

/// End dates of the weeks that make up a month, in order.
pub fn month_week_ends(year: i32, month: u32, settings: &WindowSettings) -> Result<Vec<NaiveDate>, VerifyError> {
    settings.validate()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| VerifyError::Config(format!("invalid month {}-{:02}", year, month)))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| VerifyError::Config(format!("invalid month {}-{:02}", next_year, next_month)))?;

    // First candidate: the earliest `week_end` day whose window can reach
    // into the month.
    let mut end = first;
    while end.weekday() != settings.week_end {
        end += Duration::days(1);
    }
    let last_reachable = next_first + Duration::days(settings.week_length_days as i64 - 1);

    let mut ends = Vec::new();
    while end < last_reachable {
        if overlap_days(end, settings.week_length_days, year, month) >= settings.month_min_overlap_days {
            ends.push(end);
        }
        end += Duration::days(7);
    }
    Ok(ends)
}

// ---------------------------------------------------------------------------
// Window summaries
// ---------------------------------------------------------------------------

/// Averaged table for one window plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub periods_used: u32,
    pub periods_skipped: Vec<NaiveDate>,
    pub rows: Vec<TableRow>,
}

impl WindowSummary {
    pub fn row(&self, category: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.category == category)
    }
}

/// Runs week and month averages against a [`PeriodSource`].
pub struct WindowVerifier<'a, S: PeriodSource> {
    source: &'a S,
    bins: &'a BinTable,
    classifier: ThresholdClassifier,
    settings: WindowSettings,
}

impl<'a, S: PeriodSource> WindowVerifier<'a, S> {
    pub fn new(source: &'a S, bins: &'a BinTable, classifier: ThresholdClassifier, settings: WindowSettings) -> Self {
        WindowVerifier {
            source,
            bins,
            classifier,
            settings,
        }
    }

    /// Rows for a single day. A day without data is `MissingPeriodData`.
    fn day_rows(&self, date: NaiveDate) -> Result<Vec<TableRow>, VerifyError> {
        let fields = self
            .source
            .load(date)?
            .ok_or_else(|| VerifyError::MissingPeriodData {
                period: date.to_string(),
            })?;
        let period = verify_period(
            &self.classifier,
            self.bins,
            fields.forecast.view(),
            fields.observation.view(),
        )?;
        Ok(period.rows)
    }

    /// Average over the week ending on `end`.
    ///
    /// Missing days and other recoverable failures drop the day. Shape
    /// errors abort. A week with no usable day is `EmptyWindow`.
    pub fn week_average(&self, end: NaiveDate) -> Result<WindowSummary, VerifyError> {
        self.settings.validate()?;
        let dates = week_dates(end, self.settings.week_length_days);
        let label = format!("week ending {}", end);
        let mut agg = WindowAggregator::new(&label, self.bins);
        let mut skipped = Vec::new();

        for date in &dates {
            match self.day_rows(*date) {
                Ok(rows) => agg.add_period(&rows)?,
                Err(e) if e.is_recoverable() => {
                    log_period_failure(&date.to_string(), &e);
                    skipped.push(*date);
                }
                Err(e) => return Err(e),
            }
        }

        let used = agg.periods();
        log_window_summary(&label, dates.len(), used as usize);
        let rows = agg.finalize()?;
        Ok(WindowSummary {
            label,
            start: dates.first().copied().unwrap_or(end),
            end,
            periods_used: used,
            periods_skipped: skipped,
            rows,
        })
    }

    /// Average of the weekly averages that make up `year`/`month`.
    ///
    /// Weeks with no data are skipped; an undefined weekly score is an
    /// offset at month level, the same way a day is within a week.
    pub fn month_average(&self, year: i32, month: u32) -> Result<WindowSummary, VerifyError> {
        let ends = month_week_ends(year, month, &self.settings)?;
        let label = format!("month {}-{:02}", year, month);
        let mut agg = WindowAggregator::new(&label, self.bins);
        let mut skipped = Vec::new();

        for end in &ends {
            match self.week_average(*end) {
                Ok(week) => {
                    debug!(week = %week.label, days = week.periods_used, "week contributes to month");
                    agg.add_period(&week.rows)?;
                }
                Err(e) if e.is_recoverable() => {
                    log_period_failure(&format!("week ending {}", end), &e);
                    skipped.push(*end);
                }
                Err(e) => return Err(e),
            }
        }

        let used = agg.periods();
        log_window_summary(&label, ends.len(), used as usize);
        let rows = agg.finalize()?;
        info!(window = %label, weeks = used, "month average complete");
        let start = ends
            .first()
            .map(|e| *e - Duration::days(self.settings.week_length_days as i64 - 1))
            .unwrap_or_default();
        Ok(WindowSummary {
            label,
            start,
            end: ends.last().copied().unwrap_or_default(),
            periods_used: used,
            periods_skipped: skipped,
            rows,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
