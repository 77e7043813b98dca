//! Average Recurrence Interval (ARI) lookup and classification.
//!
//! Each grid cell has a table of rainfall magnitudes for a fixed set of
//! return periods (years). A forecast or observed accumulation is mapped to
//! an equivalent return period by 1-D linear interpolation on that table,
//! extrapolating linearly from the two end points outside its range.
//!
//! Interpolation only makes sense where the magnitudes increase strictly
//! with return period. Cells that break this are flagged, logged and set to
//! NaN (and therefore classified `Undefined`) instead of being extrapolated.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use tracing::warn;

use super::{combine, Exceedance, ExceedanceField};
use crate::grid::{ensure_member_shape, ensure_same_shape, EnsembleGrid, Grid};
use crate::model::{Category, VerifyError};

/// Return periods (years) of the reference ARI tables.
pub const STANDARD_RETURN_PERIODS: [f64; 11] =
    [1.0, 2.0, 5.0, 10.0, 25.0, 30.0, 50.0, 100.0, 200.0, 500.0, 1000.0];

/// Return period (years) above which an accumulation counts as extreme.
pub const DEFAULT_ARI_THRESHOLD_YEARS: f64 = 5.0;

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

/// Per-cell magnitude tables, `magnitudes[[period, lat, lon]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AriTable {
    return_periods: Vec<f64>,
    magnitudes: Array3<f64>,
}

/// Result of an ARI lookup over one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AriLookup {
    /// Return period (years) per cell, NaN where undefined.
    pub ari: Grid,
    /// Cells whose magnitude table is not strictly increasing.
    pub flagged: Vec<(usize, usize)>,
}

impl AriTable {
    pub fn new(return_periods: Vec<f64>, magnitudes: Array3<f64>) -> Result<Self, VerifyError> {
        if return_periods.len() < 2 {
            return Err(VerifyError::Config(
                "an ARI table needs at least two return periods".into(),
            ));
        }
        if return_periods.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(VerifyError::Config(
                "ARI return periods must be strictly increasing".into(),
            ));
        }
        ensure_same_shape(
            "ARI return periods",
            &[return_periods.len()],
            &[magnitudes.len_of(Axis(0))],
        )?;
        Ok(AriTable {
            return_periods,
            magnitudes,
        })
    }

    pub fn return_periods(&self) -> &[f64] {
        &self.return_periods
    }

    /// Spatial shape `[lat, lon]` of the table.
    pub fn grid_shape(&self) -> &[usize] {
        &self.magnitudes.shape()[1..]
    }

    /// `true` where the cell's magnitudes are usable for interpolation.
    /// Cells with any missing magnitude are masked out, not flagged.
    fn cell_states(&self) -> Array2<CellTable> {
        Zip::from(self.magnitudes.lanes(Axis(0))).map_collect(|lane| {
            if lane.iter().any(|m| m.is_nan()) {
                CellTable::Masked
            } else if lane.windows(2).into_iter().all(|w| w[0] < w[1]) {
                CellTable::Monotonic
            } else {
                CellTable::NonMonotonic
            }
        })
    }

    /// Cells whose magnitude column is not strictly increasing.
    pub fn non_monotonic_cells(&self) -> Vec<(usize, usize)> {
        flagged_cells(&self.cell_states())
    }

    /// Strict check for callers that refuse to work with a defective table.
    pub fn validate(&self) -> Result<(), VerifyError> {
        let cells = self.non_monotonic_cells();
        if cells.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::NonMonotonicReferenceTable { cells })
        }
    }

    /// Converts accumulations to return periods.
    pub fn lookup(&self, magnitude: ArrayView2<f64>) -> Result<AriLookup, VerifyError> {
        ensure_same_shape("ARI lookup input", self.grid_shape(), magnitude.shape())?;
        let states = self.cell_states();
        let flagged = flagged_cells(&states);
        warn_non_monotonic(&flagged, 1);
        Ok(AriLookup {
            ari: self.interpolate(magnitude, &states),
            flagged,
        })
    }

    /// [`AriTable::lookup`] over every member (or step) of a 3-D field. The
    /// table is checked once for the whole field.
    pub fn lookup_ensemble(&self, ensemble: ArrayView3<f64>) -> Result<(EnsembleGrid, Vec<(usize, usize)>), VerifyError> {
        ensure_same_shape("ARI lookup input", self.grid_shape(), &ensemble.shape()[1..])?;
        let states = self.cell_states();
        let flagged = flagged_cells(&states);
        warn_non_monotonic(&flagged, ensemble.len_of(Axis(0)));
        let mut out = EnsembleGrid::from_elem(ensemble.raw_dim(), f64::NAN);
        for (member, mut slot) in ensemble.outer_iter().zip(out.outer_iter_mut()) {
            slot.assign(&self.interpolate(member, &states));
        }
        Ok((out, flagged))
    }

    fn interpolate(&self, magnitude: ArrayView2<f64>, states: &Array2<CellTable>) -> Grid {
        Zip::from(magnitude)
            .and(self.magnitudes.lanes(Axis(0)))
            .and(states)
            .map_collect(|&value, lane, state| match state {
                CellTable::Monotonic => interpolate_return_period(value, lane, &self.return_periods),
                _ => f64::NAN,
            })
    }
}

fn flagged_cells(states: &Array2<CellTable>) -> Vec<(usize, usize)> {
    states
        .indexed_iter()
        .filter(|(_, state)| **state == CellTable::NonMonotonic)
        .map(|(idx, _)| idx)
        .collect()
}

fn warn_non_monotonic(flagged: &[(usize, usize)], fields: usize) {
    if !flagged.is_empty() {
        warn!(
            cells = flagged.len(),
            first = ?flagged.first(),
            fields,
            "ARI table not monotonic; cells left undefined"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellTable {
    Monotonic,
    NonMonotonic,
    Masked,
}

/// Linear interpolation of `value` on (magnitudes -> periods), extrapolating
/// from the first or last segment outside the table. `magnitudes` must be
/// strictly increasing and at least two long.
pub fn interpolate_return_period(value: f64, magnitudes: ArrayView1<f64>, periods: &[f64]) -> f64 {
    let n = magnitudes.len();
    if value.is_nan() || n < 2 || n != periods.len() {
        return f64::NAN;
    }
    let segment = if value <= magnitudes[0] {
        0
    } else if value >= magnitudes[n - 1] {
        n - 2
    } else {
        (0..n - 1)
            .find(|&i| value >= magnitudes[i] && value < magnitudes[i + 1])
            .unwrap_or(n - 2)
    };
    let (x0, x1) = (magnitudes[segment], magnitudes[segment + 1]);
    let (y0, y1) = (periods[segment], periods[segment + 1]);
    y0 + (value - x0) * (y1 - y0) / (x1 - x0)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies each forecast member individually against the observation.
///
/// `forecast_ari` is `[member, lat, lon]` in years, `observed_ari` is
/// `[lat, lon]` in years. A value is extreme when its return period is
/// strictly greater than `threshold_years`. The result has one step per
/// member.
pub fn classify_ari(
    forecast_ari: ArrayView3<f64>,
    observed_ari: ArrayView2<f64>,
    threshold_years: f64,
) -> Result<ExceedanceField, VerifyError> {
    ensure_member_shape("ARI forecast", observed_ari, forecast_ari)?;
    let mut categories = Array3::from_elem(forecast_ari.raw_dim(), Category::Undefined);
    for (member, mut slot) in forecast_ari.outer_iter().zip(categories.outer_iter_mut()) {
        Zip::from(&mut slot)
            .and(member)
            .and(observed_ari)
            .for_each(|cat, &f, &o| {
                *cat = combine(
                    Exceedance::of(f, threshold_years),
                    Exceedance::of(o, threshold_years),
                );
            });
    }
    Ok(ExceedanceField::from_array(categories))
}

/// Classifies paired forecast/observation ARI series step by step (e.g. a
/// deterministic or ensemble-mean forecast over several valid days).
pub fn classify_ari_steps(
    forecast_ari: ArrayView3<f64>,
    observed_ari: ArrayView3<f64>,
    threshold_years: f64,
) -> Result<ExceedanceField, VerifyError> {
    ensure_same_shape("ARI observation series", forecast_ari.shape(), observed_ari.shape())?;
    let categories = Zip::from(forecast_ari)
        .and(observed_ari)
        .map_collect(|&f, &o| {
            combine(
                Exceedance::of(f, threshold_years),
                Exceedance::of(o, threshold_years),
            )
        });
    Ok(ExceedanceField::from_array(categories))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
