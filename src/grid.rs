//! Gridded field types and shape checks.
//!
//! Fields arrive already regridded onto a common grid; this module only
//! checks that they really are co-registered and normalises the missing
//! value convention to NaN. Ensemble fields carry the member dimension
//! first: `[member, lat, lon]`.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use crate::model::{Category, VerifyError};

/// A 2-D field of accumulations (mm), NaN where missing.
pub type Grid = Array2<f64>;

/// A 3-D field, `[member, lat, lon]` (or `[step, lat, lon]`).
pub type EnsembleGrid = Array3<f64>;

/// Per-cell categories with the same shape as the classified inputs.
pub type CategoryGrid = Array2<Category>;

/// Fails with `ShapeMismatch` unless `found` equals `expected`.
pub fn ensure_same_shape(
    what: &'static str,
    expected: &[usize],
    found: &[usize],
) -> Result<(), VerifyError> {
    if expected != found {
        return Err(VerifyError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Shape check for an ensemble against a 2-D grid: the trailing two axes
/// must match.
pub fn ensure_member_shape(
    what: &'static str,
    grid: ArrayView2<f64>,
    ensemble: ArrayView3<f64>,
) -> Result<(), VerifyError> {
    ensure_same_shape(what, grid.shape(), &ensemble.shape()[1..])
}

/// Replaces every occurrence of `sentinel` (e.g. -999.0 fill values) with NaN.
pub fn mask_missing(grid: ArrayView2<f64>, sentinel: f64) -> Grid {
    grid.mapv(|v| if v == sentinel { f64::NAN } else { v })
}

/// NaN-skipping mean across members. Cells where every member is missing
/// stay NaN.
pub fn ensemble_mean(ensemble: ArrayView3<f64>) -> Grid {
    Zip::from(ensemble.lanes(Axis(0))).map_collect(|members| {
        let (sum, n) = members
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if n == 0 { f64::NAN } else { sum / n as f64 }
    })
}

/// Stacks equally shaped 2-D grids along a new leading axis. No steps at
/// all is `EmptyWindow`.
pub fn stack_steps<T: Clone>(steps: &[Array2<T>]) -> Result<Array3<T>, VerifyError> {
    let views: Vec<_> = steps.iter().map(|s| s.view()).collect();
    let Some(first) = views.first() else {
        return Err(VerifyError::EmptyWindow {
            window: "stacked steps".into(),
        });
    };
    for view in &views[1..] {
        ensure_same_shape("stacked step", first.shape(), view.shape())?;
    }
    ndarray::stack(Axis(0), &views).map_err(|_| VerifyError::ShapeMismatch {
        what: "stacked steps",
        expected: first.shape().to_vec(),
        found: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
