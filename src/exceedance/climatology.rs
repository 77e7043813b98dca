//! Climatology-relative extreme verification.
//!
//! An observation is extreme where it exceeds the monthly climatology at
//! that cell. The ensemble forecast is extreme where at least
//! `agreement_threshold` members exceed it.

use ndarray::{Array2, ArrayView2, ArrayView3, Axis, Zip};
use tracing::debug;

use super::{classify_against, combine, Exceedance, ExceedanceField};
use crate::grid::{ensure_member_shape, ensure_same_shape, Grid};
use crate::model::VerifyError;

/// Members that must agree before the ensemble calls an extreme.
pub const DEFAULT_AGREEMENT_THRESHOLD: usize = 2;

// ---------------------------------------------------------------------------
// Monthly climatology
// ---------------------------------------------------------------------------

/// One reference grid per calendar month.
#[derive(Debug, Clone, Default)]
pub struct MonthlyClimatology {
    months: [Option<Grid>; 12],
}

impl MonthlyClimatology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grid for `month` (1-12). All months must share one shape.
    pub fn insert(&mut self, month: u32, grid: Grid) -> Result<(), VerifyError> {
        let index = month_index(month)?;
        if let Some(existing) = self.months.iter().flatten().next() {
            ensure_same_shape("climatology month", existing.shape(), grid.shape())?;
        }
        self.months[index] = Some(grid);
        Ok(())
    }

    pub fn for_month(&self, month: u32) -> Result<ArrayView2<'_, f64>, VerifyError> {
        let index = month_index(month)?;
        self.months[index]
            .as_ref()
            .map(|g| g.view())
            .ok_or_else(|| VerifyError::MissingPeriodData {
                period: format!("climatology month {}", month),
            })
    }
}

fn month_index(month: u32) -> Result<usize, VerifyError> {
    if !(1..=12).contains(&month) {
        return Err(VerifyError::Config(format!("month {} out of range 1-12", month)));
    }
    Ok((month - 1) as usize)
}

// ---------------------------------------------------------------------------
// Ensemble agreement
// ---------------------------------------------------------------------------

/// Number of members exceeding the reference at each cell. Missing members
/// never count as exceeding.
pub fn exceedance_counts(
    ensemble: ArrayView3<f64>,
    reference: ArrayView2<f64>,
) -> Result<Array2<usize>, VerifyError> {
    ensure_member_shape("climatology", reference, ensemble)?;
    Ok(Zip::from(ensemble.lanes(Axis(0)))
        .and(reference)
        .map_collect(|members, &r| members.iter().filter(|&&m| m > r).count()))
}

/// Ensemble consensus at one cell: `Above` when enough members exceed,
/// `Below` otherwise, `Missing` when the reference or every member is
/// missing.
fn ensemble_state(members: ndarray::ArrayView1<f64>, reference: f64, agreement: usize) -> Exceedance {
    if reference.is_nan() || members.iter().all(|m| m.is_nan()) {
        return Exceedance::Missing;
    }
    let above = members.iter().filter(|&&m| m > reference).count();
    if above >= agreement {
        Exceedance::Above
    } else {
        Exceedance::Below
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies one valid time: `ensemble` is `[member, lat, lon]`.
/// Returns a single-step field.
pub fn classify_climatology(
    ensemble: ArrayView3<f64>,
    observed: ArrayView2<f64>,
    climatology: ArrayView2<f64>,
    agreement_threshold: usize,
) -> Result<ExceedanceField, VerifyError> {
    ensure_same_shape("observation", climatology.shape(), observed.shape())?;
    ensure_member_shape("ensemble", climatology, ensemble)?;
    if agreement_threshold == 0 {
        return Err(VerifyError::Config("agreement threshold must be at least 1".into()));
    }

    let categories = Zip::from(ensemble.lanes(Axis(0)))
        .and(observed)
        .and(climatology)
        .map_collect(|members, &o, &r| {
            combine(
                ensemble_state(members, r, agreement_threshold),
                Exceedance::of(o, r),
            )
        });
    debug!(
        members = ensemble.len_of(Axis(0)),
        agreement_threshold, "classified climatology exceedance"
    );
    ExceedanceField::from_steps(&[categories])
}

/// Single-valued forecast (deterministic run or ensemble mean) against the
/// climatology. The forecast is extreme where it exceeds the reference.
pub fn classify_deterministic(
    forecast: ArrayView2<f64>,
    observed: ArrayView2<f64>,
    climatology: ArrayView2<f64>,
) -> Result<ExceedanceField, VerifyError> {
    ensure_same_shape("forecast", climatology.shape(), forecast.shape())?;
    ensure_same_shape("observation", climatology.shape(), observed.shape())?;
    ExceedanceField::from_steps(&[classify_against(forecast, observed, climatology)])
}

/// Classifies a sequence of valid times against one climatology grid.
pub fn classify_climatology_steps(
    steps: &[(ArrayView3<f64>, ArrayView2<f64>)],
    climatology: ArrayView2<f64>,
    agreement_threshold: usize,
) -> Result<ExceedanceField, VerifyError> {
    let fields = steps
        .iter()
        .map(|(ens, obs)| classify_climatology(*ens, *obs, climatology, agreement_threshold))
        .collect::<Result<Vec<_>, _>>()?;
    ExceedanceField::concat(&fields)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
