//! Extreme-event verification by exceedance of a reference field.
//!
//! Instead of magnitude bins, a cell is an "event" when a value exceeds a
//! reference at that cell: a monthly climatology ([`climatology`]) or a
//! return-period threshold ([`ari`]). Both modes produce an
//! [`ExceedanceField`]: category grids stacked along a leading step axis
//! (time step or ensemble member), reduced by counting cells per step.
//!
//! A value exactly equal to its reference is neither an event nor a
//! non-event. Such cells can still be a false alarm or a miss when the other
//! side is an event, but never a correct negative.

pub mod ari;
pub mod climatology;

use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::grid::stack_steps;
use crate::model::{Category, ContingencyCount, SkillScores, VerifyError};
use crate::table::reduce;

// ---------------------------------------------------------------------------
// Exceedance state
// ---------------------------------------------------------------------------

/// Where a value sits relative to its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exceedance {
    Above,
    Below,
    /// Exactly on the reference.
    Equal,
    /// Value or reference missing.
    Missing,
}

impl Exceedance {
    pub fn of(value: f64, reference: f64) -> Exceedance {
        if value.is_nan() || reference.is_nan() {
            Exceedance::Missing
        } else if value > reference {
            Exceedance::Above
        } else if value < reference {
            Exceedance::Below
        } else {
            Exceedance::Equal
        }
    }
}

/// Combines forecast and observed exceedance into a category.
///
/// HIT: both above. FALSE_ALARM: forecast above, observation not.
/// MISS: observation above, forecast not. CORRECT_NEGATIVE: both below.
/// Anything involving a missing value, or an `Equal` paired with a
/// non-event, is `Undefined`.
pub fn combine(forecast: Exceedance, observed: Exceedance) -> Category {
    use Exceedance::*;
    match (forecast, observed) {
        (Missing, _) | (_, Missing) => Category::Undefined,
        (Above, Above) => Category::Hit,
        (Above, _) => Category::FalseAlarm,
        (_, Above) => Category::Miss,
        (Below, Below) => Category::CorrectNegative,
        _ => Category::Undefined,
    }
}

// ---------------------------------------------------------------------------
// Exceedance field
// ---------------------------------------------------------------------------

/// Gridded exceedance categories, `[step, lat, lon]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceedanceField {
    categories: Array3<Category>,
}

impl ExceedanceField {
    pub fn from_steps(steps: &[Array2<Category>]) -> Result<Self, VerifyError> {
        Ok(ExceedanceField {
            categories: stack_steps(steps)?,
        })
    }

    pub(crate) fn from_array(categories: Array3<Category>) -> Self {
        ExceedanceField { categories }
    }

    /// Joins fields with identical spatial shape along the step axis.
    pub fn concat(fields: &[ExceedanceField]) -> Result<Self, VerifyError> {
        let steps: Vec<Array2<Category>> = fields
            .iter()
            .flat_map(|f| f.categories.outer_iter().map(|s| s.to_owned()))
            .collect();
        Self::from_steps(&steps)
    }

    pub fn steps(&self) -> usize {
        self.categories.len_of(Axis(0))
    }

    pub fn categories(&self) -> &Array3<Category> {
        &self.categories
    }

    pub fn step(&self, index: usize) -> Option<ArrayView2<'_, Category>> {
        (index < self.steps()).then(|| self.categories.index_axis(Axis(0), index))
    }

    /// Boolean map of one category at one step, for map plotting.
    pub fn mask(&self, index: usize, category: Category) -> Option<Array2<bool>> {
        self.step(index).map(|s| s.mapv(|c| c == category))
    }

    /// Spatial counts per step: the reduction replaces the time axis with
    /// the grid.
    pub fn counts(&self) -> Vec<ContingencyCount> {
        self.categories
            .outer_iter()
            .map(|step| reduce(step))
            .collect()
    }

    /// One table row per step.
    pub fn table(&self) -> Vec<ExceedanceRow> {
        self.counts()
            .into_iter()
            .enumerate()
            .map(|(step, count)| ExceedanceRow::new(step, count))
            .collect()
    }
}

/// Per-step counts of an exceedance field with their scores (fractions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceedanceRow {
    pub step: usize,
    pub hits: u64,
    pub miss: u64,
    pub false_alarm: u64,
    pub non_event: u64,
    pub scores: SkillScores,
}

impl ExceedanceRow {
    pub fn new(step: usize, count: ContingencyCount) -> Self {
        ExceedanceRow {
            step,
            hits: count.hit,
            miss: count.miss,
            false_alarm: count.false_alarm,
            non_event: count.correct_negative,
            scores: count.scores(),
        }
    }

    pub fn count(&self) -> ContingencyCount {
        ContingencyCount::new(self.hits, self.miss, self.false_alarm, self.non_event)
    }

    /// Scores rounded to three decimals, as written to the CSV tables.
    pub fn rounded(&self) -> ExceedanceRow {
        ExceedanceRow {
            scores: self.scores.rounded(3),
            ..self.clone()
        }
    }
}

/// Classifies a forecast/observation pair against a shared reference grid.
pub(crate) fn classify_against(
    forecast: ArrayView2<f64>,
    observed: ArrayView2<f64>,
    reference: ArrayView2<f64>,
) -> Array2<Category> {
    Zip::from(forecast)
        .and(observed)
        .and(reference)
        .map_collect(|&f, &o, &r| combine(Exceedance::of(f, r), Exceedance::of(o, r)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_exceedance_of() {
        assert_eq!(Exceedance::of(6.0, 5.0), Exceedance::Above);
        assert_eq!(Exceedance::of(4.0, 5.0), Exceedance::Below);
        assert_eq!(Exceedance::of(5.0, 5.0), Exceedance::Equal);
        assert_eq!(Exceedance::of(f64::NAN, 5.0), Exceedance::Missing);
        assert_eq!(Exceedance::of(1.0, f64::NAN), Exceedance::Missing);
    }

    #[test]
    fn test_combine_rules() {
        use Exceedance::*;
        assert_eq!(combine(Above, Above), Category::Hit);
        assert_eq!(combine(Above, Below), Category::FalseAlarm);
        assert_eq!(combine(Above, Equal), Category::FalseAlarm);
        assert_eq!(combine(Below, Above), Category::Miss);
        assert_eq!(combine(Equal, Above), Category::Miss);
        assert_eq!(combine(Below, Below), Category::CorrectNegative);
        assert_eq!(combine(Equal, Below), Category::Undefined);
        assert_eq!(combine(Below, Equal), Category::Undefined);
        assert_eq!(combine(Missing, Above), Category::Undefined);
    }

    #[test]
    fn test_field_counts_per_step() {
        let s0 = array![[Category::Hit, Category::Miss], [Category::Undefined, Category::CorrectNegative]];
        let s1 = array![[Category::FalseAlarm, Category::FalseAlarm], [Category::Hit, Category::Hit]];
        let field = ExceedanceField::from_steps(&[s0, s1]).expect("same shape");
        assert_eq!(field.steps(), 2);
        let counts = field.counts();
        assert_eq!(counts[0], ContingencyCount { undefined: 1, ..ContingencyCount::new(1, 1, 0, 1) });
        assert_eq!(counts[1], ContingencyCount::new(2, 0, 2, 0));
        let table = field.table();
        assert_eq!(table[1].step, 1);
        assert_eq!(table[1].scores.far, Some(0.5));
    }

    #[test]
    fn test_mask_and_out_of_range_step() {
        let s0 = array![[Category::Hit, Category::Miss]];
        let field = ExceedanceField::from_steps(&[s0]).expect("one step");
        assert_eq!(field.mask(0, Category::Hit), Some(array![[true, false]]));
        assert!(field.step(3).is_none());
    }

    #[test]
    fn test_concat_fields() {
        let a = ExceedanceField::from_steps(&[array![[Category::Hit]]]).expect("ok");
        let b = ExceedanceField::from_steps(&[array![[Category::Miss]], array![[Category::Hit]]]).expect("ok");
        let joined = ExceedanceField::concat(&[a, b]).expect("same grid");
        assert_eq!(joined.steps(), 3);
    }

    #[test]
    fn test_row_rounding() {
        let row = ExceedanceRow::new(0, ContingencyCount::new(1, 2, 0, 0)).rounded();
        assert_eq!(row.scores.pod, Some(0.333));
        assert_eq!(row.count(), ContingencyCount::new(1, 2, 0, 0));
    }
}
