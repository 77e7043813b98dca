//! Rainfall threshold classification.
//!
//! Maps a co-registered forecast/observation pair onto per-cell contingency
//! categories for one rainfall bin. One parameterised rule covers every
//! bin of a [`BinTable`]; the total bin uses a sign test instead.
//!
//! The two rules treat zero differently on purpose. For the total bin a
//! zero is a valid "no rain" answer. For magnitude bins only measurable
//! rain (>= trace) is scored, so any zero, trace or missing value makes the
//! cell `Undefined`.

use ndarray::{ArrayView2, Zip};
use tracing::debug;

use crate::bins::BinTable;
use crate::grid::{ensure_same_shape, CategoryGrid};
use crate::model::{BinKind, Category, RainfallBin, VerifyError, TRACE_THRESHOLD_MM};

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classifies grids against rainfall bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdClassifier {
    /// Values below this are dry for magnitude bins.
    pub trace_threshold: f64,
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        ThresholdClassifier {
            trace_threshold: TRACE_THRESHOLD_MM,
        }
    }
}

impl ThresholdClassifier {
    pub fn new(trace_threshold: f64) -> Self {
        ThresholdClassifier { trace_threshold }
    }

    /// Category of a single cell.
    ///
    /// Never panics on NaN: every comparison with NaN is false, and the
    /// explicit finiteness checks below route such cells to `Undefined`.
    pub fn classify_cell(&self, forecast: f64, observation: f64, bin: &RainfallBin) -> Category {
        match bin.kind {
            BinKind::Total => classify_sign(forecast, observation),
            BinKind::Magnitude => {
                if !self.is_scored(forecast) || !self.is_scored(observation) {
                    return Category::Undefined;
                }
                Category::from_flags(bin.contains(forecast), bin.contains(observation))
            }
        }
    }

    /// Per-cell categories for one bin. Fails only on a shape mismatch.
    pub fn classify(
        &self,
        forecast: ArrayView2<f64>,
        observation: ArrayView2<f64>,
        bin: &RainfallBin,
    ) -> Result<CategoryGrid, VerifyError> {
        ensure_same_shape("observation", forecast.shape(), observation.shape())?;
        Ok(Zip::from(forecast)
            .and(observation)
            .map_collect(|&f, &o| self.classify_cell(f, o, bin)))
    }

    /// Classifies against every bin of the table, in table order.
    pub fn classify_all(
        &self,
        forecast: ArrayView2<f64>,
        observation: ArrayView2<f64>,
        bins: &BinTable,
    ) -> Result<Vec<CategoryGrid>, VerifyError> {
        ensure_same_shape("observation", forecast.shape(), observation.shape())?;
        let grids = bins
            .iter()
            .map(|bin| self.classify(forecast, observation, bin))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(bins = bins.len(), cells = forecast.len(), "classified period");
        Ok(grids)
    }

    /// Measurable, finite, non-negative rain.
    fn is_scored(&self, value: f64) -> bool {
        value.is_finite() && value >= self.trace_threshold
    }
}

/// Sign test used by the total bin: `> 0` is rain, `== 0` is no rain.
/// Negative and NaN values match neither and are `Undefined`.
fn classify_sign(forecast: f64, observation: f64) -> Category {
    let wet = |v: f64| {
        if v > 0.0 {
            Some(true)
        } else if v == 0.0 {
            Some(false)
        } else {
            None
        }
    };
    match (wet(forecast), wet(observation)) {
        (Some(f), Some(o)) => Category::from_flags(f, o),
        _ => Category::Undefined,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn bins() -> BinTable {
        BinTable::standard()
    }

    fn cell(f: f64, o: f64, name: &str) -> Category {
        let table = bins();
        let bin = table.find(name).expect("standard bin");
        ThresholdClassifier::default().classify_cell(f, o, bin)
    }

    // --- Total bin ----------------------------------------------------------

    #[test]
    fn test_total_bin_literal_scenario() {
        let fcst = array![[0.0, 0.0], [10.0, 0.0]];
        let obs = array![[0.0, 5.0], [10.0, 0.0]];
        let table = bins();
        let total = table.find("total").expect("total bin");
        let cats = ThresholdClassifier::default()
            .classify(fcst.view(), obs.view(), total)
            .expect("same shape");
        assert_eq!(
            cats,
            array![
                [Category::CorrectNegative, Category::Miss],
                [Category::Hit, Category::CorrectNegative]
            ]
        );
    }

    #[test]
    fn test_total_bin_false_alarm() {
        assert_eq!(cell(3.0, 0.0, "total"), Category::FalseAlarm);
    }

    #[test]
    fn test_total_bin_nan_and_negative_are_undefined() {
        assert_eq!(cell(f64::NAN, 1.0, "total"), Category::Undefined);
        assert_eq!(cell(1.0, -1.0, "total"), Category::Undefined);
    }

    // --- Magnitude bins -----------------------------------------------------

    #[test]
    fn test_both_zero_is_correct_negative_for_total_undefined_for_magnitude() {
        assert_eq!(cell(0.0, 0.0, "total"), Category::CorrectNegative);
        for name in ["dry", "low", "moderate", "heavy", "extreme"] {
            assert_eq!(cell(0.0, 0.0, name), Category::Undefined, "bin {}", name);
        }
    }

    #[test]
    fn test_low_bin_forecast_in_observation_trace_is_false_alarm() {
        assert_eq!(cell(12.0, 3.0, "low"), Category::FalseAlarm);
    }

    #[test]
    fn test_dry_cell_with_rain_observed_is_undefined() {
        for name in ["dry", "low", "moderate", "heavy", "extreme"] {
            assert_eq!(cell(0.0, 8.0, name), Category::Undefined, "bin {}", name);
        }
    }

    #[test]
    fn test_low_bin_hit_miss_and_correct_negative() {
        assert_eq!(cell(6.0, 19.9, "low"), Category::Hit);
        assert_eq!(cell(25.0, 10.0, "low"), Category::Miss);
        assert_eq!(cell(2.0, 10.0, "low"), Category::Miss);
        assert_eq!(cell(25.0, 0.5, "low"), Category::CorrectNegative);
    }

    #[test]
    fn test_upper_edge_belongs_to_next_bin() {
        assert_eq!(cell(20.0, 20.0, "low"), Category::CorrectNegative);
        assert_eq!(cell(20.0, 20.0, "moderate"), Category::Hit);
    }

    #[test]
    fn test_extreme_bin_is_open_ended() {
        assert_eq!(cell(500.0, 60.0, "extreme"), Category::Hit);
        assert_eq!(cell(55.0, 49.0, "extreme"), Category::FalseAlarm);
        assert_eq!(cell(10.0, 51.0, "extreme"), Category::Miss);
        assert_eq!(cell(10.0, 1.0, "extreme"), Category::CorrectNegative);
    }

    #[test]
    fn test_dry_bin_starts_at_trace() {
        assert_eq!(cell(0.1, 4.9, "dry"), Category::Hit);
        assert_eq!(cell(0.05, 4.9, "dry"), Category::Undefined);
        assert_eq!(cell(1.0, 7.0, "dry"), Category::FalseAlarm);
        assert_eq!(cell(7.0, 8.0, "dry"), Category::CorrectNegative);
    }

    #[test]
    fn test_nan_is_undefined_for_magnitude_bins() {
        assert_eq!(cell(f64::NAN, 10.0, "low"), Category::Undefined);
        assert_eq!(cell(10.0, f64::NAN, "low"), Category::Undefined);
        assert_eq!(cell(f64::INFINITY, 10.0, "extreme"), Category::Undefined);
    }

    // --- Grids --------------------------------------------------------------

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let fcst = array![[1.0, 2.0]];
        let obs = array![[1.0], [2.0]];
        let table = bins();
        let result = ThresholdClassifier::default().classify_all(fcst.view(), obs.view(), &table);
        assert!(matches!(result, Err(VerifyError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_reclassification_is_identical() {
        let fcst = array![[0.0, 12.0, 40.0], [3.0, f64::NAN, 70.0]];
        let obs = array![[5.0, 3.0, 36.0], [0.0, 1.0, 20.0]];
        let c = ThresholdClassifier::default();
        let first = c.classify_all(fcst.view(), obs.view(), &bins()).expect("ok");
        let second = c.classify_all(fcst.view(), obs.view(), &bins()).expect("ok");
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
    }
}
