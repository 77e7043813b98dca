//! Continuous accuracy measures for paired series (station vs. grid point).

use serde::{Deserialize, Serialize};

/// R² is reported only with at least this many paired samples.
pub const MIN_SAMPLES_FOR_R2: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarMeasures {
    pub samples: usize,
    pub mean_error: f64,
    pub mean_absolute_error: f64,
    pub rmse: f64,
    /// Squared Pearson correlation.
    pub r_squared: Option<f64>,
}

/// Measures over the pairs where both values are finite. `None` when no
/// such pair exists or the lengths differ.
pub fn scalar_measures(forecast: &[f64], observed: &[f64]) -> Option<ScalarMeasures> {
    if forecast.len() != observed.len() {
        return None;
    }
    let pairs: Vec<(f64, f64)> = forecast
        .iter()
        .zip(observed)
        .filter(|(f, o)| f.is_finite() && o.is_finite())
        .map(|(&f, &o)| (f, o))
        .collect();
    if pairs.is_empty() {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_error = pairs.iter().map(|(f, o)| f - o).sum::<f64>() / n;
    let mean_absolute_error = pairs.iter().map(|(f, o)| (f - o).abs()).sum::<f64>() / n;
    let rmse = (pairs.iter().map(|(f, o)| (f - o).powi(2)).sum::<f64>() / n).sqrt();
    let r_squared = if pairs.len() >= MIN_SAMPLES_FOR_R2 {
        pearson(&pairs).map(|r| r * r)
    } else {
        None
    };

    Some(ScalarMeasures {
        samples: pairs.len(),
        mean_error,
        mean_absolute_error,
        rmse,
        r_squared,
    })
}

/// `None` when either series has zero variance.
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len() as f64;
    let mean_f = pairs.iter().map(|(f, _)| f).sum::<f64>() / n;
    let mean_o = pairs.iter().map(|(_, o)| o).sum::<f64>() / n;
    let (mut cov, mut var_f, mut var_o) = (0.0, 0.0, 0.0);
    for (f, o) in pairs {
        let (df, d_o) = (f - mean_f, o - mean_o);
        cov += df * d_o;
        var_f += df * df;
        var_o += d_o * d_o;
    }
    if var_f == 0.0 || var_o == 0.0 {
        return None;
    }
    Some(cov / (var_f.sqrt() * var_o.sqrt()))
}
