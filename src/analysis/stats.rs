/// Small statistics helpers shared by the velocity and anomaly stages.
///
/// Every function returns `None` instead of a non-finite value.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Arithmetic mean of the values, `None` when there are none.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    m.is_finite().then_some(m)
}

/// Sample standard deviation (n - 1 denominator). Needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    let sd = variance.sqrt();
    sd.is_finite().then_some(sd)
}

/// Two-sided Student-t critical value for `confidence` (e.g. 0.95).
pub fn t_critical(confidence: f64, degrees_of_freedom: f64) -> Option<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom).ok()?;
    let q = dist.inverse_cdf((1.0 + confidence) / 2.0);
    q.is_finite().then_some(q)
}
