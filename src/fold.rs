use crate::error::{ReduceError, ReduceResult};

/// Period model used to fold a time series.
///
/// `period` and `period_derivative` are in days and days/day. The reference
/// epoch is in the same time standard as the folded times; when it is `None`
/// the minimum folded time is used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ephemeris {
    pub period: f64,
    pub period_derivative: f64,
    pub reference_epoch: Option<f64>,
}

impl Ephemeris {
    pub fn new(period: f64) -> Self {
        Self {
            period,
            period_derivative: 0.0,
            reference_epoch: None,
        }
    }

    pub fn with_epoch(mut self, reference_epoch: f64) -> Self {
        self.reference_epoch = Some(reference_epoch);
        self
    }

    pub fn with_period_derivative(mut self, period_derivative: f64) -> Self {
        self.period_derivative = period_derivative;
        self
    }

    pub fn validate(&self) -> ReduceResult<()> {
        if !self.period.is_finite() || self.period <= 0.0 {
            return Err(ReduceError::InvalidPeriod(self.period));
        }
        Ok(())
    }
}

/// Fold absolute times onto phases in `[0, 1)`.
///
/// Uses the quadratic phase model
/// `phase = ((dt - 0.5 * (pdot / p) * dt^2) mod p) / p` with `dt = t - t0`,
/// where the modulo is Euclidean so times before the epoch still land in
/// `[0, 1)`.
pub fn fold(times: &[f64], ephemeris: &Ephemeris) -> ReduceResult<Vec<f64>> {
    ephemeris.validate()?;

    if times.is_empty() {
        return Ok(Vec::new());
    }

    let reference_epoch = ephemeris
        .reference_epoch
        .unwrap_or_else(|| times.iter().copied().fold(f64::INFINITY, f64::min));

    let period = ephemeris.period;
    let drift = 0.5 * ephemeris.period_derivative / period;

    let phases = times
        .iter()
        .map(|&t| {
            let dt = t - reference_epoch;
            let cycles = dt - drift * dt * dt;
            wrap_phase(cycles.rem_euclid(period) / period)
        })
        .collect();

    Ok(phases)
}

// `rem_euclid` may round up to exactly `rhs` for tiny negative inputs.
fn wrap_phase(phase: f64) -> f64 {
    if phase >= 1.0 { 0.0 } else { phase }
}
