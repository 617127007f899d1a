/// Running inverse-variance weighted mean.
///
/// Samples with a non-finite flux or a non-positive or non-finite error are
/// skipped, so an accumulator that only saw invalid samples reports `None`.
#[derive(Default)]
pub struct WeightedAccumulator {
    n_vals: usize,
    weight_sum: f64,
    weighted_flux_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedReport {
    pub mean: f64,
    pub err: f64,
}

impl WeightedAccumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            weight_sum: 0.0,
            weighted_flux_sum: 0.0,
        }
    }

    /// Add a sample, returning whether it was accepted.
    pub fn add(&mut self, flux: f64, flux_err: f64) -> bool {
        if !is_valid_sample(flux, flux_err) {
            return false;
        }
        let weight = 1.0 / (flux_err * flux_err);
        self.n_vals += 1;
        self.weight_sum += weight;
        self.weighted_flux_sum += flux * weight;
        true
    }

    pub fn report(&self) -> Option<WeightedReport> {
        if self.n_vals == 0 {
            return None;
        }
        Some(WeightedReport {
            mean: self.weighted_flux_sum / self.weight_sum,
            err: (1.0 / self.weight_sum).sqrt(),
        })
    }
}

pub fn is_valid_sample(flux: f64, flux_err: f64) -> bool {
    flux.is_finite() && flux_err.is_finite() && flux_err > 0.0
}

pub fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Median with the two middle values averaged for even lengths.
pub fn compute_median(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals == 0 {
        return f64::NAN;
    }
    let mut sorted = vals.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = n_vals / 2;
    if n_vals % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

pub fn compute_min(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn compute_max(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weighted_mean_of_two_samples() {
        let (f1, e1, f2, e2) = (10.0, 0.5, 14.0, 2.0);
        let mut acc = WeightedAccumulator::new();
        assert!(acc.add(f1, e1));
        assert!(acc.add(f2, e2));

        let w1 = 1.0 / (e1 * e1);
        let w2 = 1.0 / (e2 * e2);
        let report = acc.report().unwrap();
        let expected = (f1 * w1 + f2 * w2) / (w1 + w2);
        assert_abs_diff_eq!(report.mean, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(report.err, 1.0 / (w1 + w2).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn invalid_samples_are_skipped() {
        let mut acc = WeightedAccumulator::new();
        assert!(!acc.add(1.0, 0.0));
        assert!(!acc.add(1.0, -1.0));
        assert!(!acc.add(1.0, f64::NAN));
        assert!(!acc.add(f64::INFINITY, 1.0));
        assert!(acc.report().is_none());

        assert!(acc.add(3.0, 1.0));
        assert_eq!(acc.report().unwrap().mean, 3.0);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(compute_median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(compute_median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(compute_median(&[]).is_nan());
    }

    #[test]
    fn extrema_and_mean() {
        let vals = [2.0, -1.0, 5.0];
        assert_eq!(compute_min(&vals), -1.0);
        assert_eq!(compute_max(&vals), 5.0);
        assert_abs_diff_eq!(compute_mean(&vals), 2.0, epsilon = 1e-15);
        assert!(compute_mean(&[]).is_nan());
    }
}
