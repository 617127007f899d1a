//! Inverse-variance weighted phase binning.
//!
//! The unit interval is split into `num_bins` half-open bins of equal width.
//! Every bin is always emitted; bins without a valid observation carry `NaN`
//! flux and flux error but keep their center phase, so the output grid has a
//! fixed length and uniform spacing. The grid is computed once and then
//! replicated over one, two or three display cycles.

use crate::error::{ReduceError, ReduceResult};
use crate::fold::{Ephemeris, fold};
use crate::stats::{WeightedAccumulator, compute_max, compute_mean, compute_median, compute_min};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_NUM_BINS: usize = 500;
pub const DEFAULT_NUM_CYCLES: usize = 3;

/// Statistic the binned flux is divided by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    Median,
    Min,
    Max,
    Mean,
}

impl Normalization {
    fn factor(&self, vals: &[f64]) -> f64 {
        match self {
            Normalization::Median => compute_median(vals),
            Normalization::Min => compute_min(vals),
            Normalization::Max => compute_max(vals),
            Normalization::Mean => compute_mean(vals),
        }
    }
}

impl FromStr for Normalization {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "median" => Ok(Normalization::Median),
            "min" => Ok(Normalization::Min),
            "max" => Ok(Normalization::Max),
            "mean" => Ok(Normalization::Mean),
            _ => Err(ReduceError::InvalidNormalization(s.to_string())),
        }
    }
}

/// Binning resolution, display replication and normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinOptions {
    pub num_bins: usize,
    pub num_cycles: usize,
    pub normalization: Option<Normalization>,
}

impl Default for BinOptions {
    fn default() -> Self {
        Self {
            num_bins: DEFAULT_NUM_BINS,
            num_cycles: DEFAULT_NUM_CYCLES,
            normalization: None,
        }
    }
}

impl BinOptions {
    pub fn validate(&self) -> ReduceResult<()> {
        if self.num_bins == 0 {
            return Err(ReduceError::InvalidBinCount(self.num_bins));
        }
        if !(1..=3).contains(&self.num_cycles) {
            return Err(ReduceError::InvalidCycleCount(self.num_cycles));
        }
        Ok(())
    }
}

/// Binned light curve as three parallel arrays of length
/// `num_bins * num_cycles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedCurve {
    pub phase: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
}

impl BinnedCurve {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            phase: Vec::with_capacity(capacity),
            flux: Vec::with_capacity(capacity),
            flux_err: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.phase.len()
    }

    /// Number of bins holding a finite flux.
    pub fn n_filled(&self) -> usize {
        self.flux.iter().filter(|val| val.is_finite()).count()
    }

    fn push(&mut self, phase: f64, flux: f64, flux_err: f64) {
        self.phase.push(phase);
        self.flux.push(flux);
        self.flux_err.push(flux_err);
    }

    fn extend_shifted(&mut self, cycle: &BinnedCurve, shift: f64) {
        self.phase.extend(cycle.phase.iter().map(|phase| phase + shift));
        self.flux.extend_from_slice(&cycle.flux);
        self.flux_err.extend_from_slice(&cycle.flux_err);
    }
}

/// Fold, bin, normalize and replicate one light curve.
///
/// `flux_err` entries that are non-positive or non-finite, and non-finite
/// `flux` entries, are ignored bin by bin.
pub fn bin(
    time: &[f64],
    flux: &[f64],
    flux_err: &[f64],
    ephemeris: &Ephemeris,
    options: &BinOptions,
) -> ReduceResult<BinnedCurve> {
    if time.len() != flux.len() || time.len() != flux_err.len() {
        return Err(ReduceError::LengthMismatch {
            time: time.len(),
            flux: flux.len(),
            flux_err: flux_err.len(),
        });
    }
    options.validate()?;

    let phases = fold(time, ephemeris)?;

    let mut cycle = bin_phases(&phases, flux, flux_err, options.num_bins);

    if let Some(normalization) = options.normalization {
        normalize(&mut cycle, normalization)?;
    }

    replicate(&cycle, options.num_cycles)
}

/// Lower edge of bin `i_bin`; `bin_edge(n, n)` is exactly 1.
fn bin_edge(i_bin: usize, num_bins: usize) -> f64 {
    i_bin as f64 / num_bins as f64
}

/// Index of the half-open bin `[edge_i, edge_i+1)` holding `phase`.
fn bin_index(phase: f64, num_bins: usize) -> Option<usize> {
    if !(0.0..1.0).contains(&phase) {
        return None;
    }
    let mut i_bin = ((phase * num_bins as f64) as usize).min(num_bins - 1);
    // Correct the truncated estimate against the exact edges.
    while i_bin > 0 && phase < bin_edge(i_bin, num_bins) {
        i_bin -= 1;
    }
    while i_bin + 1 < num_bins && phase >= bin_edge(i_bin + 1, num_bins) {
        i_bin += 1;
    }
    Some(i_bin)
}

fn bin_phases(phases: &[f64], flux: &[f64], flux_err: &[f64], num_bins: usize) -> BinnedCurve {
    let mut acc_vec = Vec::with_capacity(num_bins);
    acc_vec.resize_with(num_bins, WeightedAccumulator::new);

    for ((&phase, &flux), &flux_err) in phases.iter().zip(flux).zip(flux_err) {
        if let Some(i_bin) = bin_index(phase, num_bins) {
            acc_vec[i_bin].add(flux, flux_err);
        }
    }

    let mut cycle = BinnedCurve::with_capacity(num_bins);
    for (i_bin, acc) in acc_vec.iter().enumerate() {
        let center = 0.5 * (bin_edge(i_bin, num_bins) + bin_edge(i_bin + 1, num_bins));
        match acc.report() {
            Some(report) => cycle.push(center, report.mean, report.err),
            None => cycle.push(center, f64::NAN, f64::NAN),
        }
    }
    cycle
}

fn normalize(cycle: &mut BinnedCurve, normalization: Normalization) -> ReduceResult<()> {
    let finite: Vec<f64> = cycle
        .flux
        .iter()
        .copied()
        .filter(|val| val.is_finite())
        .collect();
    if finite.is_empty() {
        return Err(ReduceError::NoValidData);
    }

    let factor = normalization.factor(&finite);
    if !factor.is_finite() || factor == 0.0 {
        return Err(ReduceError::NoValidData);
    }

    cycle.flux.iter_mut().for_each(|val| *val /= factor);
    cycle.flux_err.iter_mut().for_each(|val| *val /= factor);
    Ok(())
}

/// Concatenate phase-shifted copies of one cycle in ascending shift order.
fn replicate(cycle: &BinnedCurve, num_cycles: usize) -> ReduceResult<BinnedCurve> {
    let shifts: &[f64] = match num_cycles {
        1 => &[0.0],
        2 => &[-1.0, 0.0],
        3 => &[-1.0, 0.0, 1.0],
        _ => return Err(ReduceError::InvalidCycleCount(num_cycles)),
    };

    let mut curve = BinnedCurve::with_capacity(cycle.len() * num_cycles);
    for &shift in shifts {
        curve.extend_shifted(cycle, shift);
    }
    Ok(curve)
}
