//! Error kinds of the reduction core.

use std::path::PathBuf;
use thiserror::Error;

pub type ReduceResult<T> = Result<T, ReduceError>;

/// Failures raised by the time conversion, folding, binning and
/// data-access layers.
///
/// Caller errors (bad period, cycle count, normalization key) are never
/// coerced. Missing-data kinds (`SourceNotFound`, `NoPeriodAvailable`) may be
/// turned into an empty result by the reducer, depending on its mode.
#[derive(Error, Debug)]
pub enum ReduceError {
    #[error("failed to compute site position: {0}")]
    Geodesy(String),

    #[error("invalid sky coordinate (ra = {ra}, dec = {dec})")]
    InvalidCoordinate { ra: f64, dec: f64 },

    #[error("unknown observatory {0:?}")]
    UnknownObservatory(String),

    #[error("period must be finite and positive, but is {0}")]
    InvalidPeriod(f64),

    #[error("unknown normalization method {0:?} (choose from median, min, max, mean)")]
    InvalidNormalization(String),

    #[error("no valid flux values to normalize against")]
    NoValidData,

    #[error("number of cycles must be 1, 2 or 3, but is {0}")]
    InvalidCycleCount(usize),

    #[error("number of bins must be positive, but is {0}")]
    InvalidBinCount(usize),

    #[error("array lengths differ (time: {time}, flux: {flux}, flux_err: {flux_err})")]
    LengthMismatch {
        time: usize,
        flux: usize,
        flux_err: usize,
    },

    #[error("source {0} not found")]
    SourceNotFound(u64),

    #[error("no period available for source {0}")]
    NoPeriodAvailable(u64),

    #[error("failed to parse {path:?} at line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read catalog")]
    Csv(#[from] csv::Error),

    #[error("invalid file pattern")]
    Pattern(#[from] glob::PatternError),
}

impl ReduceError {
    /// Whether the error signals absent data rather than a caller mistake.
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            ReduceError::SourceNotFound(_) | ReduceError::NoPeriodAvailable(_)
        )
    }
}
