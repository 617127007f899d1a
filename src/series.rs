use crate::error::{ReduceError, ReduceResult};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Photometric observations of one source as parallel arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSeries {
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
    pub filter: Vec<String>,
    pub ra: f64,
    pub dec: f64,
}

/// Observations of a single band, copied out of an [`ObservationSeries`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSeries {
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
}

impl ObservationSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Copy the observations whose filter label equals `band`.
    pub fn select_band(&self, band: &str) -> BandSeries {
        let mut series = BandSeries::default();
        for (i_obs, filter) in self.filter.iter().enumerate() {
            if filter == band {
                series.time.push(self.time[i_obs]);
                series.flux.push(self.flux[i_obs]);
                series.flux_err.push(self.flux_err[i_obs]);
            }
        }
        series
    }

    /// Same series with its timestamps replaced.
    pub fn with_time(&self, time: Vec<f64>) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}

/// Supplier of raw observation series keyed by source identifier.
pub trait SeriesSource {
    fn read(&self, source_id: u64) -> ReduceResult<ObservationSeries>;
}

// Whitespace-separated columns of ATLAS forced photometry files.
const COL_MJD: usize = 0;
const COL_FLUX: usize = 3;
const COL_FLUX_ERR: usize = 4;
const COL_FILTER: usize = 5;
const COL_RA: usize = 8;
const COL_DEC: usize = 9;
const MIN_COLS: usize = COL_DEC + 1;

/// Reader of ATLAS forced-photometry light curves, one file per source
/// named by its decimal identifier.
pub struct AtlasReader {
    dir: PathBuf,
}

impl AtlasReader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, source_id: u64) -> PathBuf {
        self.dir.join(source_id.to_string())
    }
}

impl SeriesSource for AtlasReader {
    fn read(&self, source_id: u64) -> ReduceResult<ObservationSeries> {
        let path = self.path(source_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ReduceError::SourceNotFound(source_id));
            }
            Err(source) => return Err(ReduceError::Io { path, source }),
        };

        let series = parse_atlas(&contents, &path)?;
        if series.is_empty() {
            return Err(ReduceError::SourceNotFound(source_id));
        }
        log::debug!("read {} observations from {path:?}", series.len());
        Ok(series)
    }
}

fn parse_atlas(contents: &str, path: &Path) -> ReduceResult<ObservationSeries> {
    let mut series = ObservationSeries {
        time: Vec::new(),
        flux: Vec::new(),
        flux_err: Vec::new(),
        filter: Vec::new(),
        ra: f64::NAN,
        dec: f64::NAN,
    };

    for (i_line, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = |reason: String| ReduceError::Parse {
            path: path.to_path_buf(),
            line: i_line + 1,
            reason,
        };

        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < MIN_COLS {
            return Err(parse_error(format!(
                "expected at least {MIN_COLS} columns, found {}",
                cols.len()
            )));
        }

        let number = |idx: usize| {
            let col = cols[idx];
            col.parse::<f64>()
                .map_err(|err| parse_error(format!("column {idx} ({col:?}): {err}")))
        };

        if series.is_empty() {
            series.ra = number(COL_RA)?;
            series.dec = number(COL_DEC)?;
        }
        series.time.push(number(COL_MJD)?);
        series.flux.push(number(COL_FLUX)?);
        series.flux_err.push(number(COL_FLUX_ERR)?);
        series.filter.push(cols[COL_FILTER].to_string());
    }

    Ok(series)
}
