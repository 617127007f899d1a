use crate::binning::{BinOptions, DEFAULT_NUM_BINS, DEFAULT_NUM_CYCLES, Normalization};
use crate::reducer::Mode;
use crate::time::{BarycentricScale, DateFormat, ExposureReference, Observatory, TimeConverter};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::RangeBounds,
    path::{Path, PathBuf},
};

/// Reduction configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub binning: BinningConfig,
    #[serde(default)]
    pub reduce: ReduceConfig,
}

/// Data locations. Relative paths are resolved against the working directory.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory holding one light-curve file per source.
    pub lightcurve_dir: PathBuf,
    /// Directory holding the period search `*.result` files.
    pub catalog_dir: PathBuf,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeConfig {
    /// Observatory site name.
    pub observatory: String,
    /// Barycentric time scale of the corrected times.
    pub scale: BarycentricScale,
    /// Numeric format of the raw and corrected times.
    pub format: DateFormat,
    /// Exposure duration in seconds.
    pub exposure_s: f64,
    /// Instant of the exposure recorded by the raw times.
    pub exposure_reference: ExposureReference,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            observatory: "palomar".to_string(),
            scale: BarycentricScale::Tcb,
            format: DateFormat::Mjd,
            exposure_s: 30.0,
            exposure_reference: ExposureReference::Start,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinningConfig {
    /// Number of phase bins per cycle.
    pub num_bins: usize,
    /// Number of displayed cycles (1, 2 or 3).
    pub num_cycles: usize,
    /// Optional normalization statistic.
    pub normalization: Option<String>,
    /// Band labels binned independently.
    pub bands: Vec<String>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            num_bins: DEFAULT_NUM_BINS,
            num_cycles: DEFAULT_NUM_CYCLES,
            normalization: None,
            bands: vec!["c".to_string(), "o".to_string()],
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReduceConfig {
    /// Whether missing sources and periods abort the reduction.
    pub mode: Mode,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.time.exposure_s, 0.0..3600.0).context("invalid exposure duration")?;
        Observatory::of_site(&self.time.observatory).with_context(|| {
            let known: Vec<_> = Observatory::names().collect();
            format!("invalid observatory (known sites: {})", known.join(", "))
        })?;

        check_num(self.binning.num_bins, 1..1_000_000).context("invalid number of bins")?;
        check_num(self.binning.num_cycles, 1..=3).context("invalid number of cycles")?;
        self.normalization().context("invalid normalization")?;

        if self.binning.bands.is_empty() {
            bail!("at least one band must be configured");
        }
        for (i_band, band) in self.binning.bands.iter().enumerate() {
            if band.trim().is_empty() {
                bail!("band {i_band} has an empty label");
            }
            if self.binning.bands[..i_band].contains(band) {
                bail!("band {band:?} is listed twice");
            }
        }

        Ok(())
    }

    /// Resolve the data directories against `work_dir`.
    pub fn resolve_paths<P: AsRef<Path>>(&self, work_dir: P) -> PathsConfig {
        let work_dir = work_dir.as_ref();
        PathsConfig {
            lightcurve_dir: work_dir.join(&self.paths.lightcurve_dir),
            catalog_dir: work_dir.join(&self.paths.catalog_dir),
        }
    }

    pub fn normalization(&self) -> Result<Option<Normalization>> {
        let normalization = match &self.binning.normalization {
            None => None,
            Some(key) => Some(key.parse::<Normalization>()?),
        };
        Ok(normalization)
    }

    pub fn bin_options(&self) -> Result<BinOptions> {
        let options = BinOptions {
            num_bins: self.binning.num_bins,
            num_cycles: self.binning.num_cycles,
            normalization: self.normalization()?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn time_converter(&self) -> Result<TimeConverter> {
        Ok(TimeConverter {
            format: self.time.format,
            scale: self.time.scale,
            exposure_s: self.time.exposure_s,
            exposure_reference: self.time.exposure_reference,
            observatory: Observatory::of_site(&self.time.observatory)?,
        })
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
