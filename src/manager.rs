use crate::catalog::CatalogCache;
use crate::config::{Config, PathsConfig};
use crate::reducer::{PeriodOverride, Reducer};
use crate::series::AtlasReader;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    work_dir: PathBuf,
    cfg: Config,
    paths: PathsConfig,
    reader: AtlasReader,
    catalog: CatalogCache,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(work_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        let paths = cfg.resolve_paths(&work_dir);
        let reader = AtlasReader::new(&paths.lightcurve_dir);
        let catalog = CatalogCache::new(&paths.catalog_dir);

        Ok(Self {
            work_dir,
            cfg,
            paths,
            reader,
            catalog,
        })
    }

    fn reducer(&self) -> Result<Reducer<'_, AtlasReader>> {
        Ok(Reducer::new(
            &self.reader,
            &self.catalog,
            self.cfg.time_converter()?,
            self.cfg.bin_options()?,
            self.cfg.binning.bands.clone(),
            self.cfg.reduce.mode,
        ))
    }

    /// Reduce one source, returning whether a result was written.
    pub fn reduce_source(&self, source_id: u64, period_override: PeriodOverride) -> Result<bool> {
        let reducer = self.reducer().context("failed to construct reducer")?;

        let Some(reduced) = reducer
            .reduce(source_id, period_override)
            .with_context(|| format!("failed to reduce source {source_id}"))?
        else {
            return Ok(false);
        };

        let file = self.reduced_file(source_id);
        write_msgpack(&file, &reduced)?;
        log::info!("saved {file:?}");

        Ok(true)
    }

    /// Reduce every source with a light-curve file.
    pub fn sweep(&self) -> Result<()> {
        let source_ids = self.list_sources().context("failed to list sources")?;
        let n_sources = source_ids.len();
        log::info!("found {n_sources} sources");

        let mut n_written = 0;
        for (i_source, &source_id) in source_ids.iter().enumerate() {
            if self.reduce_source(source_id, PeriodOverride::default())? {
                n_written += 1;
            }

            let progress = 100.0 * (i_source + 1) as f64 / n_sources as f64;
            log::info!("completed {progress:06.2}%");
        }

        log::info!("reduced {n_written} of {n_sources} sources");
        Ok(())
    }

    /// Save the barycentric-corrected, unbinned series of one source.
    pub fn correct_source(&self, source_id: u64) -> Result<bool> {
        let reducer = self.reducer().context("failed to construct reducer")?;

        let Some(series) = reducer
            .corrected_series(source_id)
            .with_context(|| format!("failed to correct source {source_id}"))?
        else {
            return Ok(false);
        };

        let file = self.corrected_file(source_id);
        write_msgpack(&file, &series)?;
        log::info!("saved {file:?}");

        Ok(true)
    }

    /// Log the period search record of one source.
    pub fn lookup_source(&self, source_id: u64) -> Result<()> {
        let catalog = self.catalog.get().context("failed to load period catalog")?;
        match (catalog.lookup(source_id), catalog.period_minutes(source_id)) {
            (Some(record), Some(per_min)) => {
                log::info!("period: {per_min} min");
                log::info!("{record:#?}");
            }
            _ => log::warn!("source {source_id} is not in the period catalog"),
        }
        Ok(())
    }

    pub fn clean(&self) -> Result<()> {
        for dir in [self.reduced_dir(), self.corrected_dir()] {
            if dir.is_dir() {
                fs::remove_dir_all(&dir).with_context(|| format!("failed to remove {dir:?}"))?;
                log::info!("removed {dir:?}");
            }
        }
        Ok(())
    }

    fn list_sources(&self) -> Result<Vec<u64>> {
        let pattern = self.paths.lightcurve_dir.join("*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut source_ids: Vec<u64> = glob(pattern)
            .context("failed to glob light-curve files")?
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .filter_map(|path| path.file_name()?.to_str()?.parse().ok())
            .collect();
        source_ids.sort_unstable();
        Ok(source_ids)
    }

    fn reduced_dir(&self) -> PathBuf {
        self.work_dir.join("reduced")
    }

    fn reduced_file(&self, source_id: u64) -> PathBuf {
        self.reduced_dir().join(format!("{source_id}.msgpack"))
    }

    fn corrected_dir(&self) -> PathBuf {
        self.work_dir.join("corrected")
    }

    fn corrected_file(&self, source_id: u64) -> PathBuf {
        self.corrected_dir().join(format!("{source_id}.msgpack"))
    }
}

fn write_msgpack<T: Serialize, P: AsRef<Path>>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {dir:?}"))?;
    }

    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
