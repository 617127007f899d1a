use crate::error::{ReduceError, ReduceResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use glob::glob;
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

const MINUTES_PER_DAY: f64 = 1440.0;

/// One box-least-squares search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlsRecord {
    pub gid: u64,
    pub pow: f64,
    pub snr: f64,
    pub wid: f64,
    pub per_day: f64,
    pub per_min: f64,
    pub q: f64,
    pub phi0: f64,
    pub dphi: f64,
    pub epo: f64,
}

/// Period and epoch search results keyed by source identifier.
#[derive(Debug, Default)]
pub struct PeriodCatalog {
    records: HashMap<u64, BlsRecord>,
}

impl PeriodCatalog {
    /// Load every `*.result` file of `dir` in sorted name order.
    ///
    /// `per_day` is recomputed from `per_min`, which is stored with more
    /// significant digits. Later files override earlier ones.
    pub fn load<P: AsRef<Path>>(dir: P) -> ReduceResult<Self> {
        let dir = dir.as_ref();
        let mut files = result_files(dir)?;
        files.sort();

        let mut catalog = Self::default();
        for file in &files {
            let n_records = catalog.add_file(file)?;
            log::debug!("loaded {n_records} records from {file:?}");
        }
        log::info!(
            "loaded period catalog with {} sources from {} files",
            catalog.len(),
            files.len()
        );
        Ok(catalog)
    }

    fn add_file(&mut self, file: &Path) -> ReduceResult<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(file)?;

        let mut n_records = 0;
        for record in reader.deserialize() {
            let mut record: BlsRecord = record?;
            record.per_day = record.per_min / MINUTES_PER_DAY;
            self.insert(record);
            n_records += 1;
        }
        Ok(n_records)
    }

    pub fn insert(&mut self, record: BlsRecord) {
        self.records.insert(record.gid, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn lookup(&self, source_id: u64) -> Option<&BlsRecord> {
        self.records.get(&source_id)
    }

    pub fn period_minutes(&self, source_id: u64) -> Option<f64> {
        self.lookup(source_id).map(|record| record.per_min)
    }
}

fn result_files(dir: &Path) -> ReduceResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ReduceError::Io {
            path: dir.to_path_buf(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
    }

    let pattern = dir.join("*.result");
    let files = glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    Ok(files)
}

/// Lazily loaded catalog owned by the caller.
///
/// The catalog is built on first access and then only shared by reference;
/// readers observe either no catalog or the complete one. A failed build
/// leaves the cache empty so the next access retries.
pub struct CatalogCache {
    dir: PathBuf,
    cell: OnceCell<PeriodCatalog>,
}

impl CatalogCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cell: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn from_catalog(catalog: PeriodCatalog) -> Self {
        Self {
            dir: PathBuf::new(),
            cell: OnceCell::with_value(catalog),
        }
    }

    #[cfg(test)]
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> ReduceResult<&PeriodCatalog> {
        self.cell.get_or_try_init(|| PeriodCatalog::load(&self.dir))
    }
}
