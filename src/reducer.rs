use crate::binning::{BinOptions, BinnedCurve, bin};
use crate::catalog::CatalogCache;
use crate::error::{ReduceError, ReduceResult};
use crate::fold::Ephemeris;
use crate::series::{ObservationSeries, SeriesSource};
use crate::stats::is_valid_sample;
use crate::time::TimeConverter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handling of sources without data or without a known period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Missing data is an error.
    Strict,
    /// Missing data yields no result, so bulk sweeps can continue.
    #[default]
    BestEffort,
}

/// Period and epoch requested by the caller, overriding the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodOverride {
    pub period: Option<f64>,
    pub period_derivative: Option<f64>,
    pub reference_epoch: Option<f64>,
}

/// Binned curves of one source, one per configured band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedLightCurve {
    pub source_id: u64,
    pub period: f64,
    pub reference_epoch: f64,
    pub bands: BTreeMap<String, BinnedCurve>,
}

/// Chains time conversion, folding and binning for single sources.
pub struct Reducer<'a, S: SeriesSource> {
    source: &'a S,
    catalog: &'a CatalogCache,
    converter: TimeConverter,
    options: BinOptions,
    bands: Vec<String>,
    mode: Mode,
}

impl<'a, S: SeriesSource> Reducer<'a, S> {
    pub fn new(
        source: &'a S,
        catalog: &'a CatalogCache,
        converter: TimeConverter,
        options: BinOptions,
        bands: Vec<String>,
        mode: Mode,
    ) -> Self {
        Self {
            source,
            catalog,
            converter,
            options,
            bands,
            mode,
        }
    }

    /// Read a source and convert its times to the barycentric scale.
    pub fn corrected_series(&self, source_id: u64) -> ReduceResult<Option<ObservationSeries>> {
        let raw = match self.source.read(source_id) {
            Ok(raw) => raw,
            Err(err) => return self.absorb(err),
        };
        let time = self.converter.convert(&raw.time, raw.ra, raw.dec)?;
        Ok(Some(raw.with_time(time)))
    }

    /// Reduce one source to binned curves for every configured band.
    ///
    /// Returns `Ok(None)` in best-effort mode when the source or its period
    /// is missing. Invalid configuration is always an error.
    pub fn reduce(
        &self,
        source_id: u64,
        period_override: PeriodOverride,
    ) -> ReduceResult<Option<ReducedLightCurve>> {
        self.options.validate()?;

        let Some(series) = self.corrected_series(source_id)? else {
            return Ok(None);
        };

        let ephemeris = match self.resolve_ephemeris(source_id, period_override, &series) {
            Ok(ephemeris) => ephemeris,
            Err(err) => return self.absorb(err),
        };
        log::info!(
            "reducing source {source_id} with period {} d and epoch {:?}",
            ephemeris.period,
            ephemeris.reference_epoch
        );

        let mut bands = BTreeMap::new();
        for band in &self.bands {
            let band_series = series.select_band(band);
            let mut options = self.options;
            // A band without usable samples stays an all-NaN grid.
            let has_valid = band_series
                .flux
                .iter()
                .zip(&band_series.flux_err)
                .any(|(&flux, &flux_err)| is_valid_sample(flux, flux_err));
            if !has_valid {
                options.normalization = None;
            }
            let curve = bin(
                &band_series.time,
                &band_series.flux,
                &band_series.flux_err,
                &ephemeris,
                &options,
            )?;
            log::debug!(
                "source {source_id} band {band:?}: {} observations, {} filled bins",
                band_series.time.len(),
                curve.n_filled()
            );
            bands.insert(band.clone(), curve);
        }

        let n_dropped = series
            .filter
            .iter()
            .filter(|filter| !self.bands.contains(filter))
            .count();
        if n_dropped > 0 {
            log::debug!("source {source_id}: dropped {n_dropped} observations of other bands");
        }

        Ok(Some(ReducedLightCurve {
            source_id,
            period: ephemeris.period,
            reference_epoch: ephemeris.reference_epoch.unwrap_or(f64::NAN),
            bands,
        }))
    }

    /// Explicit values win over the catalog; without any epoch the earliest
    /// time of the whole series is shared by all bands.
    fn resolve_ephemeris(
        &self,
        source_id: u64,
        period_override: PeriodOverride,
        series: &ObservationSeries,
    ) -> ReduceResult<Ephemeris> {
        let (period, catalog_epoch) = match period_override.period {
            Some(period) => (period, None),
            None => {
                let catalog = self.catalog.get()?;
                let record = catalog
                    .lookup(source_id)
                    .ok_or(ReduceError::NoPeriodAvailable(source_id))?;
                (record.per_day, Some(record.epo))
            }
        };

        let reference_epoch = period_override
            .reference_epoch
            .or(catalog_epoch)
            .unwrap_or_else(|| series.time.iter().copied().fold(f64::INFINITY, f64::min));

        let ephemeris = Ephemeris::new(period)
            .with_period_derivative(period_override.period_derivative.unwrap_or(0.0))
            .with_epoch(reference_epoch);
        ephemeris.validate()?;
        Ok(ephemeris)
    }

    fn absorb<T>(&self, err: ReduceError) -> ReduceResult<Option<T>> {
        if self.mode == Mode::BestEffort && err.is_missing_data() {
            log::warn!("skipping: {err}");
            return Ok(None);
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::Normalization;
    use crate::catalog::{BlsRecord, PeriodCatalog};
    use crate::stats::{compute_median, compute_min};
    use crate::time::{BarycentricScale, DateFormat, ExposureReference, Observatory};
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    struct MemorySource {
        series: HashMap<u64, ObservationSeries>,
    }

    impl SeriesSource for MemorySource {
        fn read(&self, source_id: u64) -> ReduceResult<ObservationSeries> {
            self.series
                .get(&source_id)
                .cloned()
                .ok_or(ReduceError::SourceNotFound(source_id))
        }
    }

    fn converter() -> TimeConverter {
        TimeConverter {
            format: DateFormat::Mjd,
            scale: BarycentricScale::Tdb,
            exposure_s: 30.0,
            exposure_reference: ExposureReference::Start,
            observatory: Observatory::of_site("geocenter").unwrap(),
        }
    }

    fn record(gid: u64, per_day: f64, epo: f64) -> BlsRecord {
        BlsRecord {
            gid,
            pow: 1.0,
            snr: 10.0,
            wid: 0.1,
            per_day,
            per_min: per_day * 1440.0,
            q: 0.05,
            phi0: 0.0,
            dphi: 0.01,
            epo,
        }
    }

    fn fixture() -> (MemorySource, CatalogCache) {
        let time: Vec<f64> = (0..40).map(|i| 60_000.0 + 0.137 * i as f64).collect();
        let flux: Vec<f64> = (0..40).map(|i| 100.0 + (i % 5) as f64).collect();
        let filter: Vec<String> = (0..40)
            .map(|i| ["c", "o", "o", "x"][i % 4].to_string())
            .collect();
        let series = ObservationSeries {
            flux_err: vec![2.0; time.len()],
            time,
            flux,
            filter,
            ra: 120.0,
            dec: -45.0,
        };

        let mut only_c = series.clone();
        only_c.filter = vec!["c".to_string(); only_c.len()];

        let source = MemorySource {
            series: HashMap::from([(1, series.clone()), (2, series), (3, only_c)]),
        };

        let mut catalog = PeriodCatalog::default();
        catalog.insert(record(1, 0.41, 60_000.05));
        catalog.insert(record(3, 0.41, 60_000.05));
        (source, CatalogCache::from_catalog(catalog))
    }

    fn options() -> BinOptions {
        BinOptions {
            num_bins: 20,
            num_cycles: 3,
            normalization: None,
        }
    }

    fn catalog_only() -> PeriodOverride {
        PeriodOverride::default()
    }

    fn new_reducer<'a>(
        source: &'a MemorySource,
        catalog: &'a CatalogCache,
        options: BinOptions,
        mode: Mode,
    ) -> Reducer<'a, MemorySource> {
        let bands = vec!["c".to_string(), "o".to_string()];
        Reducer::new(source, catalog, converter(), options, bands, mode)
    }

    #[test]
    fn reduces_every_band_with_catalog_period() {
        let (source, catalog) = fixture();
        let reducer = new_reducer(&source, &catalog, options(), Mode::Strict);

        let reduced = reducer.reduce(1, catalog_only()).unwrap().unwrap();
        assert_eq!(reduced.period, 0.41);
        assert_eq!(reduced.reference_epoch, 60_000.05);
        assert_eq!(reduced.bands.len(), 2);
        for curve in reduced.bands.values() {
            assert_eq!(curve.len(), 60);
            assert!(curve.n_filled() > 0);
        }
    }

    #[test]
    fn empty_band_is_kept_as_nan_grid() {
        let (source, catalog) = fixture();
        let reducer = new_reducer(&source, &catalog, options(), Mode::Strict);

        let reduced = reducer.reduce(3, catalog_only()).unwrap().unwrap();
        let orange = &reduced.bands["o"];
        assert_eq!(orange.len(), 60);
        assert_eq!(orange.n_filled(), 0);
        assert_abs_diff_eq!(orange.phase[20], 0.025, epsilon = 1e-15);
    }

    #[test]
    fn explicit_period_wins_and_epoch_defaults_to_first_time() {
        let (source, catalog) = fixture();
        let reducer = new_reducer(&source, &catalog, options(), Mode::Strict);

        let period_override = PeriodOverride {
            period: Some(0.3),
            ..PeriodOverride::default()
        };
        let reduced = reducer.reduce(1, period_override).unwrap().unwrap();
        assert_eq!(reduced.period, 0.3);

        let period_override = PeriodOverride {
            reference_epoch: Some(60_000.2),
            ..PeriodOverride::default()
        };
        let reduced = reducer.reduce(1, period_override).unwrap().unwrap();
        assert_eq!(reduced.period, 0.41);
        assert_eq!(reduced.reference_epoch, 60_000.2);

        let period_override = PeriodOverride {
            period: Some(0.3),
            ..PeriodOverride::default()
        };
        let reduced = reducer.reduce(2, period_override).unwrap().unwrap();

        let corrected = reducer.corrected_series(2).unwrap().unwrap();
        let first = compute_min(&corrected.time);
        assert_eq!(reduced.reference_epoch, first);
    }

    #[test]
    fn missing_data_depends_on_mode() {
        let (source, catalog) = fixture();
        let lenient = new_reducer(&source, &catalog, options(), Mode::BestEffort);
        assert!(lenient.reduce(99, catalog_only()).unwrap().is_none());
        assert!(lenient.reduce(2, catalog_only()).unwrap().is_none());

        let strict = new_reducer(&source, &catalog, options(), Mode::Strict);
        assert!(matches!(
            strict.reduce(99, catalog_only()),
            Err(ReduceError::SourceNotFound(99))
        ));
        assert!(matches!(
            strict.reduce(2, catalog_only()),
            Err(ReduceError::NoPeriodAvailable(2))
        ));
    }

    #[test]
    fn configuration_errors_are_never_absorbed() {
        let (source, catalog) = fixture();
        let bad_cycles = BinOptions {
            num_cycles: 4,
            ..options()
        };
        let reducer = new_reducer(&source, &catalog, bad_cycles, Mode::BestEffort);
        assert!(matches!(
            reducer.reduce(99, catalog_only()),
            Err(ReduceError::InvalidCycleCount(4))
        ));

        let reducer = new_reducer(&source, &catalog, options(), Mode::BestEffort);
        let period_override = PeriodOverride {
            period: Some(0.0),
            ..PeriodOverride::default()
        };
        assert!(matches!(
            reducer.reduce(1, period_override),
            Err(ReduceError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn normalized_bands_center_on_one() {
        let (source, catalog) = fixture();
        let normalized = BinOptions {
            normalization: Some(Normalization::Median),
            ..options()
        };
        let reducer = new_reducer(&source, &catalog, normalized, Mode::Strict);
        let reduced = reducer.reduce(1, catalog_only()).unwrap().unwrap();
        for curve in reduced.bands.values() {
            let finite: Vec<f64> = curve.flux[20..40]
                .iter()
                .copied()
                .filter(|val| val.is_finite())
                .collect();
            assert_abs_diff_eq!(compute_median(&finite), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_band_skips_normalization() {
        let (source, catalog) = fixture();
        let normalized = BinOptions {
            normalization: Some(Normalization::Max),
            ..options()
        };
        let reducer = new_reducer(&source, &catalog, normalized, Mode::Strict);
        let reduced = reducer.reduce(3, catalog_only()).unwrap().unwrap();
        assert_eq!(reduced.bands["o"].n_filled(), 0);
        let cyan = &reduced.bands["c"].flux;
        assert!(cyan.iter().all(|val| val.is_nan() || *val <= 1.0));
    }

    #[test]
    fn corrected_series_keeps_alignment() {
        let (source, catalog) = fixture();
        let reducer = new_reducer(&source, &catalog, options(), Mode::Strict);
        let raw = source.read(1).unwrap();
        let corrected = reducer.corrected_series(1).unwrap().unwrap();
        assert_eq!(corrected.len(), raw.len());
        assert_eq!(corrected.flux, raw.flux);
        assert_eq!(corrected.filter, raw.filter);
        assert!(corrected.time.iter().zip(&raw.time).all(|(c, r)| c != r));
    }
}
