//! Conversion of observation timestamps to barycentric time.

use crate::ephemeris::{
    GeodeticSite, SPEED_OF_LIGHT_AU_PER_DAY, Vec3, dot, earth_barycentric_position, geocentric_position,
    unit_vector,
};
use crate::error::{ReduceError, ReduceResult};
use hifitime::Epoch;
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const MJD_OFFSET: f64 = 2_400_000.5;

// IAU 2006 Resolution B3.
const L_B: f64 = 1.550_519_768e-8;
const TCB_T0_JD: f64 = 2_443_144.500_372_5;
const TDB0_S: f64 = -6.55e-5;

/// Numeric representation of a timestamp in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    Mjd,
    Jd,
}

impl DateFormat {
    fn days_to_mjd(self, days: f64) -> f64 {
        match self {
            DateFormat::Mjd => days,
            DateFormat::Jd => days - MJD_OFFSET,
        }
    }

    fn mjd_to_days(self, mjd: f64) -> f64 {
        match self {
            DateFormat::Mjd => mjd,
            DateFormat::Jd => mjd + MJD_OFFSET,
        }
    }
}

/// Barycentric time scale of the corrected timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarycentricScale {
    Tdb,
    Tcb,
}

/// Instant within the exposure that the raw timestamps record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureReference {
    Start,
    Mid,
}

/// Named observing site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observatory {
    pub name: &'static str,
    pub site: GeodeticSite,
}

const fn observatory(name: &'static str, lon_deg: f64, lat_deg: f64, height_m: f64) -> Observatory {
    Observatory {
        name,
        site: GeodeticSite {
            lon_deg,
            lat_deg,
            height_m,
        },
    }
}

const OBSERVATORIES: &[(&[&str], Observatory)] = &[
    (
        &["geocenter"],
        observatory("geocenter", 0.0, 0.0, -6_378_137.0),
    ),
    (
        &["haleakala", "atlas haleakala", "hko"],
        observatory("haleakala", -156.2571, 20.7082, 3055.0),
    ),
    (
        &["mauna loa", "atlas mauna loa", "mlo"],
        observatory("mauna loa", -155.5763, 19.5362, 3397.0),
    ),
    (
        &["sutherland", "saao", "atlas sutherland", "sth"],
        observatory("sutherland", 20.8107, -32.3794, 1798.0),
    ),
    (
        &["el sauce", "rio hurtado", "atlas el sauce", "chl"],
        observatory("el sauce", -70.7650, -30.4725, 1580.0),
    ),
    (
        &["teide", "atlas teide", "tdo"],
        observatory("teide", -16.5120, 28.3003, 2390.0),
    ),
    (
        &["palomar", "palomar observatory"],
        observatory("palomar", -116.8650, 33.3563, 1706.0),
    ),
    (
        &["kitt peak", "kpno"],
        observatory("kitt peak", -111.5967, 31.9583, 2120.0),
    ),
    (
        &["paranal", "cerro paranal"],
        observatory("paranal", -70.4042, -24.6272, 2635.0),
    ),
    (
        &["la silla"],
        observatory("la silla", -70.7300, -29.2567, 2347.0),
    ),
    (
        &["cerro pachon", "rubin", "lsst"],
        observatory("cerro pachon", -70.7494, -30.2446, 2647.0),
    ),
];

fn normalize_site_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Observatory {
    /// Resolve a site by name, ignoring case and `-`/`_`/space differences.
    pub fn of_site(name: &str) -> ReduceResult<Self> {
        let key = normalize_site_name(name);
        OBSERVATORIES
            .iter()
            .find(|(aliases, _)| aliases.iter().any(|alias| *alias == key))
            .map(|(_, obs)| *obs)
            .ok_or_else(|| ReduceError::UnknownObservatory(name.to_string()))
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        OBSERVATORIES.iter().map(|(_, obs)| obs.name)
    }
}

/// Sky position of a source in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra: f64,
    pub dec: f64,
}

impl SkyPosition {
    pub fn new(ra: f64, dec: f64) -> ReduceResult<Self> {
        let valid = (0.0..360.0).contains(&ra) && (-90.0..=90.0).contains(&dec);
        if !valid {
            return Err(ReduceError::InvalidCoordinate { ra, dec });
        }
        Ok(Self { ra, dec })
    }
}

/// Converts UTC timestamps of one instrument to barycentric time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConverter {
    pub format: DateFormat,
    pub scale: BarycentricScale,
    pub exposure_s: f64,
    pub exposure_reference: ExposureReference,
    pub observatory: Observatory,
}

impl TimeConverter {
    /// Offset in days added to the raw timestamps to reach mid-exposure.
    pub fn midpoint_offset(&self) -> f64 {
        match self.exposure_reference {
            ExposureReference::Start => 0.5 * self.exposure_s / SECONDS_PER_DAY,
            ExposureReference::Mid => 0.0,
        }
    }

    /// Convert every timestamp, preserving length and order.
    pub fn convert(&self, times: &[f64], ra: f64, dec: f64) -> ReduceResult<Vec<f64>> {
        let position = SkyPosition::new(ra, dec)?;
        let direction = unit_vector(position.ra, position.dec);
        let site = self.observatory.site.itrs_position()?;
        let midpoint_offset = self.midpoint_offset();

        let corrected = times
            .iter()
            .map(|&time| {
                let mjd_utc = self.format.days_to_mjd(time + midpoint_offset);
                let tdb = mjd_tdb(mjd_utc);
                let mjd_scaled = match self.scale {
                    BarycentricScale::Tdb => tdb,
                    BarycentricScale::Tcb => tdb + tcb_minus_tdb_days(tdb + MJD_OFFSET),
                };
                let light_travel = light_travel_time(mjd_utc, tdb, site, direction);
                self.format.mjd_to_days(mjd_scaled + light_travel)
            })
            .collect();

        Ok(corrected)
    }
}

/// UTC modified Julian date to TDB, leap seconds included.
fn mjd_tdb(mjd_utc: f64) -> f64 {
    Epoch::from_mjd_utc(mjd_utc).to_jde_tdb_days() - MJD_OFFSET
}

fn tcb_minus_tdb_days(jd_tdb: f64) -> f64 {
    L_B * (jd_tdb - TCB_T0_JD) - TDB0_S / SECONDS_PER_DAY
}

/// Rømer delay in days between the site and the solar-system barycenter.
fn light_travel_time(mjd_utc: f64, mjd_tdb: f64, site: Vec3, direction: Vec3) -> f64 {
    let earth = earth_barycentric_position(mjd_tdb + MJD_OFFSET);
    let site = geocentric_position(site, mjd_utc + MJD_OFFSET);
    let observer = std::array::from_fn(|axis| earth[axis] + site[axis]);
    dot(observer, direction) / SPEED_OF_LIGHT_AU_PER_DAY
}
