//! Solar-system and site geometry for barycentric light-travel times.
//!
//! The Earth's barycentric position comes from the VSOP87E series (J2000
//! ecliptic) and the site position from the WGS84 ellipsoid. All returned
//! positions are equatorial (ICRS-aligned) in AU.

use crate::error::ReduceResult;
use marlu::LatLngHeight;
use std::f64::consts::TAU;
use vsop87::vsop87e;

/// Speed of light in AU per day.
pub const SPEED_OF_LIGHT_AU_PER_DAY: f64 = 173.144_632_674_240_34;

const AU_M: f64 = 149_597_870_700.0;
const J2000_JD: f64 = 2_451_545.0;
const OBLIQUITY_J2000_DEG: f64 = 23.439_291_1;

pub type Vec3 = [f64; 3];

fn ecliptic_to_equatorial([x, y, z]: Vec3) -> Vec3 {
    let (sin_eps, cos_eps) = OBLIQUITY_J2000_DEG.to_radians().sin_cos();
    [x, y * cos_eps - z * sin_eps, y * sin_eps + z * cos_eps]
}

/// Barycentric equatorial position of the Earth in AU at `jd_tdb`.
pub fn earth_barycentric_position(jd_tdb: f64) -> Vec3 {
    let earth = vsop87e::earth(jd_tdb);
    ecliptic_to_equatorial([earth.x, earth.y, earth.z])
}

/// Geodetic site on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticSite {
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub height_m: f64,
}

impl GeodeticSite {
    /// Earth-fixed cartesian position in meters.
    pub fn itrs_position(&self) -> ReduceResult<Vec3> {
        let lat_lng_height = LatLngHeight {
            longitude_rad: self.lon_deg.to_radians(),
            latitude_rad: self.lat_deg.to_radians(),
            height_metres: self.height_m,
        };
        let xyz = lat_lng_height.to_geocentric_wgs84();
        Ok([xyz.x, xyz.y, xyz.z])
    }
}

/// Rotate an Earth-fixed position in meters to a geocentric equatorial one in
/// AU at `jd_ut1`. Precession and nutation are neglected.
pub fn geocentric_position(itrs: Vec3, jd_ut1: f64) -> Vec3 {
    let [x, y, z] = itrs;
    let (sin_era, cos_era) = earth_rotation_angle(jd_ut1).sin_cos();
    [
        (x * cos_era - y * sin_era) / AU_M,
        (x * sin_era + y * cos_era) / AU_M,
        z / AU_M,
    ]
}

/// Earth rotation angle in radians.
pub fn earth_rotation_angle(jd_ut1: f64) -> f64 {
    let days = jd_ut1 - J2000_JD;
    let turns = 0.779_057_273_264_0 + 0.002_737_811_911_354_48 * days + days.fract();
    turns.rem_euclid(1.0) * TAU
}

/// Unit vector towards `(ra, dec)` in degrees.
pub fn unit_vector(ra_deg: f64, dec_deg: f64) -> Vec3 {
    let (sin_ra, cos_ra) = ra_deg.to_radians().sin_cos();
    let (sin_dec, cos_dec) = dec_deg.to_radians().sin_cos();
    [cos_dec * cos_ra, cos_dec * sin_ra, sin_dec]
}

pub fn dot(lhs: Vec3, rhs: Vec3) -> f64 {
    lhs.iter().zip(rhs.iter()).map(|(l, r)| l * r).sum()
}
