//! WGS84 Universal Transverse Mercator projection.
//!
//! Series expansions from Snyder, *Map Projections: A Working Manual*
//! (USGS PP 1395), pp. 61-64. Accurate to well under a metre within a zone.

use crate::core_types::Vec3;
use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis (m)
const A: f64 = 6378137.0;
/// WGS84 flattening
const F: f64 = 1.0 / 298.257223563;
/// UTM central scale factor
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500000.0;
const FALSE_NORTHING_SOUTH: f64 = 10000000.0;

/// UTM zone number and hemisphere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// Zone containing `(lon, lat)` degrees; no Norway/Svalbard exceptions.
    #[must_use]
    pub fn containing(lon: f64, lat: f64) -> Self {
        let wrapped = (lon + 180.0).rem_euclid(360.0);
        let number = ((wrapped / 6.0).floor() as u8).min(59) + 1;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    /// Longitude of the zone's central meridian, radians.
    fn central_meridian(self) -> f64 {
        (f64::from(self.number) * 6.0 - 183.0).to_radians()
    }
}

/// Eccentricity squared and second eccentricity squared.
fn eccentricities() -> (f64, f64) {
    let b = A * (1.0 - F);
    let e2 = (A * A - b * b) / (A * A);
    let ep2 = (A * A - b * b) / (b * b);
    (e2, ep2)
}

/// Project `(lon, lat)` degrees to `(easting, northing)` metres in `zone`.
#[must_use]
pub fn lonlat_to_utm(lon: f64, lat: f64, zone: UtmZone) -> (f64, f64) {
    let (e2, ep2) = eccentricities();
    let phi = lat.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lon.to_radians() - zone.central_meridian());

    let m = A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * phi).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * phi).sin());

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if !zone.north {
        northing += FALSE_NORTHING_SOUTH;
    }
    (easting, northing)
}

/// Inverse of [`lonlat_to_utm`]: `(lon, lat)` degrees.
#[must_use]
pub fn utm_to_lonlat(easting: f64, northing: f64, zone: UtmZone) -> (f64, f64) {
    let (e2, ep2) = eccentricities();
    let x = easting - FALSE_EASTING;
    let y = if zone.north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let mu = y / K0 / (A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = phi1.tan();
    let n1 = A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let t1 = tan_phi1 * tan_phi1;
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = zone.central_meridian()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;
    (lon.to_degrees(), lat.to_degrees())
}

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLatBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LonLatBox {
    /// Projected south-west offset and extent relative to a reference origin.
    ///
    /// All corners are projected in the zone of the reference point, so the
    /// result is expressed in the same metric frame as the simulation domain.
    #[must_use]
    pub fn projected_from(&self, ref_lon: f64, ref_lat: f64) -> (Vec3, Vec3) {
        let zone = UtmZone::containing(ref_lon, ref_lat);
        let (x0, y0) = lonlat_to_utm(ref_lon, ref_lat, zone);
        let (xsw, ysw) = lonlat_to_utm(self.west, self.south, zone);
        let (xne, yne) = lonlat_to_utm(self.east, self.north, zone);
        (
            Vec3::new(xsw - x0, ysw - y0, 0.0),
            Vec3::new(xne - xsw, yne - ysw, 0.0),
        )
    }

    /// Metres per degree of longitude and latitude across the box.
    #[must_use]
    pub fn meters_per_degree(&self, ref_lon: f64, ref_lat: f64) -> (f64, f64) {
        let (_, extent) = self.projected_from(ref_lon, ref_lat);
        let dlon = self.east - self.west;
        let dlat = self.north - self.south;
        (
            if dlon.abs() > 0.0 { extent.x / dlon } else { 0.0 },
            if dlat.abs() > 0.0 { extent.y / dlat } else { 0.0 },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_zone_lookup() {
        assert_eq!(UtmZone::containing(12.49, 41.89), UtmZone { number: 33, north: true });
        assert_eq!(UtmZone::containing(-180.0, -10.0).number, 1);
        assert_eq!(UtmZone::containing(179.99, 0.0).number, 60);
        assert!(!UtmZone::containing(8.6, -41.7).north);
    }

    #[test]
    fn test_equator_on_central_meridian() {
        let zone = UtmZone { number: 33, north: true };
        let (e, n) = lonlat_to_utm(15.0, 0.0, zone);
        assert_abs_diff_eq!(e, 500000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(n, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_round_trip_within_zone() {
        for &(lon, lat) in &[(12.4924, 41.8902), (8.6192, 41.765), (147.3, -42.9), (-3.1, 5.5)] {
            let zone = UtmZone::containing(lon, lat);
            let (e, n) = lonlat_to_utm(lon, lat, zone);
            let (lon2, lat2) = utm_to_lonlat(e, n, zone);
            assert_abs_diff_eq!(lon2, lon, epsilon = 1e-6);
            assert_abs_diff_eq!(lat2, lat, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_meters_per_degree_near_equator() {
        let bbox = LonLatBox {
            west: 15.0,
            south: 0.0,
            east: 15.1,
            north: 0.1,
        };
        let (mx, my) = bbox.meters_per_degree(15.0, 0.0);
        // One degree is roughly 111 km at the equator, scaled by k0.
        assert!((mx - 111_276.0).abs() < 200.0, "mx = {mx}");
        assert!((my - 110_530.0).abs() < 200.0, "my = {my}");
    }
}
