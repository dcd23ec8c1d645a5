use std::borrow::Cow;

use crate::coord::{dms, rad};
use crate::ellipsoid::{AIRY_1830, AIRY_1830_MODIFIED, Ellipsoid};
use crate::projection::Projection;

/// Upper bound on footpoint-latitude iterations in [`TransverseMercator::reverse`].
const MAX_ITERATIONS: usize = 64;

/// Footpoint iteration stops once the meridional arc is within this many metres.
const ARC_TOLERANCE: f64 = 1e-8;

/// EPSG:27700, OSGB 1936 / British National Grid.
pub static BRITISH_NATIONAL_GRID: TransverseMercator = TransverseMercator::new(
    Some(27700),
    Cow::Borrowed("NationalGrid"),
    &AIRY_1830,
    0.9996012717,
    rad(49.0),
    rad(-2.0),
    400000.0,
    -100000.0,
);

/// EPSG:29903, TM75 / Irish Grid.
pub static IRISH_NATIONAL_GRID: TransverseMercator = TransverseMercator::new(
    Some(29903),
    Cow::Borrowed("IrishNationalGrid"),
    &AIRY_1830_MODIFIED,
    1.000035,
    rad(dms(53.0, 30.0, 0.0)),
    rad(-8.0),
    200000.0,
    250000.0,
);

/// An ellipsoidal transverse Mercator projection (Redfearn series).
///
/// The series is truncated after the sixth-order terms, which is accurate to
/// the millimetre within a few degrees of the central meridian but is not
/// meant for global coverage.
#[derive(Clone, Debug, PartialEq)]
pub struct TransverseMercator {
    code: Option<u32>,
    name: Cow<'static, str>,
    ellipsoid: &'static Ellipsoid,
    /// Scale factor on the central meridian.
    f0: f64,
    /// Latitude of true origin.
    lat0: f64,
    /// Central meridian.
    lon0: f64,
    /// False easting.
    e0: f64,
    /// False northing.
    n0: f64,
}

impl TransverseMercator {
    /// Angles are in radians, offsets in metres.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        code: Option<u32>,
        name: Cow<'static, str>,
        ellipsoid: &'static Ellipsoid,
        scale_factor: f64,
        lat0: f64,
        lon0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        TransverseMercator {
            code,
            name,
            ellipsoid,
            f0: scale_factor,
            lat0,
            lon0,
            e0: false_easting,
            n0: false_northing,
        }
    }

    pub fn ellipsoid(&self) -> &'static Ellipsoid {
        self.ellipsoid
    }

    pub fn scale_factor(&self) -> f64 {
        self.f0
    }

    pub fn latitude_of_origin(&self) -> f64 {
        self.lat0
    }

    pub fn central_meridian(&self) -> f64 {
        self.lon0
    }

    pub fn false_easting(&self) -> f64 {
        self.e0
    }

    pub fn false_northing(&self) -> f64 {
        self.n0
    }

    /// Meridional arc from the latitude of origin to `lat`, scaled by `f0`.
    fn meridional_arc(&self, lat: f64) -> f64 {
        let n = self.ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n * n2;
        let dlat = lat - self.lat0;
        let slat = lat + self.lat0;
        self.ellipsoid.semi_minor_axis()
            * self.f0
            * ((1.0 + n + 5.0 * n2 / 4.0 + 5.0 * n3 / 4.0) * dlat
                - (3.0 * n + 3.0 * n2 + 21.0 * n3 / 8.0) * dlat.sin() * slat.cos()
                + (15.0 * n2 / 8.0 + 15.0 * n3 / 8.0) * (2.0 * dlat).sin() * (2.0 * slat).cos()
                - (35.0 * n3 / 24.0) * (3.0 * dlat).sin() * (3.0 * slat).cos())
    }

    /// Radii of curvature `(ν, ρ)` scaled by `f0`, and `η² = ν/ρ − 1`.
    fn curvature(&self, sin_lat: f64) -> (f64, f64, f64) {
        let a = self.ellipsoid.semi_major_axis();
        let e2 = self.ellipsoid.eccentricity_squared();
        let w = 1.0 - e2 * sin_lat * sin_lat;
        let nu = a * self.f0 / w.sqrt();
        let rho = a * self.f0 * (1.0 - e2) * w.powf(-1.5);
        (nu, rho, nu / rho - 1.0)
    }

    /// Latitude whose meridional arc matches `northing`.
    fn footpoint_latitude(&self, northing: f64) -> f64 {
        let af0 = self.ellipsoid.semi_major_axis() * self.f0;
        let target = northing - self.n0;
        let mut lat = target / af0 + self.lat0;
        for _ in 0..MAX_ITERATIONS {
            let residual = target - self.meridional_arc(lat);
            if residual.abs() < ARC_TOLERANCE {
                break;
            }
            lat += residual / af0;
        }
        lat
    }
}

impl Projection for TransverseMercator {
    fn code(&self) -> Option<u32> {
        self.code
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (nu, rho, eta2) = self.curvature(sin_lat);
        let cos2 = cos_lat * cos_lat;
        let cos4 = cos2 * cos2;
        let tan2 = lat.tan().powi(2);
        let tan4 = tan2 * tan2;

        let i = self.meridional_arc(lat) + self.n0;
        let ii = nu * sin_lat * cos_lat / 2.0;
        let iii = nu * sin_lat * cos_lat * cos2 * (5.0 - tan2 + 9.0 * eta2) / 24.0;
        let iiia = nu * sin_lat * cos_lat * cos4 * (61.0 - 58.0 * tan2 + tan4) / 720.0;
        let iv = nu * cos_lat;
        let v = nu * cos_lat * cos2 * (nu / rho - tan2) / 6.0;
        let vi = nu * cos_lat * cos4 * (5.0 - 18.0 * tan2 + tan4 + 14.0 * eta2 - 58.0 * tan2 * eta2)
            / 120.0;

        let dlon = lon - self.lon0;
        let dlon2 = dlon * dlon;
        let dlon4 = dlon2 * dlon2;
        let northing = i + ii * dlon2 + iii * dlon4 + iiia * dlon2 * dlon4;
        let easting = self.e0 + iv * dlon + v * dlon * dlon2 + vi * dlon * dlon4;
        (easting, northing)
    }

    fn reverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let lat1 = self.footpoint_latitude(northing);
        let (sin_lat1, cos_lat1) = lat1.sin_cos();
        let (nu, rho, eta2) = self.curvature(sin_lat1);
        let tan1 = lat1.tan();
        let tan2 = tan1 * tan1;
        let tan4 = tan2 * tan2;
        let nu2 = nu * nu;
        let nu4 = nu2 * nu2;
        let sec1 = 1.0 / cos_lat1;

        let vii = tan1 / (2.0 * rho * nu);
        let viii = tan1 * (5.0 + 3.0 * tan2 + eta2 - 9.0 * tan2 * eta2) / (24.0 * rho * nu * nu2);
        let ix = tan1 * (61.0 + 90.0 * tan2 + 45.0 * tan4) / (720.0 * rho * nu * nu4);
        let x = sec1 / nu;
        let xi = sec1 * (nu / rho + 2.0 * tan2) / (6.0 * nu * nu2);
        let xii = sec1 * (5.0 + 28.0 * tan2 + 24.0 * tan4) / (120.0 * nu * nu4);
        let xiia = sec1 * (61.0 + 662.0 * tan2 + 1320.0 * tan4 + 720.0 * tan2 * tan4)
            / (5040.0 * nu * nu2 * nu4);

        let de = easting - self.e0;
        let de2 = de * de;
        let de4 = de2 * de2;
        let lat = lat1 - vii * de2 + viii * de4 - ix * de2 * de4;
        let lon = self.lon0 + x * de - xi * de * de2 + xii * de * de4 - xiia * de * de2 * de4;
        (lat, lon)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_british_national_grid() {
        let lat = rad(dms(52.0, 39.0, 27.2531));
        let lon = rad(dms(1.0, 43.0, 4.5177));

        let (e, n) = BRITISH_NATIONAL_GRID.forward(lat, lon);
        assert_abs_diff_eq!(e, 651409.903, epsilon = 1e-3);
        assert_abs_diff_eq!(n, 313177.270, epsilon = 1e-3);

        let (phi, lambda) = BRITISH_NATIONAL_GRID.reverse(651409.903, 313177.270);
        assert_abs_diff_eq!(phi, lat, epsilon = 1e-10);
        assert_abs_diff_eq!(lambda, lon, epsilon = 1e-10);
    }

    #[test]
    fn test_irish_national_grid_round_trip() {
        // Dublin.
        let (lat, lon) = (rad(53.35), rad(-6.26));
        let (e, n) = IRISH_NATIONAL_GRID.forward(lat, lon);
        assert_abs_diff_eq!(e, 315855.479, epsilon = 1e-2);
        assert_abs_diff_eq!(n, 234718.930, epsilon = 1e-2);

        let (phi, lambda) = IRISH_NATIONAL_GRID.reverse(e, n);
        assert_abs_diff_eq!(phi, lat, epsilon = 1e-9);
        assert_abs_diff_eq!(lambda, lon, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip_across_zone_width() {
        for lat in [-60.0, -20.0, 0.0, 35.0, 70.0] {
            for dlon in [-3.0, -1.5, 0.0, 2.0, 3.0] {
                let (phi, lambda) = (rad(lat), rad(-2.0 + dlon));
                let (e, n) = BRITISH_NATIONAL_GRID.forward(phi, lambda);
                let (phi2, lambda2) = BRITISH_NATIONAL_GRID.reverse(e, n);
                assert_abs_diff_eq!(phi2, phi, epsilon = 1e-9);
                assert_abs_diff_eq!(lambda2, lambda, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_parameters() {
        assert_eq!(BRITISH_NATIONAL_GRID.code(), Some(27700));
        assert_eq!(BRITISH_NATIONAL_GRID.name(), "NationalGrid");
        assert_eq!(IRISH_NATIONAL_GRID.ellipsoid().name(), "Airy1830Modified");
        assert_abs_diff_eq!(IRISH_NATIONAL_GRID.latitude_of_origin(), rad(53.5));
    }
}
