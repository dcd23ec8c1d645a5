use std::fmt;

/// Upper bound on fixed-point iterations in [`Ellipsoid::polar`].
const MAX_ITERATIONS: usize = 64;

/// A biaxial reference ellipsoid.
///
/// Ellipsoids are immutable and are shared by reference: every projection
/// built on the Airy 1830 ellipsoid points at the same [`AIRY_1830`] static.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    name: &'static str,
    a: f64,
    b: f64,
    e2: f64,
    n: f64,
}

impl Ellipsoid {
    /// Creates an ellipsoid from its semi-major axis `a` and semi-minor axis `b`, in metres.
    ///
    /// # Panics
    ///
    /// Panics unless `a > b > 0`.
    pub const fn new(name: &'static str, a: f64, b: f64) -> Self {
        assert!(b > 0.0 && a > b, "an ellipsoid requires a > b > 0");
        Ellipsoid {
            name,
            a,
            b,
            e2: (a * a - b * b) / (a * a),
            n: (a - b) / (a + b),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Semi-major axis in metres.
    pub const fn semi_major_axis(&self) -> f64 {
        self.a
    }

    /// Semi-minor axis in metres.
    pub const fn semi_minor_axis(&self) -> f64 {
        self.b
    }

    /// First eccentricity squared, `(a² − b²) / a²`.
    pub const fn eccentricity_squared(&self) -> f64 {
        self.e2
    }

    /// Third flattening, `(a − b) / (a + b)`.
    pub const fn third_flattening(&self) -> f64 {
        self.n
    }

    /// Flattening, `(a − b) / a`.
    pub const fn flattening(&self) -> f64 {
        (self.a - self.b) / self.a
    }

    /// Prime vertical radius of curvature at geodetic latitude `lat` (radians).
    pub fn prime_vertical_radius(&self, lat: f64) -> f64 {
        let sin_lat = lat.sin();
        self.a / (1.0 - self.e2 * sin_lat * sin_lat).sqrt()
    }

    /// Converts geodetic `lat`, `lon` (radians) and ellipsoidal `height` (metres)
    /// to geocentric Cartesian `(x, y, z)` in metres.
    pub fn cartesian(&self, lat: f64, lon: f64, height: f64) -> (f64, f64, f64) {
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let v = self.a / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        let x = (v + height) * cos_lat * cos_lon;
        let y = (v + height) * cos_lat * sin_lon;
        let z = ((1.0 - self.e2) * v + height) * sin_lat;
        (x, y, z)
    }

    /// Converts geocentric Cartesian `(x, y, z)` to geodetic `(lat, lon, height)`.
    ///
    /// Latitude is found by fixed-point iteration until two successive
    /// estimates differ by less than `precision` radians. The iteration is
    /// capped; if `precision` cannot be reached the last estimate is returned.
    pub fn polar(&self, x: f64, y: f64, z: f64, precision: f64) -> (f64, f64, f64) {
        let lon = y.atan2(x);
        let p = x.hypot(y);
        let mut lat0 = z.atan2(p * (1.0 - self.e2));
        let mut lat = lat0;
        let mut v = self.prime_vertical_radius(lat0);
        for _ in 0..MAX_ITERATIONS {
            let sin_lat0 = lat0.sin();
            v = self.a / (1.0 - self.e2 * sin_lat0 * sin_lat0).sqrt();
            lat = (z + self.e2 * v * sin_lat0).atan2(p);
            if (lat - lat0).abs() < precision {
                break;
            }
            lat0 = lat;
        }
        let height = p / lat.cos() - v;
        (lat, lon, height)
    }
}

impl fmt::Display for Ellipsoid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub static AIRY_1830: Ellipsoid = Ellipsoid::new("Airy1830", 6377563.396, 6356256.909);

pub static AIRY_1830_MODIFIED: Ellipsoid =
    Ellipsoid::new("Airy1830Modified", 6377340.189, 6356034.447);

pub static INTERNATIONAL_1924: Ellipsoid =
    Ellipsoid::new("International1924", 6378388.000, 6356911.946);

/// Same axes as [`INTERNATIONAL_1924`], under its original name.
pub static HAYFORD_1909: Ellipsoid = Ellipsoid::new("Hayford1909", 6378388.000, 6356911.946);

pub static GRS80: Ellipsoid = Ellipsoid::new("GRS80", 6378137.000, 6356752.3141);

pub static WGS84: Ellipsoid = Ellipsoid::new("WGS84", 6378137.000, 6356752.3141);

#[cfg(test)]
mod test {
    use super::*;
    use crate::coord::{dms, rad};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_derived_parameters() {
        assert_abs_diff_eq!(WGS84.eccentricity_squared(), 0.00669438, epsilon = 1e-8);
        assert_abs_diff_eq!(WGS84.third_flattening(), 0.0016792204, epsilon = 1e-9);
        assert_abs_diff_eq!(WGS84.flattening(), 1.0 / 298.257223563, epsilon = 1e-10);
        assert_eq!(INTERNATIONAL_1924.semi_major_axis(), HAYFORD_1909.semi_major_axis());
        assert_eq!(AIRY_1830.to_string(), "Airy1830");
    }

    #[test]
    fn test_cartesian_and_polar() {
        // Worked example from the Ordnance Survey transformation guide.
        let lat = rad(dms(52.0, 39.0, 27.2531));
        let lon = rad(dms(1.0, 43.0, 4.5177));
        let (x, y, z) = AIRY_1830.cartesian(lat, lon, 24.700);
        assert_abs_diff_eq!(x, 3874938.849, epsilon = 1e-3);
        assert_abs_diff_eq!(y, 116218.624, epsilon = 1e-3);
        assert_abs_diff_eq!(z, 5047168.208, epsilon = 1e-3);

        let (phi, lambda, height) = AIRY_1830.polar(3874938.849, 116218.624, 5047168.208, 1e-10);
        assert_abs_diff_eq!(phi, lat, epsilon = 1e-9);
        assert_abs_diff_eq!(lambda, lon, epsilon = 1e-10);
        assert_abs_diff_eq!(height, 24.700, epsilon = 1e-3);
    }

    #[test]
    fn test_polar_inverts_cartesian() {
        for &(lat, lon, height) in &[
            (0.0, 0.0, 0.0),
            (45.0, -120.0, 1500.0),
            (-33.9, 151.2, 40.0),
            (89.5, 10.0, -20.0),
            (-67.0, -179.0, 3000.0),
        ] {
            let (x, y, z) = GRS80.cartesian(rad(lat), rad(lon), height);
            let (phi, lambda, h) = GRS80.polar(x, y, z, 1e-12);
            assert_abs_diff_eq!(phi, rad(lat), epsilon = 1e-11);
            assert_abs_diff_eq!(lambda, rad(lon), epsilon = 1e-11);
            assert_abs_diff_eq!(h, height, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_polar_terminates_with_unreachable_precision() {
        let (x, y, z) = WGS84.cartesian(rad(51.0), rad(-1.0), 100.0);
        let (phi, _, h) = WGS84.polar(x, y, z, 0.0);
        assert_abs_diff_eq!(phi, rad(51.0), epsilon = 1e-11);
        assert_abs_diff_eq!(h, 100.0, epsilon = 1e-4);
    }

    #[test]
    #[should_panic]
    fn test_new_rejects_inverted_axes() {
        let _ = Ellipsoid::new("broken", 6356752.0, 6378137.0);
    }
}
