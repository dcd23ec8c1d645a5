use std::f64::consts::FRAC_PI_2;

use crate::projection::Projection;

/// EPSG:3857, WGS 84 / Pseudo-Mercator.
pub static WEB_MERCATOR: SphericalMercator = SphericalMercator::new(3857, 6378137.0);

/// A Mercator projection of a sphere of radius `r`.
///
/// The northing diverges at the poles: `forward` at `lat = -π/2` yields
/// negative infinity and callers must treat non-finite output as out of domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalMercator {
    code: u32,
    r: f64,
}

impl SphericalMercator {
    pub const fn new(code: u32, r: f64) -> Self {
        SphericalMercator { code, r }
    }

    pub const fn radius(&self) -> f64 {
        self.r
    }
}

impl Projection for SphericalMercator {
    fn code(&self) -> Option<u32> {
        Some(self.code)
    }

    fn name(&self) -> &str {
        "SphericalMercator"
    }

    fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let easting = self.r * lon;
        let northing = self.r * ((lat + FRAC_PI_2) / 2.0).tan().ln();
        (easting, northing)
    }

    fn reverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let lat = 2.0 * (northing / self.r).exp().atan() - FRAC_PI_2;
        let lon = easting / self.r;
        (lat, lon)
    }
}
