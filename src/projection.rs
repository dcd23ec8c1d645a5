use std::fmt;

/// A closed-form map projection between geodetic and projected coordinates.
///
/// Implementations are pure functions of their stored parameters, so a single
/// instance can be used from any number of threads at once.
pub trait Projection: fmt::Debug + Send + Sync {
    /// The EPSG code this projection is registered under, if any.
    fn code(&self) -> Option<u32>;

    fn name(&self) -> &str;

    /// Projects latitude `lat` and longitude `lon` (radians) to `(easting, northing)` in metres.
    fn forward(&self, lat: f64, lon: f64) -> (f64, f64);

    /// Recovers `(lat, lon)` in radians from `easting` and `northing`.
    fn reverse(&self, easting: f64, northing: f64) -> (f64, f64);
}
