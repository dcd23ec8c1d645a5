use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use log::debug;

use crate::coord::rad;
use crate::ellipsoid::INTERNATIONAL_1924;
use crate::tmerc::TransverseMercator;

/// Latitude band letters from 80°S northwards; `X` covers both 72–80°N and 80–84°N.
const LETTERS: &[u8; 21] = b"CDEFGHJKLMNPQRSTUVWXX";

pub const MIN_ZONE: u8 = 1;
pub const MAX_ZONE: u8 = 60;

/// EPSG codes of the zone projections are `CODE_BASE + zone`.
pub const CODE_BASE: u32 = 32600;

const MIN_LATITUDE: f64 = -80.0;
const MAX_LATITUDE: f64 = 84.0;

fn in_latitude_range(lat: f64) -> bool {
    (MIN_LATITUDE..MAX_LATITUDE).contains(&lat)
}

/// Returns the UTM zone for `lat` and `lon` in degrees, or `None` outside
/// 80°S..84°N or for a non-finite longitude.
///
/// Longitudes outside `[-180, 180)` are wrapped first. The Norway (56–64°N)
/// and Svalbard (72–84°N) exceptions override the regular 6° grid.
pub fn zone(lat: f64, lon: f64) -> Option<u8> {
    if !in_latitude_range(lat) || !lon.is_finite() {
        return None;
    }
    let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return Some(32);
    }
    if (72.0..84.0).contains(&lat) && (0.0..42.0).contains(&lon) {
        return Some(match lon {
            lon if lon < 9.0 => 31,
            lon if lon < 21.0 => 33,
            lon if lon < 33.0 => 35,
            _ => 37,
        });
    }
    // Wrapping can round -1e-15 up to exactly 180.
    let zone = ((lon + 180.0) / 6.0).floor() as u8 + 1;
    Some(zone.min(MAX_ZONE))
}

/// Returns the UTM latitude band letter for `lat` in degrees, or `None` outside 80°S..84°N.
pub fn letter(lat: f64, _lon: f64) -> Option<char> {
    if !in_latitude_range(lat) {
        return None;
    }
    let index = ((lat - MIN_LATITUDE) / 8.0).floor() as usize;
    LETTERS.get(index).map(|&b| char::from(b))
}

/// Builds the transverse Mercator projection for `zone`.
fn zone_projection(zone: u8) -> TransverseMercator {
    TransverseMercator::new(
        Some(CODE_BASE + u32::from(zone)),
        Cow::Owned(format!("UTM zone {zone}")),
        &INTERNATIONAL_1924,
        0.9996,
        0.0,
        rad(6.0 * f64::from(zone) - 183.0),
        500000.0,
        0.0,
    )
}

/// A read-through cache of UTM zone projections.
///
/// Zones are built on first use outside of any lock; concurrent first
/// requests may each build one, but only the first to publish is kept and
/// every caller receives that instance.
#[derive(Debug, Default)]
pub struct ZoneCache {
    zones: RwLock<HashMap<u8, Arc<TransverseMercator>>>,
}

impl ZoneCache {
    /// An empty cache, independent of [`ZoneCache::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> &'static ZoneCache {
        static CACHE: OnceLock<ZoneCache> = OnceLock::new();
        CACHE.get_or_init(ZoneCache::new)
    }

    /// Returns the projection for `zone`, or `None` unless `1 <= zone <= 60`.
    pub fn get(&self, zone: u8) -> Option<Arc<TransverseMercator>> {
        if !(MIN_ZONE..=MAX_ZONE).contains(&zone) {
            return None;
        }
        {
            let zones = self.zones.read().unwrap_or_else(|e| e.into_inner());
            if let Some(tm) = zones.get(&zone) {
                return Some(Arc::clone(tm));
            }
        }

        let built = Arc::new(zone_projection(zone));

        let mut zones = self.zones.write().unwrap_or_else(|e| e.into_inner());
        let published = zones.entry(zone).or_insert_with(|| {
            debug!("constructed UTM zone {zone} projection");
            built
        });
        Some(Arc::clone(published))
    }

    /// Number of zones built so far.
    pub fn len(&self) -> usize {
        self.zones.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns the projection for `zone` from the process-wide cache.
pub fn zone_transverse_mercator(zone: u8) -> Option<Arc<TransverseMercator>> {
    ZoneCache::global().get(zone)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::projection::Projection;
    use approx::assert_abs_diff_eq;
    use std::thread;

    #[test]
    fn test_zone_and_letter() {
        for &(lat, lon, z, l) in &[
            (-80.0, -180.0, 1, 'C'),
            (-73.0, -175.0, 1, 'C'),
            (-66.0, -170.0, 2, 'D'),
            (-59.0, -165.0, 3, 'E'),
            (-52.0, -160.0, 4, 'F'),
            (-45.0, -155.0, 5, 'G'),
            (-38.0, -150.0, 6, 'H'),
            (-31.0, -145.0, 6, 'J'),
            (-24.0, -140.0, 7, 'K'),
            (-17.0, -135.0, 8, 'K'),
            (-10.0, -130.0, 9, 'L'),
            (-3.0, -125.0, 10, 'M'),
            (4.0, -120.0, 11, 'N'),
            (11.0, -115.0, 11, 'P'),
            (18.0, -110.0, 12, 'Q'),
            (25.0, -105.0, 13, 'R'),
            (32.0, -100.0, 14, 'S'),
            (39.0, -95.0, 15, 'S'),
            (46.0, -90.0, 16, 'T'),
            (53.0, -85.0, 16, 'U'),
            (60.0, -80.0, 17, 'V'),
            (67.0, -75.0, 18, 'W'),
            (74.0, -70.0, 19, 'X'),
            (81.0, -65.0, 20, 'X'),
            // Norway
            (57.0, 1.0, 31, 'V'),
            (57.0, 2.0, 31, 'V'),
            (63.0, 2.0, 31, 'V'),
            (57.0, 4.0, 32, 'V'),
            (57.0, 11.0, 32, 'V'),
            (63.0, 4.0, 32, 'V'),
            (63.0, 11.0, 32, 'V'),
            // Svalbard
            (73.0, 1.0, 31, 'X'),
            (83.0, 8.0, 31, 'X'),
            (73.0, 10.0, 33, 'X'),
            (83.0, 20.0, 33, 'X'),
            (73.0, 22.0, 35, 'X'),
            (83.0, 32.0, 35, 'X'),
            (73.0, 34.0, 37, 'X'),
            (83.0, 41.0, 37, 'X'),
        ] {
            assert_eq!(zone(lat, lon), Some(z), "zone({lat}, {lon})");
            assert_eq!(letter(lat, lon), Some(l), "letter({lat}, {lon})");
        }
    }

    #[test]
    fn test_exception_bands() {
        assert_eq!(zone(58.0, 7.0), Some(32));
        assert_eq!(zone(76.0, 25.0), Some(35));
        assert_eq!(zone(50.0, 7.0), Some(32));
        assert_eq!(zone(50.0, 4.0), Some(31));
        // Half-open edges of the Norway band.
        assert_eq!(zone(56.0, 3.0), Some(32));
        assert_eq!(zone(64.0, 4.0), Some(31));
        assert_eq!(zone(60.0, 12.0), Some(33));
        // Svalbard starts at 72°N; below it the regular grid applies.
        assert_eq!(zone(71.9, 10.0), Some(32));
        assert_eq!(zone(72.0, 10.0), Some(33));
        assert_eq!(zone(72.0, 42.0), Some(38));
    }

    #[test]
    fn test_non_finite_longitude() {
        assert_eq!(zone(0.0, f64::NAN), None);
        assert_eq!(zone(0.0, f64::INFINITY), None);
        assert_eq!(zone(0.0, f64::NEG_INFINITY), None);
        assert_eq!(zone(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_total_coverage() {
        let mut lat = -80.0;
        while lat < 84.0 {
            let mut lon = -180.0;
            while lon < 180.0 {
                let z = zone(lat, lon).expect("in range");
                assert!((MIN_ZONE..=MAX_ZONE).contains(&z), "zone({lat}, {lon}) = {z}");
                assert!(letter(lat, lon).is_some());
                lon += 0.75;
            }
            lat += 0.5;
        }
        for lat in [-90.0, -80.000001, 84.0, 84.5, 90.0, f64::NAN] {
            assert_eq!(zone(lat, 0.0), None);
            assert_eq!(letter(lat, 0.0), None);
        }
    }

    #[test]
    fn test_longitude_wraps() {
        assert_eq!(zone(0.0, 180.0), Some(1));
        assert_eq!(zone(0.0, 183.0), Some(1));
        assert_eq!(zone(0.0, -181.0), Some(60));
        assert_eq!(zone(0.0, 179.999), Some(60));
    }

    #[test]
    fn test_zone_projection_parameters() {
        let cache = ZoneCache::new();
        assert!(cache.is_empty());
        assert!(cache.get(0).is_none());
        assert!(cache.get(61).is_none());

        let tm = cache.get(32).expect("zone 32");
        assert_eq!(tm.code(), Some(32632));
        assert_eq!(tm.name(), "UTM zone 32");
        assert_abs_diff_eq!(tm.central_meridian(), rad(9.0));
        assert_eq!(tm.scale_factor(), 0.9996);
        assert_eq!(tm.false_easting(), 500000.0);
        assert_eq!(tm.false_northing(), 0.0);
        assert_eq!(tm.ellipsoid(), &INTERNATIONAL_1924);
        assert!(Arc::ptr_eq(&tm, &cache.get(32).expect("zone 32")));
        assert_eq!(cache.len(), 1);

        assert_abs_diff_eq!(cache.get(1).expect("zone 1").central_meridian(), rad(-177.0));
        assert_abs_diff_eq!(cache.get(60).expect("zone 60").central_meridian(), rad(177.0));
    }

    #[test]
    fn test_zone_projection_round_trip() {
        let tm = zone_transverse_mercator(32).expect("zone 32");
        let (e, n) = tm.forward(rad(47.374444), rad(8.541111));
        assert_abs_diff_eq!(e, 465355.583, epsilon = 1e-2);
        assert_abs_diff_eq!(n, 5246979.603, epsilon = 1e-2);
        let (lat, lon) = tm.reverse(e, n);
        assert_abs_diff_eq!(lat, rad(47.374444), epsilon = 1e-9);
        assert_abs_diff_eq!(lon, rad(8.541111), epsilon = 1e-9);
    }

    #[test]
    fn test_concurrent_first_access_publishes_one_instance() {
        let cache = ZoneCache::new();
        let seen: Vec<Arc<TransverseMercator>> = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| cache.get(17).expect("zone 17")))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked"))
                .collect()
        });
        let first = &seen[0];
        for tm in &seen {
            assert!(Arc::ptr_eq(first, tm));
            assert_eq!(tm.central_meridian(), rad(-81.0));
            assert_eq!(tm.scale_factor(), 0.9996);
        }
        assert_eq!(cache.len(), 1);
    }
}
