use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::mercator::WEB_MERCATOR;
use crate::projection::Projection;
use crate::tmerc::{BRITISH_NATIONAL_GRID, IRISH_NATIONAL_GRID};
use crate::utm::{MAX_ZONE, MIN_ZONE, ZoneCache};

/// A read-only map from EPSG codes to projections.
///
/// Holds Web Mercator, the British and Irish national grids, and every UTM
/// zone from 1 to 60 (codes 32601 to 32660).
#[derive(Debug)]
pub struct Registry {
    projections: HashMap<u32, Arc<dyn Projection>>,
}

impl Registry {
    /// Builds a registry whose UTM zones come from a private [`ZoneCache`].
    pub fn new() -> Self {
        Self::with_zones(&ZoneCache::new())
    }

    /// Builds a registry sharing its UTM zones with `zones`.
    pub fn with_zones(zones: &ZoneCache) -> Self {
        let mut projections: HashMap<u32, Arc<dyn Projection>> = HashMap::new();
        let named: [Arc<dyn Projection>; 3] = [
            Arc::new(WEB_MERCATOR),
            Arc::new(BRITISH_NATIONAL_GRID.clone()),
            Arc::new(IRISH_NATIONAL_GRID.clone()),
        ];
        for p in named.into_iter().chain(
            (MIN_ZONE..=MAX_ZONE)
                .filter_map(|z| zones.get(z))
                .map(|tm| tm as Arc<dyn Projection>),
        ) {
            if let Some(code) = p.code() {
                projections.insert(code, p);
            }
        }
        Registry { projections }
    }

    /// The process-wide registry, built on first use.
    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(|| Registry::with_zones(ZoneCache::global()))
    }

    pub fn get(&self, code: u32) -> Option<Arc<dyn Projection>> {
        self.projections.get(&code).cloned()
    }

    pub fn contains(&self, code: u32) -> bool {
        self.projections.contains_key(&code)
    }

    pub fn codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.projections.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks up `code` in the process-wide registry.
pub fn projection(code: u32) -> Option<Arc<dyn Projection>> {
    Registry::global().get(code)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coord::{dms, rad};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_contents() {
        let registry = Registry::new();
        assert_eq!(registry.len(), 63);
        for code in [3857, 27700, 29903, 32601, 32632, 32660] {
            let p = registry.get(code).expect("registered");
            assert_eq!(p.code(), Some(code));
        }
        for code in [0, 4326, 32600, 32661, 32701] {
            assert!(registry.get(code).is_none());
            assert!(!registry.contains(code));
        }
        assert_eq!(registry.codes().filter(|c| (32601..=32660).contains(c)).count(), 60);
    }

    #[test]
    fn test_lookup_projects() {
        let bng = projection(27700).expect("EPSG:27700");
        let (e, n) = bng.forward(rad(dms(52.0, 39.0, 27.2531)), rad(dms(1.0, 43.0, 4.5177)));
        assert_abs_diff_eq!(e, 651409.903, epsilon = 1e-3);
        assert_abs_diff_eq!(n, 313177.270, epsilon = 1e-3);

        let web = projection(3857).expect("EPSG:3857");
        let (e, n) = web.forward(rad(47.374444), rad(8.541111));
        assert_abs_diff_eq!(e, 950792.127329, epsilon = 1e-4);
        assert_abs_diff_eq!(n, 6003408.475803, epsilon = 1e-3);
    }

    #[test]
    fn test_global_shares_zone_cache() {
        let from_registry = projection(32633).expect("EPSG:32633");
        let from_cache = ZoneCache::global().get(33).expect("zone 33");
        assert_eq!(from_registry.name(), from_cache.name());
        let p = Arc::as_ptr(&from_registry) as *const ();
        let q = Arc::as_ptr(&from_cache) as *const ();
        assert_eq!(p, q);
    }

    #[test]
    fn test_isolated_registries() {
        let zones = ZoneCache::new();
        let a = Registry::with_zones(&zones);
        let b = Registry::new();
        assert_eq!(zones.len(), 60);
        let pa = Arc::as_ptr(&a.get(32610).expect("zone 10")) as *const ();
        let pb = Arc::as_ptr(&b.get(32610).expect("zone 10")) as *const ();
        assert_ne!(pa, pb);
    }
}
