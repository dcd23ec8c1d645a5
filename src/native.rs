//! A self-contained engine built on the projections in this crate.
//!
//! It understands `EPSG:<code>` for the reference systems below and a subset
//! of `+proj` strings (`utm`, `tmerc`, `webmerc`, `longlat`, `cart`).
//!
//! | code | system |
//! |---|---|
//! | 4326 | WGS 84, geographic `(lat, lon)` degrees |
//! | 4978 | WGS 84, geocentric |
//! | 4277, 4300, 4230 | OSGB36, TM75, ED50 geographic |
//! | 3857 | Web Mercator |
//! | 27700, 29903 | British and Irish national grids |
//! | 32601–32660 | UTM zones 1–60 (International 1924) |
//!
//! Systems on different ellipsoids are joined without a datum shift and the
//! resulting operations report an unknown accuracy.

mod definition;
mod object;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use log::{debug, error, trace};

use crate::coord::{Area, Bounds, Coord, Direction};
use crate::engine::{Engine, Geod, LogLevel, Ordinates, PjInfo, engine_error};
use crate::errno::Errno;
use crate::error::ProjError;
use crate::geodesic;
use crate::registry::Registry;
use crate::utm::ZoneCache;

use self::definition::Options;
use self::object::{Conversion, Object};

/// A transformation object of the [`Native`] engine.
#[derive(Debug)]
pub struct NativePj {
    object: Object,
    errno: AtomicI32,
    used: AtomicBool,
}

impl NativePj {
    fn new(object: Object) -> Self {
        NativePj {
            object,
            errno: AtomicI32::new(0),
            used: AtomicBool::new(false),
        }
    }

    fn fail(&self, errno: Errno) {
        self.errno.store(errno.0, Ordering::Relaxed);
    }
}

/// The pure-Rust engine context.
#[derive(Debug)]
pub struct Native {
    log_level: LogLevel,
    search_paths: Vec<String>,
    errno: Errno,
    registry: &'static Registry,
    zones: &'static ZoneCache,
}

impl Native {
    /// An engine resolving codes through `registry` instead of [`Registry::global`].
    pub fn with_registry(registry: &'static Registry) -> Self {
        Native {
            registry,
            ..<Native as Engine>::new()
        }
    }

    pub fn search_paths(&self) -> &[String] {
        &self.search_paths
    }

    /// Records a failed creation and builds its error.
    fn creation_failed(&mut self, errno: Errno, what: &str) -> ProjError {
        self.errno = errno;
        if self.log_level >= LogLevel::Error {
            error!("cannot create {what}: {}", errno.message());
        }
        engine_error(self, errno)
    }

    fn created(&self, object: Object) -> NativePj {
        if self.log_level >= LogLevel::Debug {
            debug!("created {}", object.info().description);
        }
        NativePj::new(object)
    }

    fn transform_failed(&self, handle: &NativePj, errno: Errno) {
        handle.fail(errno);
        if self.log_level >= LogLevel::Error {
            error!("{}: {}", handle.object.info().description, errno.message());
        }
    }

    fn transformed(&self, handle: &NativePj, direction: Direction, n: usize) {
        if direction != Direction::Identity {
            handle.used.store(true, Ordering::Relaxed);
        }
        if self.log_level >= LogLevel::Trace {
            trace!("transformed {n} coordinates ({direction:?})");
        }
    }
}

/// A conversion between two reference system objects, honouring `options`.
fn conversion_between(
    source: &Object,
    target: &Object,
    area: Option<&Area>,
    options: &[&str],
) -> Result<Conversion, Errno> {
    if let Some(area) = area {
        definition::check_area(area)?;
    }
    let options = Options::parse(options)?;
    let (Object::Crs(source), Object::Crs(target)) = (source, target) else {
        return Err(Errno::OTHER_API_MISUSE);
    };
    let conversion = Conversion {
        source: source.clone(),
        target: target.clone(),
    };
    if conversion.is_ballpark() && !options.permits_ballpark() {
        return Err(Errno::COORD_TRANSFM_NO_OPERATION);
    }
    Ok(conversion)
}

impl Engine for Native {
    type Handle = NativePj;

    fn new() -> Self {
        Native {
            log_level: LogLevel::None,
            search_paths: Vec::new(),
            errno: Errno::NONE,
            registry: Registry::global(),
            zones: ZoneCache::global(),
        }
    }

    fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    fn log_level(&self) -> LogLevel {
        self.log_level
    }

    fn set_search_paths(&mut self, paths: &[&str]) -> Result<(), ProjError> {
        self.search_paths = paths.iter().map(|p| p.to_string()).collect();
        if self.log_level >= LogLevel::Debug {
            debug!("search paths set to {:?}", self.search_paths);
        }
        Ok(())
    }

    fn context_errno(&self) -> Errno {
        self.errno
    }

    fn errno_string(&self, errno: Errno) -> String {
        errno.message()
    }

    fn create(&mut self, definition: &str) -> Result<NativePj, ProjError> {
        match definition::object(self.registry, self.zones, definition) {
            Ok(object) => Ok(self.created(object)),
            Err(errno) => Err(self.creation_failed(errno, definition)),
        }
    }

    fn create_argv(&mut self, args: &[&str]) -> Result<NativePj, ProjError> {
        match definition::object_from_args(self.zones, args) {
            Ok(object) => Ok(self.created(object)),
            Err(errno) => Err(self.creation_failed(errno, &args.join(" "))),
        }
    }

    fn create_crs_to_crs(
        &mut self,
        source_crs: &str,
        target_crs: &str,
        area: Option<&Area>,
    ) -> Result<NativePj, ProjError> {
        let conversion = area
            .map_or(Ok(()), definition::check_area)
            .and_then(|()| {
                Ok(Conversion {
                    source: definition::crs(self.registry, self.zones, source_crs)?,
                    target: definition::crs(self.registry, self.zones, target_crs)?,
                })
            });
        match conversion {
            Ok(conversion) => Ok(self.created(Object::Conversion(conversion))),
            Err(errno) => {
                Err(self.creation_failed(errno, &format!("{source_crs} to {target_crs}")))
            }
        }
    }

    fn create_crs_to_crs_from_pj(
        &mut self,
        source: &NativePj,
        target: &NativePj,
        area: Option<&Area>,
        options: &[&str],
    ) -> Result<NativePj, ProjError> {
        let conversion = conversion_between(&source.object, &target.object, area, options);
        match conversion {
            Ok(conversion) => Ok(self.created(Object::Conversion(conversion))),
            Err(errno) => Err(self.creation_failed(errno, "operation between two objects")),
        }
    }

    fn destroy(&mut self, handle: NativePj) {
        if self.log_level >= LogLevel::Debug {
            debug!("destroyed {}", handle.object.info().description);
        }
    }

    fn errno(&self, handle: &NativePj) -> Errno {
        Errno(handle.errno.load(Ordering::Relaxed))
    }

    fn errno_reset(&mut self, handle: &NativePj) -> Errno {
        Errno(handle.errno.swap(0, Ordering::Relaxed))
    }

    fn errno_restore(&mut self, handle: &NativePj, errno: Errno) {
        handle.errno.store(errno.0, Ordering::Relaxed);
    }

    fn trans(&mut self, handle: &NativePj, direction: Direction, coord: Coord) -> Coord {
        match handle.object.apply(direction, coord) {
            Ok(c) => {
                self.transformed(handle, direction, 1);
                c
            }
            Err(errno) => {
                self.transform_failed(handle, errno);
                Coord([f64::INFINITY; 4])
            }
        }
    }

    fn trans_array(&mut self, handle: &NativePj, direction: Direction, coords: &mut [Coord]) -> Errno {
        let mut last = Errno::NONE;
        for coord in coords.iter_mut() {
            match handle.object.apply(direction, *coord) {
                Ok(c) => *coord = c,
                Err(errno) => {
                    *coord = Coord([f64::INFINITY; 4]);
                    last = errno;
                }
            }
        }
        if last.is_err() {
            self.transform_failed(handle, last);
        } else {
            self.transformed(handle, direction, coords.len());
        }
        last
    }

    fn trans_generic(
        &mut self,
        handle: &NativePj,
        direction: Direction,
        ordinates: &mut Ordinates<'_>,
    ) -> usize {
        let n = ordinates.points();
        for i in 0..n {
            match handle.object.apply(direction, ordinates.get(i)) {
                Ok(c) => ordinates.set(i, c),
                Err(errno) => {
                    self.transform_failed(handle, errno);
                    return i;
                }
            }
        }
        self.transformed(handle, direction, n);
        n
    }

    fn trans_bounds(
        &mut self,
        handle: &NativePj,
        direction: Direction,
        bounds: Bounds,
        densify_points: u32,
    ) -> Result<Bounds, Errno> {
        let result = handle.object.apply_bounds(direction, bounds, densify_points);
        if let Err(errno) = result {
            self.transform_failed(handle, errno);
        }
        result
    }

    fn info(&self, handle: &NativePj) -> PjInfo {
        handle.object.info()
    }

    fn is_crs(&self, handle: &NativePj) -> bool {
        matches!(handle.object, Object::Crs(_))
    }

    fn geod(&self, handle: &NativePj, a: Coord, b: Coord) -> Geod {
        geodesic::inverse(handle.object.ellipsoid(), a.x(), a.y(), b.x(), b.y())
    }

    fn lp_dist(&self, handle: &NativePj, a: Coord, b: Coord) -> f64 {
        self.geod(handle, a, b).distance
    }

    fn lpz_dist(&self, handle: &NativePj, a: Coord, b: Coord) -> f64 {
        self.lp_dist(handle, a, b).hypot(b.z() - a.z())
    }

    fn last_used_operation(&mut self, handle: &NativePj) -> Result<NativePj, ProjError> {
        if handle.used.load(Ordering::Relaxed) {
            Ok(self.created(handle.object.clone()))
        } else {
            Err(self.creation_failed(Errno::OTHER_API_MISUSE, "last used operation"))
        }
    }

    fn normalize_for_visualization(&mut self, handle: &NativePj) -> Result<NativePj, ProjError> {
        match handle.object.normalized() {
            Some(object) => Ok(self.created(object)),
            None => Err(self.creation_failed(Errno::OTHER_API_MISUSE, "normalized operation")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_errno_slot() {
        let mut engine = Native::new();
        let pj = engine.create_crs_to_crs("EPSG:4326", "EPSG:3857", None).unwrap();
        assert_eq!(engine.errno(&pj), Errno::NONE);

        let out = engine.trans(&pj, Direction::Forward, Coord::xy(91.0, 0.0));
        assert!(out.x().is_infinite());
        assert_eq!(engine.errno(&pj), Errno::COORD_TRANSFM_INVALID_COORD);

        assert_eq!(engine.errno_reset(&pj), Errno::COORD_TRANSFM_INVALID_COORD);
        assert_eq!(engine.errno(&pj), Errno::NONE);
        engine.errno_restore(&pj, Errno(2050));
        assert_eq!(engine.errno(&pj), Errno(2050));
    }

    #[test]
    fn test_trans_array_marks_failures() {
        let mut engine = Native::new();
        let pj = engine.create_crs_to_crs("EPSG:4326", "EPSG:3857", None).unwrap();
        let mut coords = [Coord::xy(10.0, 10.0), Coord::xy(95.0, 0.0), Coord::xy(-20.0, 5.0)];
        assert_eq!(
            engine.trans_array(&pj, Direction::Forward, &mut coords),
            Errno::COORD_TRANSFM_INVALID_COORD
        );
        assert!(coords[0].x().is_finite());
        assert!(coords[1].x().is_infinite());
        assert!(coords[2].x().is_finite());
    }

    #[test]
    fn test_trans_generic_stops_at_first_failure() {
        let mut engine = Native::new();
        let pj = engine.create_crs_to_crs("EPSG:4326", "EPSG:3857", None).unwrap();
        let mut flat = [10.0, 10.0, 95.0, 0.0, 20.0, 20.0];
        let mut ords = Ordinates::from_flat(&mut flat, 2, None, None).unwrap();
        assert_eq!(engine.trans_generic(&pj, Direction::Forward, &mut ords), 1);
        assert_eq!(engine.errno(&pj), Errno::COORD_TRANSFM_INVALID_COORD);
        assert_eq!(&flat[2..], &[95.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn test_creation_errors_set_context_errno() {
        let mut engine = Native::new();
        let err = engine.create("+proj=pipeline +step +proj=utm +zone=32").unwrap_err();
        assert_eq!(err.to_string(), "Invalid PROJ string syntax");
        assert_eq!(engine.context_errno(), Errno::INVALID_OP_WRONG_SYNTAX);

        let err = engine.create_argv(&["proj=utm", "zone=0"]).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::INVALID_OP_ILLEGAL_ARG_VALUE));
        assert_eq!(engine.context_errno(), Errno::INVALID_OP_ILLEGAL_ARG_VALUE);
    }

    #[test]
    fn test_ballpark_options() {
        let mut engine = Native::new();
        let wgs84 = engine.create("EPSG:4326").unwrap();
        let osgb = engine.create("EPSG:27700").unwrap();
        let mercator = engine.create("EPSG:3857").unwrap();

        let pj = engine.create_crs_to_crs_from_pj(&wgs84, &osgb, None, &[]).unwrap();
        assert_eq!(engine.info(&pj).accuracy, -1.0);

        let err = engine
            .create_crs_to_crs_from_pj(&wgs84, &osgb, None, &["ALLOW_BALLPARK=NO"])
            .unwrap_err();
        assert_eq!(err.errno(), Some(Errno::COORD_TRANSFM_NO_OPERATION));

        let pj = engine
            .create_crs_to_crs_from_pj(&wgs84, &mercator, None, &["ALLOW_BALLPARK=NO", "AUTHORITY=EPSG"])
            .unwrap();
        assert_eq!(engine.info(&pj).accuracy, 0.0);

        let err = engine
            .create_crs_to_crs_from_pj(&pj, &mercator, None, &[])
            .unwrap_err();
        assert_eq!(err.errno(), Some(Errno::OTHER_API_MISUSE));
    }

    #[test]
    fn test_projection_operations() {
        let mut engine = Native::new();
        let utm = engine.create("+proj=utm +zone=32 +ellps=intl").unwrap();
        assert!(!engine.is_crs(&utm));
        let c = engine.trans(
            &utm,
            Direction::Forward,
            Coord::xy(8.541111, 47.374444).deg_to_rad(),
        );
        assert_abs_diff_eq!(c.x(), 465355.583, epsilon = 1e-2);
        assert_abs_diff_eq!(c.y(), 5246979.603, epsilon = 1e-2);
        let back = engine.trans(&utm, Direction::Inverse, c).rad_to_deg();
        assert_abs_diff_eq!(back.x(), 8.541111, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y(), 47.374444, epsilon = 1e-9);

        let info = engine.info(&utm);
        assert_eq!(info.id, "utm");
        assert_eq!(info.definition, "proj=utm zone=32 ellps=intl");
        assert!(info.has_inverse);

        assert!(engine.normalize_for_visualization(&utm).is_err());
    }

    #[test]
    fn test_cart() {
        let mut engine = Native::new();
        let cart = engine.create_argv(&["proj=cart", "ellps=WGS84"]).unwrap();
        let c = engine.trans(&cart, Direction::Forward, Coord::new(0.0, 0.0, 100.0, 0.0));
        assert_abs_diff_eq!(c.x(), 6378237.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.y(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.z(), 0.0, epsilon = 1e-6);
        let back = engine.trans(&cart, Direction::Inverse, c);
        assert_abs_diff_eq!(back.z(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_search_paths_and_log_level() {
        let mut engine = Native::new();
        assert_eq!(engine.log_level(), LogLevel::None);
        engine.set_log_level(LogLevel::Trace);
        assert_eq!(engine.log_level(), LogLevel::Trace);
        engine.set_search_paths(&["/usr/share/proj", "/opt/proj"]).unwrap();
        assert_eq!(engine.search_paths(), ["/usr/share/proj", "/opt/proj"]);
    }

    #[test]
    fn test_isolated_registry() {
        static REGISTRY: std::sync::OnceLock<Registry> = std::sync::OnceLock::new();
        let mut engine = Native::with_registry(REGISTRY.get_or_init(Registry::new));
        let pj = engine.create_crs_to_crs("EPSG:4326", "EPSG:32631", None).unwrap();
        let c = engine.trans(&pj, Direction::Forward, Coord::xy(0.0, 3.0));
        assert_abs_diff_eq!(c.x(), 500000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.y(), 0.0, epsilon = 1e-6);
    }
}
