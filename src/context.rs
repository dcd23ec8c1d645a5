use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::coord::Area;
use crate::engine::{Engine, LogLevel};
use crate::errno::Errno;
use crate::error::ProjError;
use crate::native::Native;
use crate::pj::Pj;

/// A shared engine context.
///
/// Cloning is cheap: clones refer to the same engine, and every call on the
/// context or on a [`Pj`] created from it holds the engine's lock for its
/// whole duration. A context is therefore safe to use from several threads,
/// but calls through one context never run concurrently.
pub struct Context<E: Engine = Native> {
    engine: Arc<Mutex<E>>,
}

impl Context<Native> {
    /// Creates a context on a fresh [`Native`] engine.
    pub fn new() -> Self {
        Context::from_engine(Native::new())
    }
}

impl Default for Context<Native> {
    fn default() -> Self {
        Context::new()
    }
}

impl<E: Engine> Clone for Context<E> {
    fn clone(&self) -> Self {
        Context {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: Engine> fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id()).finish()
    }
}

impl<E: Engine> Context<E> {
    pub fn from_engine(engine: E) -> Self {
        Context {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Locks the engine. A panic while the lock was held leaves the engine
    /// usable, so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity of the underlying engine, used to order locks.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.engine) as *const () as usize
    }

    /// Whether `self` and `other` share one engine.
    pub fn same_context(&self, other: &Context<E>) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.lock().set_log_level(level);
    }

    pub fn log_level(&self) -> LogLevel {
        self.lock().log_level()
    }

    /// Sets the directories searched for auxiliary data files.
    pub fn set_search_paths(&self, paths: &[&str]) -> Result<(), ProjError> {
        self.lock().set_search_paths(paths)
    }

    /// The error code left by the last failed object creation on this context.
    pub fn errno(&self) -> Errno {
        self.lock().context_errno()
    }

    /// The engine's description of `errno`.
    pub fn errno_string(&self, errno: Errno) -> String {
        self.lock().errno_string(errno)
    }

    /// Creates a transformation object from a definition such as
    /// `"EPSG:4326"` or `"+proj=utm +zone=32 +ellps=intl"`.
    pub fn new_pj(&self, definition: &str) -> Result<Pj<E>, ProjError> {
        let handle = self.lock().create(definition)?;
        Ok(Pj::new(self.clone(), handle))
    }

    /// Creates a transformation object from separate `key=value` arguments.
    pub fn new_pj_from_args(&self, args: &[&str]) -> Result<Pj<E>, ProjError> {
        let handle = self.lock().create_argv(args)?;
        Ok(Pj::new(self.clone(), handle))
    }

    /// Creates a transformation from `source_crs` to `target_crs`, optionally
    /// restricted to operations valid within `area`.
    pub fn new_crs_to_crs(
        &self,
        source_crs: &str,
        target_crs: &str,
        area: Option<&Area>,
    ) -> Result<Pj<E>, ProjError> {
        let handle = self.lock().create_crs_to_crs(source_crs, target_crs, area)?;
        Ok(Pj::new(self.clone(), handle))
    }

    /// Creates a transformation between two existing reference system objects.
    ///
    /// `source` and `target` may belong to other contexts. Every context
    /// involved is locked, each once, in order of identity, so concurrent
    /// calls combining the same contexts cannot deadlock.
    pub fn new_crs_to_crs_from_pj(
        &self,
        source: &Pj<E>,
        target: &Pj<E>,
        area: Option<&Area>,
        options: &[&str],
    ) -> Result<Pj<E>, ProjError> {
        let mut others: Vec<&Context<E>> = [source.context(), target.context()]
            .into_iter()
            .filter(|c| !c.same_context(self))
            .collect();
        others.sort_by_key(|c| c.id());
        others.dedup_by_key(|c| c.id());
        let (lower, higher): (Vec<_>, Vec<_>) =
            others.into_iter().partition(|c| c.id() < self.id());

        let _lower: Vec<_> = lower.iter().map(|c| c.lock()).collect();
        let mut engine = self.lock();
        let _higher: Vec<_> = higher.iter().map(|c| c.lock()).collect();

        let handle =
            engine.create_crs_to_crs_from_pj(source.handle()?, target.handle()?, area, options)?;
        Ok(Pj::new(self.clone(), handle))
    }
}

static DEFAULT_CONTEXT: OnceLock<Context> = OnceLock::new();

/// The process-wide context behind the crate-level constructors.
pub fn default_context() -> &'static Context {
    DEFAULT_CONTEXT.get_or_init(Context::new)
}

/// [`Context::new_pj`] on the [`default_context`].
pub fn new(definition: &str) -> Result<Pj, ProjError> {
    default_context().new_pj(definition)
}

/// [`Context::new_pj_from_args`] on the [`default_context`].
pub fn new_from_args(args: &[&str]) -> Result<Pj, ProjError> {
    default_context().new_pj_from_args(args)
}

/// [`Context::new_crs_to_crs`] on the [`default_context`].
pub fn new_crs_to_crs(
    source_crs: &str,
    target_crs: &str,
    area: Option<&Area>,
) -> Result<Pj, ProjError> {
    default_context().new_crs_to_crs(source_crs, target_crs, area)
}

/// [`Context::new_crs_to_crs_from_pj`] on the [`default_context`].
pub fn new_crs_to_crs_from_pj(
    source: &Pj,
    target: &Pj,
    area: Option<&Area>,
    options: &[&str],
) -> Result<Pj, ProjError> {
    default_context().new_crs_to_crs_from_pj(source, target, area, options)
}

/// Sets the log level of the [`default_context`].
pub fn set_log_level(level: LogLevel) {
    default_context().set_log_level(level);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coord::Coord;
    use approx::assert_abs_diff_eq;
    use std::thread;

    #[test]
    fn test_clones_share_engine() {
        let a = Context::new();
        let b = a.clone();
        assert!(a.same_context(&b));
        assert_eq!(a.id(), b.id());
        assert!(!a.same_context(&Context::new()));

        b.set_log_level(LogLevel::Debug);
        assert_eq!(a.log_level(), LogLevel::Debug);
        a.set_search_paths(&["/tmp/proj"]).unwrap();
        assert_eq!(
            b.with_engine(|e| e.search_paths().to_vec()),
            vec!["/tmp/proj".to_string()]
        );
    }

    #[test]
    fn test_creation_errors() {
        let ctx = Context::new();
        assert_eq!(ctx.errno(), Errno::NONE);
        let err = ctx.new_pj("+proj=bogus").unwrap_err();
        assert_eq!(err.to_string(), "Invalid PROJ string syntax");
        assert_eq!(ctx.errno(), Errno::INVALID_OP_WRONG_SYNTAX);

        let err = ctx.new_pj_from_args(&[]).unwrap_err();
        assert_eq!(err.to_string(), "Missing argument");

        let err = ctx.new_crs_to_crs("EPSG:4326", "EPSG:2056", None).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::INVALID_OP_ILLEGAL_ARG_VALUE));

        assert!(matches!(
            ctx.new_pj("EPSG:4326\0"),
            Err(ProjError::Engine { .. })
        ));
        assert_eq!(ctx.errno_string(Errno(2049)), "Invalid coordinate");
    }

    #[test]
    fn test_crs_to_crs_with_area() {
        let ctx = Context::new();
        let area = Area::new(5.0, 45.0, 11.0, 48.0);
        let pj = ctx.new_crs_to_crs("EPSG:4326", "EPSG:32632", Some(&area)).unwrap();
        let c = pj.forward(Coord::xy(47.374444, 8.541111)).unwrap();
        assert_abs_diff_eq!(c.x(), 465355.583, epsilon = 1e-2);
        assert_abs_diff_eq!(c.y(), 5246979.603, epsilon = 1e-2);

        let bad = Area::new(5.0, 50.0, 11.0, 45.0);
        assert!(ctx.new_crs_to_crs("EPSG:4326", "EPSG:32632", Some(&bad)).is_err());
    }

    #[test]
    fn test_from_pj_across_contexts() {
        let a = Context::new();
        let b = Context::new();
        let source = a.new_pj("EPSG:4326").unwrap();
        let target = b.new_pj("EPSG:3857").unwrap();

        let pj = a.new_crs_to_crs_from_pj(&source, &target, None, &[]).unwrap();
        assert!(pj.context().same_context(&a));
        let pj = b.new_crs_to_crs_from_pj(&source, &target, None, &[]).unwrap();
        assert!(pj.context().same_context(&b));
        let c = Context::new();
        let pj = c.new_crs_to_crs_from_pj(&source, &source, None, &[]).unwrap();
        assert_eq!(pj.info().unwrap().accuracy, 0.0);
    }

    #[test]
    fn test_opposite_lock_orders_do_not_deadlock() {
        let a = Context::new();
        let b = Context::new();
        let wgs84 = a.new_pj("EPSG:4326").unwrap();
        let mercator = b.new_pj("EPSG:3857").unwrap();

        thread::scope(|s| {
            let forward = s.spawn(|| {
                for _ in 0..200 {
                    a.new_crs_to_crs_from_pj(&wgs84, &mercator, None, &[]).unwrap();
                }
            });
            let backward = s.spawn(|| {
                for _ in 0..200 {
                    b.new_crs_to_crs_from_pj(&mercator, &wgs84, None, &[]).unwrap();
                }
            });
            forward.join().unwrap();
            backward.join().unwrap();
        });
    }

    #[test]
    fn test_default_context() {
        assert!(default_context().same_context(default_context()));
        let pj = new_crs_to_crs("EPSG:4326", "EPSG:3857", None).unwrap();
        assert!(pj.context().same_context(default_context()));
        let utm = new_from_args(&["proj=utm", "zone=32", "ellps=intl"]).unwrap();
        assert!(!utm.is_crs().unwrap());
        let source = new("EPSG:4326").unwrap();
        let target = new("EPSG:27700").unwrap();
        let err = new_crs_to_crs_from_pj(&source, &target, None, &["ALLOW_BALLPARK=NO"]).unwrap_err();
        assert_eq!(err.to_string(), "No operation matching criteria found for coordinate");
    }
}
