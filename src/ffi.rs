//! An [`Engine`] backed by the PROJ C library through `proj-sys`.

use libc::{c_char, c_int};
use std::ffi::{CStr, CString, NulError};
use std::mem::size_of;
use std::ptr::{self, NonNull};

use proj_sys::{
    PJ, PJ_AREA, PJ_CONTEXT, PJ_COORD, PJ_DIRECTION, PJ_DIRECTION_PJ_FWD, PJ_DIRECTION_PJ_IDENT,
    PJ_DIRECTION_PJ_INV, PJ_LOG_LEVEL, PJ_LOG_LEVEL_PJ_LOG_DEBUG, PJ_LOG_LEVEL_PJ_LOG_ERROR,
    PJ_LOG_LEVEL_PJ_LOG_NONE, PJ_LOG_LEVEL_PJ_LOG_TELL, PJ_LOG_LEVEL_PJ_LOG_TRACE,
};

use crate::coord::{Area, Bounds, Coord, Direction};
use crate::engine::{Axis, Engine, Geod, LogLevel, Ordinates, PjInfo, engine_error};
use crate::errno::Errno;
use crate::error::ProjError;

/// Copies a string owned by PROJ. Null pointers read as the empty string.
fn _string(raw_ptr: *const c_char) -> String {
    if raw_ptr.is_null() {
        return String::new();
    }
    // Safety: PROJ returns valid, nul-terminated strings that outlive this call.
    unsafe { CStr::from_ptr(raw_ptr) }
        .to_string_lossy()
        .into_owned()
}

/// A null-terminated array of C strings, as PROJ expects for option lists.
struct CStringArray {
    cstrings: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    fn new(strings: &[&str]) -> Result<Self, NulError> {
        let cstrings = strings
            .iter()
            .map(|s| CString::new(*s))
            .collect::<Result<Vec<_>, _>>()?;
        let ptrs = cstrings
            .iter()
            .map(|s| s.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();
        Ok(CStringArray { cstrings, ptrs })
    }

    fn len(&self) -> usize {
        self.cstrings.len()
    }

    /// The array, or null if it is empty.
    fn as_ptr(&self) -> *const *const c_char {
        if self.cstrings.is_empty() {
            ptr::null()
        } else {
            self.ptrs.as_ptr()
        }
    }
}

/// A PROJ area of use, destroyed when dropped.
struct AreaGuard(*mut PJ_AREA);

impl AreaGuard {
    fn new(area: Option<&Area>) -> Self {
        match area {
            None => AreaGuard(ptr::null_mut()),
            Some(area) => {
                // Safety: the area is created and filled before anyone reads it.
                unsafe {
                    let raw = proj_sys::proj_area_create();
                    proj_sys::proj_area_set_bbox(raw, area.west, area.south, area.east, area.north);
                    AreaGuard(raw)
                }
            }
        }
    }
}

impl Drop for AreaGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // Safety: the pointer came from `proj_area_create` and is destroyed once.
            unsafe { proj_sys::proj_area_destroy(self.0) };
        }
    }
}

fn pj_direction(direction: Direction) -> PJ_DIRECTION {
    match direction {
        Direction::Forward => PJ_DIRECTION_PJ_FWD,
        Direction::Identity => PJ_DIRECTION_PJ_IDENT,
        Direction::Inverse => PJ_DIRECTION_PJ_INV,
    }
}

fn pj_log_level(level: LogLevel) -> PJ_LOG_LEVEL {
    match level {
        LogLevel::None => PJ_LOG_LEVEL_PJ_LOG_NONE,
        LogLevel::Error => PJ_LOG_LEVEL_PJ_LOG_ERROR,
        LogLevel::Debug => PJ_LOG_LEVEL_PJ_LOG_DEBUG,
        LogLevel::Trace => PJ_LOG_LEVEL_PJ_LOG_TRACE,
        LogLevel::Tell => PJ_LOG_LEVEL_PJ_LOG_TELL,
    }
}

impl From<Coord> for PJ_COORD {
    fn from(coord: Coord) -> Self {
        PJ_COORD { v: coord.0 }
    }
}

impl From<PJ_COORD> for Coord {
    fn from(coord: PJ_COORD) -> Self {
        // Safety: every member of the union is plain `f64` data.
        Coord(unsafe { coord.v })
    }
}

/// A PROJ transformation object.
#[derive(Debug)]
pub struct ProjHandle(NonNull<PJ>);

// Safety: a `PJ` is only used while its owning context's lock is held.
unsafe impl Send for ProjHandle {}
unsafe impl Sync for ProjHandle {}

impl ProjHandle {
    fn as_ptr(&self) -> *mut PJ {
        self.0.as_ptr()
    }
}

/// A PROJ thread context.
#[derive(Debug)]
pub struct ProjEngine {
    ctx: NonNull<PJ_CONTEXT>,
    log_level: LogLevel,
}

// Safety: a PROJ context may move between threads as long as it is not used
// from two threads at once, which the owning `Context` lock guarantees.
unsafe impl Send for ProjEngine {}

impl ProjEngine {
    pub fn as_ptr(&self) -> *mut PJ_CONTEXT {
        self.ctx.as_ptr()
    }

    fn handle(&mut self, pj_ptr: *mut PJ) -> Result<ProjHandle, ProjError> {
        match NonNull::new(pj_ptr) {
            Some(pj) => Ok(ProjHandle(pj)),
            None => {
                let errno = self.context_errno();
                let errno = if errno.is_err() { errno } else { Errno::OTHER };
                Err(engine_error(self, errno))
            }
        }
    }
}

impl Drop for ProjEngine {
    fn drop(&mut self) {
        // Safety: the context is valid and every handle created from it holds
        // a clone of the owning `Context`, so none outlives it.
        unsafe { proj_sys::proj_context_destroy(self.ctx.as_ptr()) };
    }
}

impl Engine for ProjEngine {
    type Handle = ProjHandle;

    fn new() -> Self {
        // Safety: `proj_context_create` always returns a valid pointer to a thread context.
        let ctx = unsafe { proj_sys::proj_context_create() };
        debug_assert!(!ctx.is_null());
        let mut engine = ProjEngine {
            // Safety: see above.
            ctx: unsafe { NonNull::new_unchecked(ctx) },
            log_level: LogLevel::None,
        };
        engine.set_log_level(LogLevel::None);
        engine
    }

    fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
        unsafe { proj_sys::proj_log_level(self.as_ptr(), pj_log_level(level)) };
    }

    fn log_level(&self) -> LogLevel {
        self.log_level
    }

    fn set_search_paths(&mut self, paths: &[&str]) -> Result<(), ProjError> {
        let paths = CStringArray::new(paths)?;
        let count = c_int::try_from(paths.len())
            .map_err(|_| ProjError::InvalidArgument(format!("{} search paths", paths.len())))?;
        unsafe { proj_sys::proj_context_set_search_paths(self.as_ptr(), count, paths.as_ptr()) };
        Ok(())
    }

    fn context_errno(&self) -> Errno {
        Errno(unsafe { proj_sys::proj_context_errno(self.as_ptr()) })
    }

    fn errno_string(&self, errno: Errno) -> String {
        let raw = unsafe { proj_sys::proj_context_errno_string(self.as_ptr(), errno.0) };
        if raw.is_null() {
            errno.message()
        } else {
            _string(raw)
        }
    }

    fn create(&mut self, definition: &str) -> Result<ProjHandle, ProjError> {
        let definition = CString::new(definition)?;
        let pj_ptr = unsafe { proj_sys::proj_create(self.as_ptr(), definition.as_ptr()) };
        self.handle(pj_ptr)
    }

    fn create_argv(&mut self, args: &[&str]) -> Result<ProjHandle, ProjError> {
        let args = CStringArray::new(args)?;
        let argc = c_int::try_from(args.len())
            .map_err(|_| ProjError::InvalidArgument(format!("{} arguments", args.len())))?;
        // PROJ does not write through `argv` despite its signature.
        let pj_ptr = unsafe {
            proj_sys::proj_create_argv(self.as_ptr(), argc, args.ptrs.as_ptr() as *mut *mut c_char)
        };
        self.handle(pj_ptr)
    }

    fn create_crs_to_crs(
        &mut self,
        source_crs: &str,
        target_crs: &str,
        area: Option<&Area>,
    ) -> Result<ProjHandle, ProjError> {
        let source_crs = CString::new(source_crs)?;
        let target_crs = CString::new(target_crs)?;
        let area = AreaGuard::new(area);
        let pj_ptr = unsafe {
            proj_sys::proj_create_crs_to_crs(
                self.as_ptr(),
                source_crs.as_ptr(),
                target_crs.as_ptr(),
                area.0,
            )
        };
        self.handle(pj_ptr)
    }

    fn create_crs_to_crs_from_pj(
        &mut self,
        source: &ProjHandle,
        target: &ProjHandle,
        area: Option<&Area>,
        options: &[&str],
    ) -> Result<ProjHandle, ProjError> {
        let options = CStringArray::new(options)?;
        let area = AreaGuard::new(area);
        let pj_ptr = unsafe {
            proj_sys::proj_create_crs_to_crs_from_pj(
                self.as_ptr(),
                source.as_ptr(),
                target.as_ptr(),
                area.0,
                options.as_ptr(),
            )
        };
        self.handle(pj_ptr)
    }

    fn destroy(&mut self, handle: ProjHandle) {
        unsafe { proj_sys::proj_destroy(handle.as_ptr()) };
    }

    fn errno(&self, handle: &ProjHandle) -> Errno {
        Errno(unsafe { proj_sys::proj_errno(handle.as_ptr()) })
    }

    fn errno_reset(&mut self, handle: &ProjHandle) -> Errno {
        Errno(unsafe { proj_sys::proj_errno_reset(handle.as_ptr()) })
    }

    fn errno_restore(&mut self, handle: &ProjHandle, errno: Errno) {
        unsafe { proj_sys::proj_errno_restore(handle.as_ptr(), errno.0) };
    }

    fn trans(&mut self, handle: &ProjHandle, direction: Direction, coord: Coord) -> Coord {
        unsafe { proj_sys::proj_trans(handle.as_ptr(), pj_direction(direction), coord.into()) }
            .into()
    }

    fn trans_array(
        &mut self,
        handle: &ProjHandle,
        direction: Direction,
        coords: &mut [Coord],
    ) -> Errno {
        let mut pj_coords: Vec<PJ_COORD> = coords.iter().map(|&c| c.into()).collect();
        let errno = unsafe {
            proj_sys::proj_trans_array(
                handle.as_ptr(),
                pj_direction(direction),
                pj_coords.len(),
                pj_coords.as_mut_ptr(),
            )
        };
        for (coord, pj_coord) in coords.iter_mut().zip(pj_coords) {
            *coord = pj_coord.into();
        }
        Errno(errno)
    }

    fn trans_generic(
        &mut self,
        handle: &ProjHandle,
        direction: Direction,
        ordinates: &mut Ordinates<'_>,
    ) -> usize {
        let axes = *ordinates.axes();
        let base = ordinates.buffer_mut().as_mut_ptr();
        // Strides are in bytes. Every index an axis reaches was checked
        // against the buffer when `ordinates` was built.
        let axis = |a: &Axis| -> (*mut f64, usize, usize) {
            if a.count == 0 {
                (ptr::null_mut(), 0, 0)
            } else {
                (unsafe { base.add(a.offset) }, a.stride * size_of::<f64>(), a.count)
            }
        };
        let (x, sx, nx) = axis(&axes[0]);
        let (y, sy, ny) = axis(&axes[1]);
        let (z, sz, nz) = axis(&axes[2]);
        let (t, st, nt) = axis(&axes[3]);
        unsafe {
            proj_sys::proj_trans_generic(
                handle.as_ptr(),
                pj_direction(direction),
                x,
                sx,
                nx,
                y,
                sy,
                ny,
                z,
                sz,
                nz,
                t,
                st,
                nt,
            )
        }
    }

    fn trans_bounds(
        &mut self,
        handle: &ProjHandle,
        direction: Direction,
        bounds: Bounds,
        densify_points: u32,
    ) -> Result<Bounds, Errno> {
        let densify_points =
            c_int::try_from(densify_points).map_err(|_| Errno::INVALID_OP_ILLEGAL_ARG_VALUE)?;
        let mut out = Bounds::default();
        let ok = unsafe {
            proj_sys::proj_trans_bounds(
                self.as_ptr(),
                handle.as_ptr(),
                pj_direction(direction),
                bounds.xmin,
                bounds.ymin,
                bounds.xmax,
                bounds.ymax,
                &mut out.xmin,
                &mut out.ymin,
                &mut out.xmax,
                &mut out.ymax,
                densify_points,
            )
        };
        if ok != 0 {
            return Ok(out);
        }
        match self.errno(handle) {
            Errno::NONE => Err(Errno::COORD_TRANSFM),
            errno => Err(errno),
        }
    }

    fn info(&self, handle: &ProjHandle) -> PjInfo {
        let info = unsafe { proj_sys::proj_pj_info(handle.as_ptr()) };
        PjInfo {
            id: _string(info.id),
            description: _string(info.description),
            definition: _string(info.definition),
            has_inverse: info.has_inverse != 0,
            accuracy: info.accuracy,
        }
    }

    fn is_crs(&self, handle: &ProjHandle) -> bool {
        unsafe { proj_sys::proj_is_crs(handle.as_ptr()) != 0 }
    }

    fn geod(&self, handle: &ProjHandle, a: Coord, b: Coord) -> Geod {
        let g: Coord = unsafe { proj_sys::proj_geod(handle.as_ptr(), a.into(), b.into()) }.into();
        Geod {
            distance: g.x(),
            forward_azimuth: g.y(),
            reverse_azimuth: g.z(),
        }
    }

    fn lp_dist(&self, handle: &ProjHandle, a: Coord, b: Coord) -> f64 {
        unsafe { proj_sys::proj_lp_dist(handle.as_ptr(), a.into(), b.into()) }
    }

    fn lpz_dist(&self, handle: &ProjHandle, a: Coord, b: Coord) -> f64 {
        unsafe { proj_sys::proj_lpz_dist(handle.as_ptr(), a.into(), b.into()) }
    }

    fn last_used_operation(&mut self, handle: &ProjHandle) -> Result<ProjHandle, ProjError> {
        let pj_ptr = unsafe { proj_sys::proj_trans_get_last_used_operation(handle.as_ptr()) };
        self.handle(pj_ptr)
    }

    fn normalize_for_visualization(&mut self, handle: &ProjHandle) -> Result<ProjHandle, ProjError> {
        let pj_ptr =
            unsafe { proj_sys::proj_normalize_for_visualization(self.as_ptr(), handle.as_ptr()) };
        self.handle(pj_ptr)
    }
}
