//! The narrow interface between [`Context`](crate::Context) / [`Pj`](crate::Pj)
//! and whatever computes the transformations.
//!
//! Every method is called with the owning context's lock held, so
//! implementations never see concurrent calls on the same engine instance.

use crate::coord::{Area, Bounds, Coord, Direction};
use crate::errno::Errno;
use crate::error::ProjError;

/// Engine log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    #[default]
    None,
    Error,
    Debug,
    Trace,
    Tell,
}

/// Metadata describing a transformation object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PjInfo {
    pub id: String,
    pub description: String,
    pub definition: String,
    pub has_inverse: bool,
    /// Expected accuracy in metres, or `-1.0` if unknown.
    pub accuracy: f64,
}

/// Result of the inverse geodesic problem.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Geod {
    /// Distance in metres.
    pub distance: f64,
    /// Azimuth at the first point, in degrees clockwise from north.
    pub forward_azimuth: f64,
    /// Azimuth of travel at the second point, in degrees clockwise from north.
    pub reverse_azimuth: f64,
}

/// Where one ordinate axis lives inside an [`Ordinates`] buffer.
///
/// `count == 0` means the axis is absent and reads as zero. `count == 1`
/// means a single value is used for every point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Axis {
    pub offset: usize,
    pub stride: usize,
    pub count: usize,
}

impl Axis {
    pub const ABSENT: Axis = Axis {
        offset: 0,
        stride: 0,
        count: 0,
    };

    pub const fn new(offset: usize, stride: usize, count: usize) -> Self {
        Axis {
            offset,
            stride,
            count,
        }
    }

    fn index(&self, i: usize) -> usize {
        if self.count == 1 {
            self.offset
        } else {
            self.offset + i * self.stride
        }
    }
}

/// Up to four strided ordinate axes sharing one mutable buffer.
///
/// Every index an axis can address is checked against the buffer when the
/// value is built, so engines can walk the axes without further checks.
#[derive(Debug)]
pub struct Ordinates<'a> {
    buffer: &'a mut [f64],
    axes: [Axis; 4],
}

impl<'a> Ordinates<'a> {
    /// Lays `x`, `y`, `z` and `m` over `buffer`.
    pub fn new(buffer: &'a mut [f64], axes: [Axis; 4]) -> Result<Self, ProjError> {
        for (name, axis) in ["x", "y", "z", "m"].iter().zip(&axes) {
            if axis.count == 0 {
                continue;
            }
            let last = axis
                .stride
                .checked_mul(axis.count - 1)
                .and_then(|span| span.checked_add(axis.offset));
            match last {
                Some(last) if last < buffer.len() => {}
                _ => {
                    return Err(ProjError::InvalidLayout(format!(
                        "{name} axis (offset {}, stride {}, count {}) overruns a buffer of {} values",
                        axis.offset,
                        axis.stride,
                        axis.count,
                        buffer.len()
                    )));
                }
            }
        }
        Ok(Ordinates { buffer, axes })
    }

    /// Interleaved records of `stride` values with `x` at 0 and `y` at 1.
    ///
    /// Trailing values that do not fill a whole record are left alone.
    pub fn from_flat(
        buffer: &'a mut [f64],
        stride: usize,
        z_index: Option<usize>,
        m_index: Option<usize>,
    ) -> Result<Self, ProjError> {
        if stride < 2 {
            return Err(ProjError::InvalidLayout(format!(
                "stride {stride} cannot hold x and y"
            )));
        }
        for (name, index) in [("z", z_index), ("m", m_index)] {
            if let Some(index) = index {
                if index < 2 || index >= stride {
                    return Err(ProjError::InvalidLayout(format!(
                        "{name} index {index} must lie in 2..{stride}"
                    )));
                }
            }
        }
        if z_index.is_some() && z_index == m_index {
            return Err(ProjError::InvalidLayout(
                "z and m indices must differ".to_string(),
            ));
        }
        let n = buffer.len() / stride;
        let axis = |index: Option<usize>| match index {
            Some(offset) => Axis::new(offset, stride, n),
            None => Axis::ABSENT,
        };
        Ordinates::new(
            buffer,
            [
                Axis::new(0, stride, n),
                Axis::new(1, stride, n),
                axis(z_index),
                axis(m_index),
            ],
        )
    }

    pub fn axes(&self) -> &[Axis; 4] {
        &self.axes
    }

    /// The largest axis count, i.e. the number of points a full transform covers.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.count).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of points every non-broadcast axis can supply.
    pub fn points(&self) -> usize {
        self.axes
            .iter()
            .filter(|a| a.count > 1)
            .map(|a| a.count)
            .min()
            .unwrap_or_else(|| self.len())
    }

    /// Reads point `i`; absent axes are zero.
    pub fn get(&self, i: usize) -> Coord {
        let mut coord = Coord::default();
        for (slot, axis) in coord.0.iter_mut().zip(&self.axes) {
            if axis.count > 0 {
                *slot = self.buffer[axis.index(i)];
            }
        }
        coord
    }

    /// Writes point `i` back to every axis that holds one value per point.
    pub fn set(&mut self, i: usize, coord: Coord) {
        let n = self.len();
        for (value, axis) in coord.0.iter().zip(&self.axes) {
            if axis.count > 0 && axis.count == n {
                self.buffer[axis.index(i)] = *value;
            }
        }
    }

    /// The underlying buffer, for engines that hand the layout to foreign code.
    pub fn buffer_mut(&mut self) -> &mut [f64] {
        &mut *self.buffer
    }
}

/// A projection engine: creates transformation objects and runs them.
///
/// Handles belong to the engine that created them, except that
/// [`Engine::create_crs_to_crs_from_pj`] may receive handles of other
/// instances of the same engine type whose contexts are locked too.
pub trait Engine: Send + 'static {
    type Handle: Send + Sync;

    /// Creates a fresh engine context with logging off.
    fn new() -> Self;

    fn set_log_level(&mut self, level: LogLevel);

    fn log_level(&self) -> LogLevel;

    fn set_search_paths(&mut self, paths: &[&str]) -> Result<(), ProjError>;

    /// The error code of the last failed object creation.
    fn context_errno(&self) -> Errno;

    fn errno_string(&self, errno: Errno) -> String;

    fn create(&mut self, definition: &str) -> Result<Self::Handle, ProjError>;

    fn create_argv(&mut self, args: &[&str]) -> Result<Self::Handle, ProjError>;

    fn create_crs_to_crs(
        &mut self,
        source_crs: &str,
        target_crs: &str,
        area: Option<&Area>,
    ) -> Result<Self::Handle, ProjError>;

    fn create_crs_to_crs_from_pj(
        &mut self,
        source: &Self::Handle,
        target: &Self::Handle,
        area: Option<&Area>,
        options: &[&str],
    ) -> Result<Self::Handle, ProjError>;

    fn destroy(&mut self, handle: Self::Handle);

    fn errno(&self, handle: &Self::Handle) -> Errno;

    /// Clears the handle's error slot and returns its previous value.
    fn errno_reset(&mut self, handle: &Self::Handle) -> Errno;

    fn errno_restore(&mut self, handle: &Self::Handle, errno: Errno);

    /// Transforms one coordinate, recording any failure in the handle's error slot.
    fn trans(&mut self, handle: &Self::Handle, direction: Direction, coord: Coord) -> Coord;

    /// Transforms `coords` in place and returns the last error encountered.
    fn trans_array(
        &mut self,
        handle: &Self::Handle,
        direction: Direction,
        coords: &mut [Coord],
    ) -> Errno;

    /// Transforms strided ordinates in place and returns how many points succeeded.
    fn trans_generic(
        &mut self,
        handle: &Self::Handle,
        direction: Direction,
        ordinates: &mut Ordinates<'_>,
    ) -> usize;

    fn trans_bounds(
        &mut self,
        handle: &Self::Handle,
        direction: Direction,
        bounds: Bounds,
        densify_points: u32,
    ) -> Result<Bounds, Errno>;

    fn info(&self, handle: &Self::Handle) -> PjInfo;

    fn is_crs(&self, handle: &Self::Handle) -> bool;

    /// Geodesic between `a` and `b`, given as longitude `x` and latitude `y` in radians.
    fn geod(&self, handle: &Self::Handle, a: Coord, b: Coord) -> Geod;

    fn lp_dist(&self, handle: &Self::Handle, a: Coord, b: Coord) -> f64;

    fn lpz_dist(&self, handle: &Self::Handle, a: Coord, b: Coord) -> f64;

    fn last_used_operation(&mut self, handle: &Self::Handle) -> Result<Self::Handle, ProjError>;

    fn normalize_for_visualization(
        &mut self,
        handle: &Self::Handle,
    ) -> Result<Self::Handle, ProjError>;
}

/// The error an engine reports for `errno`, described by the engine itself.
pub(crate) fn engine_error<E: Engine>(engine: &E, errno: Errno) -> ProjError {
    ProjError::Engine {
        errno,
        message: engine.errno_string(errno),
    }
}

/// Clears a handle's error slot for the duration of one engine call and puts
/// the previous value back when dropped.
pub(crate) struct ErrnoScope<'a, E: Engine> {
    engine: &'a mut E,
    handle: &'a E::Handle,
    saved: Errno,
}

impl<'a, E: Engine> ErrnoScope<'a, E> {
    pub fn enter(engine: &'a mut E, handle: &'a E::Handle) -> Self {
        let saved = engine.errno_reset(handle);
        ErrnoScope {
            engine,
            handle,
            saved,
        }
    }

    pub fn engine(&mut self) -> &mut E {
        &mut *self.engine
    }

    /// The code raised inside this scope so far.
    pub fn errno(&self) -> Errno {
        self.engine.errno(self.handle)
    }

    pub fn error(&self, errno: Errno) -> ProjError {
        engine_error(&*self.engine, errno)
    }
}

impl<E: Engine> Drop for ErrnoScope<'_, E> {
    fn drop(&mut self) {
        self.engine.errno_restore(self.handle, self.saved);
    }
}
