use std::fmt;

use crate::context::Context;
use crate::coord::{Bounds, Coord, Direction};
use crate::engine::{Engine, ErrnoScope, Geod, Ordinates, PjInfo};
use crate::errno::Errno;
use crate::error::ProjError;
use crate::native::Native;

/// A transformation object: a reference system, a conversion between two
/// systems, or a projection operation.
///
/// Every call locks the owning [`Context`]. Errors raised by the engine during
/// a call are reported by that call only; the object's error slot is put back
/// to its previous value afterwards.
///
/// ```
/// use approx::assert_abs_diff_eq;
/// use geoproj::Coord;
///
/// let pj = geoproj::new_crs_to_crs("EPSG:4326", "EPSG:3857", None).unwrap();
/// let c = pj.forward(Coord::new(47.374444, 8.541111, 408.0, 0.0)).unwrap();
/// assert_abs_diff_eq!(c.x(), 950792.127329, epsilon = 1e-3);
/// assert_abs_diff_eq!(c.y(), 6003408.475803, epsilon = 1e-3);
/// ```
pub struct Pj<E: Engine = Native> {
    context: Context<E>,
    handle: Option<E::Handle>,
}

impl<E: Engine> Pj<E> {
    pub(crate) fn new(context: Context<E>, handle: E::Handle) -> Self {
        Pj {
            context,
            handle: Some(handle),
        }
    }

    pub fn context(&self) -> &Context<E> {
        &self.context
    }

    pub(crate) fn handle(&self) -> Result<&E::Handle, ProjError> {
        self.handle.as_ref().ok_or(ProjError::Released)
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Runs `f` on the locked engine without touching the error slot.
    fn with_handle<R>(&self, f: impl FnOnce(&mut E, &E::Handle) -> R) -> Result<R, ProjError> {
        let handle = self.handle()?;
        let mut engine = self.context.lock();
        Ok(f(&mut engine, handle))
    }

    /// Runs `f` on the locked engine inside an [`ErrnoScope`]. A code raised in
    /// the scope or returned by `f` fails the call.
    fn call<R>(
        &self,
        f: impl FnOnce(&mut E, &E::Handle) -> Result<R, Errno>,
    ) -> Result<R, ProjError> {
        let handle = self.handle()?;
        let mut engine = self.context.lock();
        let mut scope = ErrnoScope::enter(&mut *engine, handle);
        let result = f(scope.engine(), handle);
        let errno = scope.errno();
        match result {
            Err(reported) if reported.is_err() => Err(scope.error(reported)),
            _ if errno.is_err() => Err(scope.error(errno)),
            Err(_) => Err(scope.error(Errno::COORD_TRANSFM)),
            Ok(out) => Ok(out),
        }
    }

    /// Transforms one coordinate.
    pub fn trans(&self, direction: Direction, coord: Coord) -> Result<Coord, ProjError> {
        self.call(|engine, handle| Ok(engine.trans(handle, direction, coord)))
    }

    pub fn forward(&self, coord: Coord) -> Result<Coord, ProjError> {
        self.trans(Direction::Forward, coord)
    }

    pub fn inverse(&self, coord: Coord) -> Result<Coord, ProjError> {
        self.trans(Direction::Inverse, coord)
    }

    /// Transforms `coords` in place.
    ///
    /// On error the contents of `coords` are unspecified: some coordinates may
    /// already have been overwritten.
    pub fn trans_array(&self, direction: Direction, coords: &mut [Coord]) -> Result<(), ProjError> {
        if coords.is_empty() {
            return Ok(());
        }
        self.call(|engine, handle| match engine.trans_array(handle, direction, coords) {
            Errno::NONE => Ok(()),
            errno => Err(errno),
        })
    }

    pub fn forward_array(&self, coords: &mut [Coord]) -> Result<(), ProjError> {
        self.trans_array(Direction::Forward, coords)
    }

    pub fn inverse_array(&self, coords: &mut [Coord]) -> Result<(), ProjError> {
        self.trans_array(Direction::Inverse, coords)
    }

    /// Transforms strided ordinates in place. Every point of every axis must
    /// be transformed for the call to succeed.
    pub fn trans_generic(
        &self,
        direction: Direction,
        ordinates: &mut Ordinates<'_>,
    ) -> Result<(), ProjError> {
        let expected = ordinates.len();
        let transformed =
            self.call(|engine, handle| Ok(engine.trans_generic(handle, direction, ordinates)))?;
        if transformed != expected {
            return Err(ProjError::Incomplete {
                expected,
                transformed,
            });
        }
        Ok(())
    }

    /// Transforms records of `stride` values packed in `buffer`.
    ///
    /// `x` and `y` are the first two values of each record. `z_index` and
    /// `m_index` locate the optional ordinates; absent ones are untouched.
    pub fn trans_flat_coords(
        &self,
        direction: Direction,
        buffer: &mut [f64],
        stride: usize,
        z_index: Option<usize>,
        m_index: Option<usize>,
    ) -> Result<(), ProjError> {
        if buffer.is_empty() {
            return Ok(());
        }
        let mut ordinates = Ordinates::from_flat(buffer, stride, z_index, m_index)?;
        if ordinates.is_empty() {
            return Ok(());
        }
        self.trans_generic(direction, &mut ordinates)
    }

    pub fn forward_flat_coords(
        &self,
        buffer: &mut [f64],
        stride: usize,
        z_index: Option<usize>,
        m_index: Option<usize>,
    ) -> Result<(), ProjError> {
        self.trans_flat_coords(Direction::Forward, buffer, stride, z_index, m_index)
    }

    pub fn inverse_flat_coords(
        &self,
        buffer: &mut [f64],
        stride: usize,
        z_index: Option<usize>,
        m_index: Option<usize>,
    ) -> Result<(), ProjError> {
        self.trans_flat_coords(Direction::Inverse, buffer, stride, z_index, m_index)
    }

    /// Transforms a rectangle, densifying each edge with `densify_points`
    /// extra samples, and returns the envelope of the result.
    pub fn trans_bounds(
        &self,
        direction: Direction,
        bounds: Bounds,
        densify_points: u32,
    ) -> Result<Bounds, ProjError> {
        self.call(|engine, handle| engine.trans_bounds(handle, direction, bounds, densify_points))
    }

    pub fn forward_bounds(&self, bounds: Bounds, densify_points: u32) -> Result<Bounds, ProjError> {
        self.trans_bounds(Direction::Forward, bounds, densify_points)
    }

    pub fn inverse_bounds(&self, bounds: Bounds, densify_points: u32) -> Result<Bounds, ProjError> {
        self.trans_bounds(Direction::Inverse, bounds, densify_points)
    }

    /// Transforms the first (up to four) values of `values` as one coordinate.
    pub fn trans_slice(&self, direction: Direction, values: &mut [f64]) -> Result<(), ProjError> {
        let n = values.len().min(4);
        let coord = self.trans(direction, Coord::from_slice(values))?;
        values[..n].copy_from_slice(&coord.0[..n]);
        Ok(())
    }

    pub fn forward_slice(&self, values: &mut [f64]) -> Result<(), ProjError> {
        self.trans_slice(Direction::Forward, values)
    }

    pub fn inverse_slice(&self, values: &mut [f64]) -> Result<(), ProjError> {
        self.trans_slice(Direction::Inverse, values)
    }

    /// Transforms each row as one coordinate. Rows are only written on success.
    pub fn trans_slices<S: AsMut<[f64]>>(
        &self,
        direction: Direction,
        rows: &mut [S],
    ) -> Result<(), ProjError> {
        let mut coords: Vec<Coord> = rows
            .iter_mut()
            .map(|row| Coord::from_slice(row.as_mut()))
            .collect();
        self.trans_array(direction, &mut coords)?;
        for (row, coord) in rows.iter_mut().zip(&coords) {
            let row = row.as_mut();
            let n = row.len().min(4);
            row[..n].copy_from_slice(&coord.0[..n]);
        }
        Ok(())
    }

    pub fn forward_slices<S: AsMut<[f64]>>(&self, rows: &mut [S]) -> Result<(), ProjError> {
        self.trans_slices(Direction::Forward, rows)
    }

    pub fn inverse_slices<S: AsMut<[f64]>>(&self, rows: &mut [S]) -> Result<(), ProjError> {
        self.trans_slices(Direction::Inverse, rows)
    }

    pub fn info(&self) -> Result<PjInfo, ProjError> {
        self.with_handle(|engine, handle| engine.info(handle))
    }

    pub fn is_crs(&self) -> Result<bool, ProjError> {
        self.with_handle(|engine, handle| engine.is_crs(handle))
    }

    /// Geodesic distance and azimuths between `a` and `b`, whose `x` is the
    /// longitude and `y` the latitude, both in radians.
    pub fn geod(&self, a: Coord, b: Coord) -> Result<Geod, ProjError> {
        self.with_handle(|engine, handle| engine.geod(handle, a, b))
    }

    /// Geodesic distance in metres.
    pub fn lp_dist(&self, a: Coord, b: Coord) -> Result<f64, ProjError> {
        self.with_handle(|engine, handle| engine.lp_dist(handle, a, b))
    }

    /// Geodesic distance combined with the difference in `z`.
    pub fn lpz_dist(&self, a: Coord, b: Coord) -> Result<f64, ProjError> {
        self.with_handle(|engine, handle| engine.lpz_dist(handle, a, b))
    }

    /// The operation used by the last transformation through this object.
    pub fn last_used_operation(&self) -> Result<Pj<E>, ProjError> {
        let handle = self.with_handle(|engine, handle| engine.last_used_operation(handle))??;
        Ok(Pj::new(self.context.clone(), handle))
    }

    /// An equivalent object taking and returning longitude before latitude
    /// and easting before northing.
    pub fn normalize_for_visualization(&self) -> Result<Pj<E>, ProjError> {
        let handle =
            self.with_handle(|engine, handle| engine.normalize_for_visualization(handle))??;
        Ok(Pj::new(self.context.clone(), handle))
    }

    /// Hands the engine resource back. Releasing twice does nothing; any
    /// later operation fails with [`ProjError::Released`].
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.context.lock().destroy(handle);
        }
    }
}

impl<E: Engine> Drop for Pj<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: Engine> fmt::Debug for Pj<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = self.info().map(|info| info.description).ok();
        f.debug_struct("Pj")
            .field("context", &self.context)
            .field("description", &description)
            .finish()
    }
}
