use std::f64::consts::PI;
use std::ops::{Index, IndexMut};

/// Converts `d` degrees, `m` minutes and `s` seconds to decimal degrees.
pub const fn dms(d: f64, m: f64, s: f64) -> f64 {
    d + m / 60.0 + s / 3600.0
}

/// Converts degrees to radians.
pub const fn rad(x: f64) -> f64 {
    PI * x / 180.0
}

/// Converts radians to degrees.
pub const fn deg(x: f64) -> f64 {
    180.0 * x / PI
}

/// The direction in which a transformation is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Identity,
    Inverse,
}

/// A four-ordinate coordinate `(x, y, z, m)`.
///
/// Ordinates are positional: whether `x` holds a latitude, a longitude or an
/// easting is decided by the axis order of the reference system the
/// coordinate is expressed in. Unused trailing ordinates are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coord(pub [f64; 4]);

impl Coord {
    pub const fn new(x: f64, y: f64, z: f64, m: f64) -> Self {
        Coord([x, y, z, m])
    }

    /// A coordinate with only its first two ordinates set.
    pub const fn xy(x: f64, y: f64) -> Self {
        Coord([x, y, 0.0, 0.0])
    }

    /// Copies up to four leading values of `values`; missing ordinates are zero.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut coord = Coord::default();
        let n = values.len().min(4);
        coord.0[..n].copy_from_slice(&values[..n]);
        coord
    }

    pub const fn x(&self) -> f64 {
        self.0[0]
    }

    pub const fn y(&self) -> f64 {
        self.0[1]
    }

    pub const fn z(&self) -> f64 {
        self.0[2]
    }

    pub const fn m(&self) -> f64 {
        self.0[3]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }

    /// Converts the first two ordinates from degrees to radians.
    pub fn deg_to_rad(self) -> Self {
        Coord([rad(self.0[0]), rad(self.0[1]), self.0[2], self.0[3]])
    }

    /// Converts the first two ordinates from radians to degrees.
    pub fn rad_to_deg(self) -> Self {
        Coord([deg(self.0[0]), deg(self.0[1]), self.0[2], self.0[3]])
    }
}

impl From<[f64; 4]> for Coord {
    fn from(values: [f64; 4]) -> Self {
        Coord(values)
    }
}

impl From<Coord> for [f64; 4] {
    fn from(coord: Coord) -> Self {
        coord.0
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Coord::xy(x, y)
    }
}

impl From<(f64, f64, f64)> for Coord {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Coord::new(x, y, z, 0.0)
    }
}

impl Index<usize> for Coord {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Coord {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

/// Copies each row into a [`Coord`], keeping at most four leading values.
pub fn coords_from_slices<S: AsRef<[f64]>>(rows: &[S]) -> Vec<Coord> {
    rows.iter().map(|row| Coord::from_slice(row.as_ref())).collect()
}

/// Views each coordinate as a mutable `[f64]` row. The rows alias `coords`.
pub fn coords_as_slices(coords: &mut [Coord]) -> Vec<&mut [f64]> {
    coords.iter_mut().map(Coord::as_mut_slice).collect()
}

/// An axis-aligned rectangle in the units of some reference system.
///
/// `xmin > xmax` is a legal input (for example a box crossing the antimeridian).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Bounds {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// A geographic area of use, in degrees, used to select among candidate operations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Area {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Area {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Area {
            west,
            south,
            east,
            north,
        }
    }
}
