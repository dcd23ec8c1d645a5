use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::coord::{Bounds, Coord, Direction, deg, rad};
use crate::ellipsoid::Ellipsoid;
use crate::engine::PjInfo;
use crate::errno::Errno;
use crate::projection::Projection;

/// Convergence threshold, in radians, for geocentric to geodetic conversion.
const POLAR_PRECISION: f64 = 1e-12;

/// How coordinates of a reference system relate to geodetic positions.
#[derive(Clone)]
pub(crate) enum Kind {
    Geographic,
    Geocentric,
    Projected(Arc<dyn Projection>),
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Geographic => f.write_str("Geographic"),
            Kind::Geocentric => f.write_str("Geocentric"),
            Kind::Projected(p) => f.debug_tuple("Projected").field(&p.name()).finish(),
        }
    }
}

fn same_figure(a: &Ellipsoid, b: &Ellipsoid) -> bool {
    a.semi_major_axis() == b.semi_major_axis() && a.semi_minor_axis() == b.semi_minor_axis()
}

fn finite(c: &Coord) -> bool {
    c.x().is_finite() && c.y().is_finite()
}

/// A coordinate reference system. Geographic ordinates are in degrees.
#[derive(Clone, Debug)]
pub(crate) struct Crs {
    pub code: Option<u32>,
    pub name: Cow<'static, str>,
    pub kind: Kind,
    pub ellipsoid: &'static Ellipsoid,
    /// Geographic ordinates come as `(lat, lon)` rather than `(lon, lat)`.
    pub lat_first: bool,
}

impl Crs {
    pub fn geographic(code: u32, name: &'static str, ellipsoid: &'static Ellipsoid) -> Self {
        Crs {
            code: Some(code),
            name: Cow::Borrowed(name),
            kind: Kind::Geographic,
            ellipsoid,
            lat_first: true,
        }
    }

    pub fn normalized(&self) -> Self {
        Crs {
            lat_first: false,
            ..self.clone()
        }
    }

    /// Converts to `(lon, lat, h, m)` with angles in radians.
    fn to_geodetic(&self, c: Coord) -> Result<Coord, Errno> {
        if !finite(&c) {
            return Err(Errno::COORD_TRANSFM_INVALID_COORD);
        }
        match &self.kind {
            Kind::Geographic => {
                let (lat, lon) = if self.lat_first { (c.x(), c.y()) } else { (c.y(), c.x()) };
                if lat.abs() > 90.0 {
                    return Err(Errno::COORD_TRANSFM_INVALID_COORD);
                }
                Ok(Coord::new(rad(lon), rad(lat), c.z(), c.m()))
            }
            Kind::Geocentric => {
                let (lat, lon, h) = self.ellipsoid.polar(c.x(), c.y(), c.z(), POLAR_PRECISION);
                Ok(Coord::new(lon, lat, h, c.m()))
            }
            Kind::Projected(p) => {
                let (lat, lon) = p.reverse(c.x(), c.y());
                let g = Coord::new(lon, lat, c.z(), c.m());
                if finite(&g) {
                    Ok(g)
                } else {
                    Err(Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN)
                }
            }
        }
    }

    fn from_geodetic(&self, g: Coord) -> Result<Coord, Errno> {
        let (lon, lat) = (g.x(), g.y());
        let c = match &self.kind {
            Kind::Geographic => {
                let (lat, lon) = (deg(lat), deg(lon));
                if self.lat_first {
                    Coord::new(lat, lon, g.z(), g.m())
                } else {
                    Coord::new(lon, lat, g.z(), g.m())
                }
            }
            Kind::Geocentric => {
                let (x, y, z) = self.ellipsoid.cartesian(lat, lon, g.z());
                Coord::new(x, y, z, g.m())
            }
            Kind::Projected(p) => {
                let (e, n) = p.forward(lat, lon);
                Coord::new(e, n, g.z(), g.m())
            }
        };
        if finite(&c) {
            Ok(c)
        } else {
            Err(Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN)
        }
    }

    fn info(&self) -> PjInfo {
        PjInfo {
            id: String::new(),
            description: self.name.to_string(),
            definition: String::new(),
            has_inverse: false,
            accuracy: -1.0,
        }
    }
}

/// A conversion between two reference systems through geodetic coordinates.
///
/// Systems on different ellipsoids are joined without a datum shift; such a
/// conversion is only a ballpark.
#[derive(Clone, Debug)]
pub(crate) struct Conversion {
    pub source: Crs,
    pub target: Crs,
}

impl Conversion {
    pub fn is_ballpark(&self) -> bool {
        !same_figure(self.source.ellipsoid, self.target.ellipsoid)
    }

    fn apply(&self, direction: Direction, c: Coord) -> Result<Coord, Errno> {
        match direction {
            Direction::Forward => self.target.from_geodetic(self.source.to_geodetic(c)?),
            Direction::Inverse => self.source.from_geodetic(self.target.to_geodetic(c)?),
            Direction::Identity => Ok(c),
        }
    }

    fn info(&self) -> PjInfo {
        let (description, accuracy) = if self.is_ballpark() {
            (
                format!("Ballpark geographic offset from {} to {}", self.source.name, self.target.name),
                -1.0,
            )
        } else {
            (
                format!("Conversion from {} to {}", self.source.name, self.target.name),
                0.0,
            )
        };
        PjInfo {
            id: String::new(),
            description,
            definition: String::new(),
            has_inverse: true,
            accuracy,
        }
    }
}

/// An operation built from a `+proj` definition; its geodetic side is `(lon, lat)` in radians.
#[derive(Clone, Debug)]
pub(crate) struct Operation {
    pub id: &'static str,
    pub definition: String,
    pub kind: Kind,
    pub ellipsoid: &'static Ellipsoid,
}

impl Operation {
    fn forward(&self, c: Coord) -> Result<Coord, Errno> {
        let (lon, lat) = (c.x(), c.y());
        if !finite(&c) || lat.abs() > std::f64::consts::FRAC_PI_2 {
            return Err(Errno::COORD_TRANSFM_INVALID_COORD);
        }
        let out = match &self.kind {
            Kind::Geographic => c,
            Kind::Geocentric => {
                let (x, y, z) = self.ellipsoid.cartesian(lat, lon, c.z());
                Coord::new(x, y, z, c.m())
            }
            Kind::Projected(p) => {
                let (e, n) = p.forward(lat, lon);
                Coord::new(e, n, c.z(), c.m())
            }
        };
        if finite(&out) {
            Ok(out)
        } else {
            Err(Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN)
        }
    }

    fn inverse(&self, c: Coord) -> Result<Coord, Errno> {
        if !finite(&c) {
            return Err(Errno::COORD_TRANSFM_INVALID_COORD);
        }
        let out = match &self.kind {
            Kind::Geographic => c,
            Kind::Geocentric => {
                let (lat, lon, h) = self.ellipsoid.polar(c.x(), c.y(), c.z(), POLAR_PRECISION);
                Coord::new(lon, lat, h, c.m())
            }
            Kind::Projected(p) => {
                let (lat, lon) = p.reverse(c.x(), c.y());
                Coord::new(lon, lat, c.z(), c.m())
            }
        };
        if finite(&out) {
            Ok(out)
        } else {
            Err(Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN)
        }
    }

    fn description(&self) -> &'static str {
        match self.id {
            "utm" => "Universal Transverse Mercator (UTM)",
            "tmerc" => "Transverse Mercator",
            "webmerc" => "Web Mercator / Pseudo Mercator",
            "cart" => "Geodetic/cartesian conversions",
            _ => "Lat/long (Geodetic alias)",
        }
    }

    fn info(&self) -> PjInfo {
        PjInfo {
            id: self.id.to_string(),
            description: self.description().to_string(),
            definition: self.definition.clone(),
            has_inverse: true,
            accuracy: -1.0,
        }
    }
}

/// Anything a native handle can stand for.
#[derive(Clone, Debug)]
pub(crate) enum Object {
    Crs(Crs),
    Conversion(Conversion),
    Operation(Operation),
}

impl Object {
    /// Transforms one coordinate without touching any error slot.
    pub fn apply(&self, direction: Direction, c: Coord) -> Result<Coord, Errno> {
        if direction == Direction::Identity {
            return Ok(c);
        }
        match self {
            Object::Crs(_) => Err(Errno::OTHER_API_MISUSE),
            Object::Conversion(conversion) => conversion.apply(direction, c),
            Object::Operation(op) => match direction {
                Direction::Forward => op.forward(c),
                _ => op.inverse(c),
            },
        }
    }

    /// Envelope of `bounds` after densifying each edge with `densify_points` samples.
    pub fn apply_bounds(
        &self,
        direction: Direction,
        bounds: Bounds,
        densify_points: u32,
    ) -> Result<Bounds, Errno> {
        if let Object::Crs(_) = self {
            return Err(Errno::OTHER_API_MISUSE);
        }
        let corners = [
            (bounds.xmin, bounds.ymin),
            (bounds.xmax, bounds.ymin),
            (bounds.xmax, bounds.ymax),
            (bounds.xmin, bounds.ymax),
        ];
        let steps = f64::from(densify_points) + 1.0;
        let mut envelope: Option<Bounds> = None;
        let mut last = Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN;
        for (i, &(x0, y0)) in corners.iter().enumerate() {
            let (x1, y1) = corners[(i + 1) % corners.len()];
            for k in 0..=densify_points {
                let t = f64::from(k) / steps;
                let sample = Coord::xy(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
                match self.apply(direction, sample) {
                    Ok(c) => {
                        let e = envelope.get_or_insert(Bounds::new(c.x(), c.y(), c.x(), c.y()));
                        e.xmin = e.xmin.min(c.x());
                        e.ymin = e.ymin.min(c.y());
                        e.xmax = e.xmax.max(c.x());
                        e.ymax = e.ymax.max(c.y());
                    }
                    Err(errno) => last = errno,
                }
            }
        }
        envelope.ok_or(last)
    }

    pub fn ellipsoid(&self) -> &'static Ellipsoid {
        match self {
            Object::Crs(crs) => crs.ellipsoid,
            Object::Conversion(conversion) => conversion.source.ellipsoid,
            Object::Operation(op) => op.ellipsoid,
        }
    }

    pub fn info(&self) -> PjInfo {
        match self {
            Object::Crs(crs) => crs.info(),
            Object::Conversion(conversion) => conversion.info(),
            Object::Operation(op) => op.info(),
        }
    }

    /// The same object with longitude-first geographic axes, if it has any axes to swap.
    pub fn normalized(&self) -> Option<Object> {
        match self {
            Object::Crs(crs) => Some(Object::Crs(crs.normalized())),
            Object::Conversion(conversion) => Some(Object::Conversion(Conversion {
                source: conversion.source.normalized(),
                target: conversion.target.normalized(),
            })),
            Object::Operation(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ellipsoid::{AIRY_1830, WGS84};
    use crate::mercator::WEB_MERCATOR;
    use crate::tmerc::BRITISH_NATIONAL_GRID;
    use approx::assert_abs_diff_eq;

    fn web_mercator() -> Crs {
        Crs {
            code: Some(3857),
            name: Cow::Borrowed("WGS 84 / Pseudo-Mercator"),
            kind: Kind::Projected(Arc::new(WEB_MERCATOR)),
            ellipsoid: &WGS84,
            lat_first: false,
        }
    }

    #[test]
    fn test_conversion_round_trip() {
        let conversion = Conversion {
            source: Crs::geographic(4326, "WGS 84", &WGS84),
            target: web_mercator(),
        };
        assert!(!conversion.is_ballpark());
        let zurich = Coord::new(47.374444, 8.541111, 408.0, 0.0);
        let c = conversion.apply(Direction::Forward, zurich).unwrap();
        assert_abs_diff_eq!(c.x(), 950792.127329, epsilon = 1e-4);
        assert_abs_diff_eq!(c.y(), 6003408.475803, epsilon = 1e-3);
        assert_eq!(c.z(), 408.0);
        let back = conversion.apply(Direction::Inverse, c).unwrap();
        assert_abs_diff_eq!(back.x(), zurich.x(), epsilon = 1e-9);
        assert_abs_diff_eq!(back.y(), zurich.y(), epsilon = 1e-9);
        assert_eq!(conversion.apply(Direction::Identity, zurich), Ok(zurich));
    }

    #[test]
    fn test_domain_errors() {
        let conversion = Conversion {
            source: Crs::geographic(4326, "WGS 84", &WGS84),
            target: web_mercator(),
        };
        assert_eq!(
            conversion.apply(Direction::Forward, Coord::xy(91.0, 0.0)),
            Err(Errno::COORD_TRANSFM_INVALID_COORD)
        );
        assert_eq!(
            conversion.apply(Direction::Forward, Coord::xy(-90.0, 0.0)),
            Err(Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN)
        );
        assert_eq!(
            conversion.apply(Direction::Inverse, Coord::xy(f64::NAN, 0.0)),
            Err(Errno::COORD_TRANSFM_INVALID_COORD)
        );
        let crs = Object::Crs(Crs::geographic(4326, "WGS 84", &WGS84));
        assert_eq!(crs.apply(Direction::Forward, Coord::default()), Err(Errno::OTHER_API_MISUSE));
    }

    #[test]
    fn test_geocentric() {
        let geocentric = Crs {
            code: Some(4978),
            name: Cow::Borrowed("WGS 84"),
            kind: Kind::Geocentric,
            ellipsoid: &WGS84,
            lat_first: false,
        };
        let conversion = Conversion {
            source: Crs::geographic(4326, "WGS 84", &WGS84),
            target: geocentric,
        };
        let c = conversion.apply(Direction::Forward, Coord::new(0.0, 90.0, 0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(c.x(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.y(), WGS84.semi_major_axis(), epsilon = 1e-6);
        assert_abs_diff_eq!(c.z(), 0.0, epsilon = 1e-6);
        let back = conversion.apply(Direction::Inverse, c).unwrap();
        assert_abs_diff_eq!(back.x(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y(), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(back.z(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ballpark_info() {
        let conversion = Conversion {
            source: Crs::geographic(4326, "WGS 84", &WGS84),
            target: Crs {
                code: Some(27700),
                name: Cow::Borrowed("OSGB36 / British National Grid"),
                kind: Kind::Projected(Arc::new(BRITISH_NATIONAL_GRID.clone())),
                ellipsoid: &AIRY_1830,
                lat_first: false,
            },
        };
        assert!(conversion.is_ballpark());
        let info = Object::Conversion(conversion).info();
        assert_eq!(
            info.description,
            "Ballpark geographic offset from WGS 84 to OSGB36 / British National Grid"
        );
        assert_eq!(info.accuracy, -1.0);
        assert!(info.has_inverse);
    }

    #[test]
    fn test_bounds_envelope() {
        let object = Object::Conversion(Conversion {
            source: Crs::geographic(4326, "WGS 84", &WGS84),
            target: web_mercator(),
        });
        let b = object
            .apply_bounds(Direction::Forward, Bounds::new(-10.0, -20.0, 10.0, 20.0), 3)
            .unwrap();
        let (e0, n0) = WEB_MERCATOR.forward(rad(-10.0), rad(-20.0));
        let (e1, n1) = WEB_MERCATOR.forward(rad(10.0), rad(20.0));
        assert_abs_diff_eq!(b.xmin, e0, epsilon = 1e-6);
        assert_abs_diff_eq!(b.ymin, n0, epsilon = 1e-6);
        assert_abs_diff_eq!(b.xmax, e1, epsilon = 1e-6);
        assert_abs_diff_eq!(b.ymax, n1, epsilon = 1e-6);

        assert_eq!(
            object.apply_bounds(Direction::Forward, Bounds::new(91.0, 0.0, 95.0, 1.0), 0),
            Err(Errno::COORD_TRANSFM_INVALID_COORD)
        );
    }
}
