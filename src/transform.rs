use crate::context::new_crs_to_crs;
use crate::coord::Coord;
use crate::engine::Engine;
use crate::error::ProjError;
use crate::pj::Pj;

/// Transform a coordinate container in the forward direction of a [`Pj`].
pub trait Transform {
    type Output;

    /// Transform by mutating in place.
    ///
    #[cfg_attr(feature = "geo-types", doc = r##"
# Examples

```
use approx::assert_abs_diff_eq;
use geoproj::Transform;

let mut point = geo_types::point!(x: 47.374444, y: 8.541111);
let pj = geoproj::new_crs_to_crs("EPSG:4326", "EPSG:3857", None).unwrap();
point.transform(&pj).unwrap();

assert_abs_diff_eq!(point.x(), 950792.127329, epsilon = 1e-3);
assert_abs_diff_eq!(point.y(), 6003408.475803, epsilon = 1e-3);
```
"##)]
    fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError>;

    /// Immutable flavor of [`Transform::transform`], which allocates a new value.
    fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Self::Output, ProjError>;

    /// Transform from one CRS to another through the
    /// [`default_context`](crate::default_context).
    ///
    #[cfg_attr(feature = "geo-types", doc = r##"
# Examples

```
use approx::assert_abs_diff_eq;
use geo_types::line_string;
use geoproj::Transform;

let mut line = line_string![(x: 51.5, y: -0.12), (x: 55.95, y: -3.19)];
line.transform_crs_to_crs("EPSG:4326", "EPSG:27700").unwrap();
assert!(line.0[1].y > line.0[0].y);
```
"##)]
    fn transform_crs_to_crs(&mut self, source_crs: &str, target_crs: &str) -> Result<(), ProjError> {
        let pj = new_crs_to_crs(source_crs, target_crs, None)?;
        self.transform(&pj)
    }

    /// Immutable flavor of [`Transform::transform_crs_to_crs`].
    fn transformed_crs_to_crs(
        &self,
        source_crs: &str,
        target_crs: &str,
    ) -> Result<Self::Output, ProjError> {
        let pj = new_crs_to_crs(source_crs, target_crs, None)?;
        self.transformed(&pj)
    }
}

impl Transform for Coord {
    type Output = Coord;

    fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError> {
        *self = pj.forward(*self)?;
        Ok(())
    }

    fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Coord, ProjError> {
        pj.forward(*self)
    }
}

impl Transform for Vec<Coord> {
    type Output = Vec<Coord>;

    /// On error the contents are unspecified, as with [`Pj::trans_array`].
    fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError> {
        pj.forward_array(self)
    }

    fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Vec<Coord>, ProjError> {
        let mut coords = self.clone();
        pj.forward_array(&mut coords)?;
        Ok(coords)
    }
}

#[cfg(feature = "geo-types")]
mod geometry {
    use geo_types::CoordFloat;
    use num_traits::NumCast;

    use super::Transform;
    use crate::coord::Coord;
    use crate::engine::Engine;
    use crate::error::ProjError;
    use crate::pj::Pj;

    fn to_coord<T: CoordFloat>(c: &geo_types::Coord<T>) -> Result<Coord, ProjError> {
        match (c.x.to_f64(), c.y.to_f64()) {
            (Some(x), Some(y)) => Ok(Coord::xy(x, y)),
            _ => Err(ProjError::FloatConversion),
        }
    }

    fn from_coord<T: CoordFloat>(c: Coord) -> Result<geo_types::Coord<T>, ProjError> {
        match (<T as NumCast>::from(c.x()), <T as NumCast>::from(c.y())) {
            (Some(x), Some(y)) => Ok(geo_types::Coord { x, y }),
            _ => Err(ProjError::FloatConversion),
        }
    }

    /// Transforms `coords` as one batch; nothing is written unless every
    /// coordinate succeeds.
    fn transform_all<'a, T, E, I>(coords: I, pj: &Pj<E>) -> Result<(), ProjError>
    where
        T: CoordFloat + 'a,
        E: Engine,
        I: IntoIterator<Item = &'a mut geo_types::Coord<T>>,
    {
        let mut targets: Vec<&mut geo_types::Coord<T>> = coords.into_iter().collect();
        let mut batch = targets
            .iter()
            .map(|c| to_coord(c))
            .collect::<Result<Vec<_>, _>>()?;
        pj.forward_array(&mut batch)?;
        let converted = batch
            .into_iter()
            .map(from_coord)
            .collect::<Result<Vec<_>, _>>()?;
        for (target, value) in targets.iter_mut().zip(converted) {
            **target = value;
        }
        Ok(())
    }

    impl<T: CoordFloat> Transform for geo_types::Coord<T> {
        type Output = Self;

        fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError> {
            *self = from_coord(pj.forward(to_coord(self)?)?)?;
            Ok(())
        }

        fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Self, ProjError> {
            let mut c = *self;
            c.transform(pj)?;
            Ok(c)
        }
    }

    impl<T: CoordFloat> Transform for geo_types::Point<T> {
        type Output = Self;

        fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError> {
            self.0.transform(pj)
        }

        fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Self, ProjError> {
            let mut p = *self;
            p.transform(pj)?;
            Ok(p)
        }
    }

    impl<T: CoordFloat> Transform for geo_types::LineString<T> {
        type Output = Self;

        fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError> {
            transform_all(self.0.iter_mut(), pj)
        }

        fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Self, ProjError> {
            let mut line = self.clone();
            line.transform(pj)?;
            Ok(line)
        }
    }

    impl<T: CoordFloat> Transform for geo_types::MultiPoint<T> {
        type Output = Self;

        fn transform<E: Engine>(&mut self, pj: &Pj<E>) -> Result<(), ProjError> {
            transform_all(self.0.iter_mut().map(|p| &mut p.0), pj)
        }

        fn transformed<E: Engine>(&self, pj: &Pj<E>) -> Result<Self, ProjError> {
            let mut points = self.clone();
            points.transform(pj)?;
            Ok(points)
        }
    }
}
