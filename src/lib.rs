#![doc(html_logo_url = "https://raw.githubusercontent.com/georust/meta/master/logo/logo.png")]
//! `geoproj` provides ellipsoidal map projections, UTM zoning, and a
//! coordinate transformation pipeline that funnels single coordinates,
//! arrays, strided buffers and bounding boxes through one engine interface.
//!
//! # Building blocks
//!
//! - [`Ellipsoid`] converts between geodetic and geocentric coordinates.
//! - [`SphericalMercator`] and [`TransverseMercator`] implement [`Projection`],
//!   the `forward` / `reverse` capability keyed by an EPSG code.
//! - [`utm`] assigns zones and letters and caches one transverse Mercator per zone.
//! - [`Registry`] maps well-known codes to projections.
//!
//! # Transformations
//!
//! A [`Context`] owns an [`Engine`] behind a lock; a [`Pj`] created from it
//! transforms coordinates. The default engine, [`Native`], is pure Rust. With
//! the `proj` feature, `ProjEngine` runs the same pipeline on the PROJ C
//! library.
//!
//! Geographic EPSG systems take `(lat, lon)` in degrees, as declared by the
//! authority. [`Pj::normalize_for_visualization`] swaps to `(lon, lat)`.
//!
//! # Example
//!
//! ```
//! use approx::assert_abs_diff_eq;
//! use geoproj::{Context, Coord};
//!
//! let ctx = Context::new();
//! let pj = ctx.new_crs_to_crs("EPSG:4326", "EPSG:32632", None).unwrap();
//!
//! let zurich = pj.forward(Coord::xy(47.374444, 8.541111)).unwrap();
//! assert_abs_diff_eq!(zurich.x(), 465355.583, epsilon = 1e-2);
//! assert_abs_diff_eq!(zurich.y(), 5246979.603, epsilon = 1e-2);
//!
//! assert_eq!(geoproj::utm::zone(47.374444, 8.541111), Some(32));
//! ```
//!
//! # Features
//!
//! - `geo-types` (default): [`Transform`] for `geo_types` geometries.
//! - `proj`: the libproj backed engine. `pkg_config` links it through
//!   `pkg-config`; `bundled_proj` builds PROJ from source through `proj-sys`.

mod context;
pub mod coord;
mod ellipsoid;
pub mod engine;
mod errno;
mod error;
#[cfg(feature = "proj")]
mod ffi;
pub mod geodesic;
mod mercator;
mod native;
mod pj;
mod projection;
mod registry;
mod tmerc;
mod transform;
pub mod utm;

pub use crate::context::{
    Context, default_context, new, new_crs_to_crs, new_crs_to_crs_from_pj, new_from_args,
    set_log_level,
};
pub use crate::coord::{Area, Bounds, Coord, Direction};
pub use crate::ellipsoid::{
    AIRY_1830, AIRY_1830_MODIFIED, Ellipsoid, GRS80, HAYFORD_1909, INTERNATIONAL_1924, WGS84,
};
pub use crate::engine::{Engine, Geod, LogLevel, PjInfo};
pub use crate::errno::Errno;
pub use crate::error::ProjError;
#[cfg(feature = "proj")]
pub use crate::ffi::{ProjEngine, ProjHandle};
pub use crate::mercator::{SphericalMercator, WEB_MERCATOR};
pub use crate::native::{Native, NativePj};
pub use crate::pj::Pj;
pub use crate::projection::Projection;
pub use crate::registry::{Registry, projection};
pub use crate::tmerc::{BRITISH_NATIONAL_GRID, IRISH_NATIONAL_GRID, TransverseMercator};
pub use crate::transform::Transform;
pub use crate::utm::ZoneCache;
