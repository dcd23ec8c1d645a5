use std::borrow::Cow;
use std::sync::Arc;

use crate::coord::{Area, rad};
use crate::ellipsoid::{
    AIRY_1830, AIRY_1830_MODIFIED, Ellipsoid, GRS80, INTERNATIONAL_1924, WGS84,
};
use crate::errno::Errno;
use crate::mercator::SphericalMercator;
use crate::projection::Projection;
use crate::registry::Registry;
use crate::tmerc::TransverseMercator;
use crate::utm::{self, ZoneCache};

use super::object::{Crs, Kind, Object, Operation};

/// Resolves an authority code to a reference system.
pub(crate) fn epsg(registry: &Registry, code: u32) -> Result<Crs, Errno> {
    let (name, ellipsoid): (Cow<'static, str>, &'static Ellipsoid) = match code {
        4326 => return Ok(Crs::geographic(code, "WGS 84", &WGS84)),
        4277 => return Ok(Crs::geographic(code, "OSGB36", &AIRY_1830)),
        4300 => return Ok(Crs::geographic(code, "TM75", &AIRY_1830_MODIFIED)),
        4230 => return Ok(Crs::geographic(code, "ED50", &INTERNATIONAL_1924)),
        4978 => {
            return Ok(Crs {
                code: Some(code),
                name: Cow::Borrowed("WGS 84"),
                kind: Kind::Geocentric,
                ellipsoid: &WGS84,
                lat_first: false,
            });
        }
        3857 => (Cow::Borrowed("WGS 84 / Pseudo-Mercator"), &WGS84),
        27700 => (Cow::Borrowed("OSGB36 / British National Grid"), &AIRY_1830),
        29903 => (Cow::Borrowed("TM75 / Irish Grid"), &AIRY_1830_MODIFIED),
        c if (utm::CODE_BASE + u32::from(utm::MIN_ZONE)..=utm::CODE_BASE + u32::from(utm::MAX_ZONE))
            .contains(&c) =>
        {
            (Cow::Owned(format!("UTM zone {}N", c - utm::CODE_BASE)), &INTERNATIONAL_1924)
        }
        _ => return Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE),
    };
    let projection = registry
        .get(code)
        .ok_or(Errno::INVALID_OP_ILLEGAL_ARG_VALUE)?;
    Ok(Crs {
        code: Some(code),
        name,
        kind: Kind::Projected(projection),
        ellipsoid,
        lat_first: false,
    })
}

/// Parses `EPSG:<code>`, ignoring case. `None` if `definition` has another form.
fn authority_code(definition: &str) -> Option<Result<u32, Errno>> {
    let (authority, code) = definition.split_once(':')?;
    if !authority.eq_ignore_ascii_case("epsg") {
        return None;
    }
    Some(
        code.trim()
            .parse()
            .map_err(|_| Errno::INVALID_OP_WRONG_SYNTAX),
    )
}

/// `key=value` pairs of a `+proj` definition, in order. Flags have no value.
#[derive(Debug, Default)]
struct Params {
    pairs: Vec<(String, Option<String>)>,
}

impl Params {
    fn parse<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, Errno> {
        let mut pairs = Vec::new();
        for token in tokens {
            let token = token.trim();
            let token = token.strip_prefix('+').unwrap_or(token);
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key, Some(value.to_string())),
                None => (token, None),
            };
            if key.is_empty() {
                return Err(Errno::INVALID_OP_WRONG_SYNTAX);
            }
            pairs.push((key.to_string(), value));
        }
        Ok(Params { pairs })
    }

    /// The first occurrence of `key`: `Some(None)` for a bare flag.
    fn get(&self, key: &str) -> Option<Option<&str>> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn value(&self, key: &str) -> Result<Option<&str>, Errno> {
        match self.get(key) {
            None => Ok(None),
            Some(Some(v)) => Ok(Some(v)),
            Some(None) => Err(Errno::INVALID_OP_MISSING_ARG),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>, Errno> {
        self.value(key)?
            .map(|v| match v.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(x),
                _ => Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE),
            })
            .transpose()
    }

    fn definition(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => k.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn ellipsoid(name: &str) -> Result<&'static Ellipsoid, Errno> {
    match name {
        "airy" => Ok(&AIRY_1830),
        "mod_airy" => Ok(&AIRY_1830_MODIFIED),
        "intl" => Ok(&INTERNATIONAL_1924),
        "GRS80" => Ok(&GRS80),
        "WGS84" => Ok(&WGS84),
        _ => Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE),
    }
}

/// Either half of a parsed `+proj` definition.
enum Parsed {
    Crs(Crs),
    Operation(Operation),
}

fn build(params: &Params, zones: &ZoneCache) -> Result<Parsed, Errno> {
    let proj = params.value("proj")?.ok_or(Errno::INVALID_OP_MISSING_ARG)?;
    let ellipsoid = match params.value("ellps")? {
        Some(name) => ellipsoid(name)?,
        None => &GRS80,
    };
    if let Some(units) = params.value("units")? {
        if units != "m" {
            return Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE);
        }
    }
    let is_crs = match params.value("type")? {
        None => false,
        Some("crs") => true,
        Some(_) => return Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE),
    };

    let (id, kind): (&'static str, Kind) = match proj {
        "utm" => ("utm", Kind::Projected(utm_zone(params, ellipsoid, zones)?)),
        "tmerc" => {
            let tm = TransverseMercator::new(
                None,
                Cow::Borrowed("Transverse Mercator"),
                ellipsoid,
                params.number("k")?.or(params.number("k_0")?).unwrap_or(1.0),
                rad(params.number("lat_0")?.unwrap_or(0.0)),
                rad(params.number("lon_0")?.unwrap_or(0.0)),
                params.number("x_0")?.unwrap_or(0.0),
                params.number("y_0")?.unwrap_or(0.0),
            );
            ("tmerc", Kind::Projected(Arc::new(tm)))
        }
        "webmerc" => {
            let merc = SphericalMercator::new(3857, ellipsoid.semi_major_axis());
            ("webmerc", Kind::Projected(Arc::new(merc)))
        }
        "longlat" | "latlong" | "lonlat" | "latlon" => ("longlat", Kind::Geographic),
        "cart" => ("cart", Kind::Geocentric),
        _ => return Err(Errno::INVALID_OP_WRONG_SYNTAX),
    };

    if is_crs {
        Ok(Parsed::Crs(Crs {
            code: None,
            name: Cow::Borrowed("unknown"),
            kind,
            ellipsoid,
            lat_first: false,
        }))
    } else {
        Ok(Parsed::Operation(Operation {
            id,
            definition: params.definition(),
            kind,
            ellipsoid,
        }))
    }
}

fn utm_zone(
    params: &Params,
    ellipsoid: &'static Ellipsoid,
    zones: &ZoneCache,
) -> Result<Arc<dyn Projection>, Errno> {
    let zone: u8 = params
        .value("zone")?
        .ok_or(Errno::INVALID_OP_MISSING_ARG)?
        .parse()
        .map_err(|_| Errno::INVALID_OP_ILLEGAL_ARG_VALUE)?;
    if !(utm::MIN_ZONE..=utm::MAX_ZONE).contains(&zone) {
        return Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE);
    }
    let south = params.has("south");
    if !south && std::ptr::eq(ellipsoid, &INTERNATIONAL_1924) {
        if let Some(tm) = zones.get(zone) {
            return Ok(tm);
        }
    }
    Ok(Arc::new(TransverseMercator::new(
        None,
        Cow::Owned(format!("UTM zone {zone}{}", if south { "S" } else { "N" })),
        ellipsoid,
        0.9996,
        0.0,
        rad(6.0 * f64::from(zone) - 183.0),
        500000.0,
        if south { 10000000.0 } else { 0.0 },
    )))
}

fn from_params(params: &Params, zones: &ZoneCache) -> Result<Object, Errno> {
    if params.value("proj")? == Some("pipeline") {
        return Err(Errno::INVALID_OP_WRONG_SYNTAX);
    }
    Ok(match build(params, zones)? {
        Parsed::Crs(crs) => Object::Crs(crs),
        Parsed::Operation(op) => Object::Operation(op),
    })
}

fn looks_like_proj_string(definition: &str) -> bool {
    definition.starts_with('+') || definition.contains('=')
}

/// Builds an object from an authority code or a `+proj` string.
pub(crate) fn object(registry: &Registry, zones: &ZoneCache, definition: &str) -> Result<Object, Errno> {
    let definition = definition.trim();
    if let Some(code) = authority_code(definition) {
        return Ok(Object::Crs(epsg(registry, code?)?));
    }
    if looks_like_proj_string(definition) {
        return from_params(&Params::parse(definition.split_whitespace())?, zones);
    }
    Err(Errno::INVALID_OP_WRONG_SYNTAX)
}

/// Builds an object from separate `key=value` arguments.
pub(crate) fn object_from_args(zones: &ZoneCache, args: &[&str]) -> Result<Object, Errno> {
    if args.is_empty() {
        return Err(Errno::INVALID_OP_MISSING_ARG);
    }
    from_params(&Params::parse(args.iter().copied())?, zones)
}

/// Builds a reference system; `+proj` strings are read as systems even without `+type=crs`.
pub(crate) fn crs(registry: &Registry, zones: &ZoneCache, definition: &str) -> Result<Crs, Errno> {
    let definition = definition.trim();
    if let Some(code) = authority_code(definition) {
        return epsg(registry, code?);
    }
    if !looks_like_proj_string(definition) {
        return Err(Errno::INVALID_OP_WRONG_SYNTAX);
    }
    let params = Params::parse(definition.split_whitespace())?;
    if params.value("proj")? == Some("pipeline") {
        return Err(Errno::INVALID_OP_WRONG_SYNTAX);
    }
    match build(&params, zones)? {
        Parsed::Crs(crs) => Ok(crs),
        Parsed::Operation(op) => Ok(Crs {
            code: None,
            name: Cow::Borrowed("unknown"),
            kind: op.kind,
            ellipsoid: op.ellipsoid,
            lat_first: false,
        }),
    }
}

/// Validates an area of use in degrees.
pub(crate) fn check_area(area: &Area) -> Result<(), Errno> {
    let values = [area.west, area.south, area.east, area.north];
    let in_range = area.south <= area.north
        && area.south >= -90.0
        && area.north <= 90.0
        && area.west.abs() <= 180.0
        && area.east.abs() <= 180.0;
    if values.iter().all(|v| v.is_finite()) && in_range {
        Ok(())
    } else {
        Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE)
    }
}

/// Options accepted when combining two reference systems.
#[derive(Debug, Default)]
pub(crate) struct Options {
    pub allow_ballpark: bool,
    pub accuracy: Option<f64>,
}

impl Options {
    pub fn parse(options: &[&str]) -> Result<Self, Errno> {
        let mut parsed = Options {
            allow_ballpark: true,
            accuracy: None,
        };
        for option in options {
            let (key, value) = option
                .split_once('=')
                .ok_or(Errno::INVALID_OP_ILLEGAL_ARG_VALUE)?;
            match key.trim().to_ascii_uppercase().as_str() {
                "AUTHORITY" => {}
                "ACCURACY" => {
                    let accuracy = value
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| Errno::INVALID_OP_ILLEGAL_ARG_VALUE)?;
                    parsed.accuracy = Some(accuracy);
                }
                "ALLOW_BALLPARK" => {
                    parsed.allow_ballpark = match value.trim().to_ascii_uppercase().as_str() {
                        "YES" => true,
                        "NO" => false,
                        _ => return Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE),
                    };
                }
                _ => return Err(Errno::INVALID_OP_ILLEGAL_ARG_VALUE),
            }
        }
        Ok(parsed)
    }

    /// Whether an operation of unknown accuracy may be used.
    pub fn permits_ballpark(&self) -> bool {
        self.allow_ballpark && self.accuracy.is_none()
    }
}
