// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinate transforms between CRSs
//!
//! A [`TransformProvider`] builds [`PointTransform`]s for a CRS pair. Two
//! providers exist: [`BuiltinProvider`] (pure Rust, the CRSs building
//! datasets actually come in) and `ProjProvider` behind the `proj` feature.
//! [`TransformCache`] memoizes transformers per `(from, to)` pair for the
//! duration of one extraction.

use std::rc::Rc;

use geo::{Coord, MapCoords, MultiPolygon};
use rustc_hash::FxHashMap;

use crate::crs::CrsSpec;
use crate::error::{Error, Result};
use crate::projection::{Ellipsoid, TransverseMercator, WebMercator};

/// Transforms single (x, y) positions. x is longitude/easting, y is
/// latitude/northing regardless of the CRS's declared axis order.
pub trait PointTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)>;
}

/// Builds transformers between CRSs
pub trait TransformProvider {
    fn transformer(&self, from: &CrsSpec, to: &CrsSpec) -> Result<Box<dyn PointTransform>>;
}

/// Transform every coordinate of a multipolygon; fails on the first bad point
pub fn transform_multi_polygon(
    transform: &dyn PointTransform,
    geometry: &MultiPolygon<f64>,
) -> Result<MultiPolygon<f64>> {
    geometry.try_map_coords(|c| -> Result<Coord<f64>> {
        let (x, y) = transform.transform(c.x, c.y)?;
        Ok(Coord { x, y })
    })
}

/// CRS as understood by the builtin provider
#[derive(Debug, Clone, PartialEq)]
enum BuiltinCrs {
    /// Longitude/latitude degrees
    Geographic,
    TransverseMercator(TransverseMercator),
    WebMercator,
}

impl BuiltinCrs {
    fn from_epsg(code: u32) -> Option<Self> {
        match code {
            // WGS84, ETRS89, NAD83
            4326 | 4258 | 4269 => Some(BuiltinCrs::Geographic),
            32601..=32660 => Some(Self::utm(Ellipsoid::WGS84, code - 32600, false)),
            32701..=32760 => Some(Self::utm(Ellipsoid::WGS84, code - 32700, true)),
            25801..=25860 => Some(Self::utm(Ellipsoid::GRS80, code - 25800, false)),
            3857 | 900913 => Some(BuiltinCrs::WebMercator),
            _ => None,
        }
    }

    fn utm(ellipsoid: Ellipsoid, zone: u32, south: bool) -> Self {
        BuiltinCrs::TransverseMercator(TransverseMercator::utm(ellipsoid, zone, south))
    }

    fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            BuiltinCrs::Geographic => Ok((x, y)),
            BuiltinCrs::TransverseMercator(tm) => tm.inverse(x, y),
            BuiltinCrs::WebMercator => WebMercator.inverse(x, y),
        }
    }

    fn from_geographic(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        match self {
            BuiltinCrs::Geographic => Ok((lon, lat)),
            BuiltinCrs::TransverseMercator(tm) => tm.forward(lon, lat),
            BuiltinCrs::WebMercator => WebMercator.forward(lon, lat),
        }
    }
}

/// Pure-Rust provider: WGS84/ETRS89/NAD83 geographic, UTM on WGS84 and
/// ETRS89, and web mercator
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    fn resolve(crs: &CrsSpec) -> Result<(u32, BuiltinCrs)> {
        let code = crs
            .epsg_code()
            .ok_or_else(|| Error::UnsupportedCrs(format!("{} (no EPSG code)", summarize(crs))))?;
        let resolved = BuiltinCrs::from_epsg(code)
            .ok_or_else(|| Error::UnsupportedCrs(format!("EPSG:{} (build with the proj feature)", code)))?;
        Ok((code, resolved))
    }
}

impl TransformProvider for BuiltinProvider {
    fn transformer(&self, from: &CrsSpec, to: &CrsSpec) -> Result<Box<dyn PointTransform>> {
        let (from_code, from_crs) = Self::resolve(from)?;
        let (to_code, to_crs) = Self::resolve(to)?;
        tracing::debug!(from = from_code, to = to_code, "Built-in transform");

        if from_code == to_code {
            return Ok(Box::new(Identity));
        }
        Ok(Box::new(BuiltinTransform {
            from: from_crs,
            to: to_crs,
        }))
    }
}

struct Identity;

impl PointTransform for Identity {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if x.is_finite() && y.is_finite() {
            Ok((x, y))
        } else {
            Err(Error::Transform("non-finite coordinate".to_string()))
        }
    }
}

/// Source CRS → geographic → target CRS
struct BuiltinTransform {
    from: BuiltinCrs,
    to: BuiltinCrs,
}

impl PointTransform for BuiltinTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (lon, lat) = self.from.to_geographic(x, y)?;
        self.to.from_geographic(lon, lat)
    }
}

/// Short form for error messages; WKT can run to kilobytes
fn summarize(crs: &CrsSpec) -> String {
    let text = crs.to_string();
    match text.char_indices().nth(60) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}

#[cfg(feature = "proj")]
pub use proj_provider::ProjProvider;

#[cfg(feature = "proj")]
mod proj_provider {
    use proj::Proj;

    use super::{PointTransform, TransformProvider};
    use crate::crs::CrsSpec;
    use crate::error::{Error, Result};

    /// Provider backed by the PROJ library. Axis order is normalized to
    /// x = longitude/easting.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ProjProvider;

    impl TransformProvider for ProjProvider {
        fn transformer(&self, from: &CrsSpec, to: &CrsSpec) -> Result<Box<dyn PointTransform>> {
            let proj = Proj::new_known_crs(&from.to_string(), &to.to_string(), None)
                .map_err(|e| Error::UnsupportedCrs(format!("{} -> {}: {}", from, to, e)))?;
            tracing::debug!(from = %from, to = %to, "PROJ transform");
            Ok(Box::new(ProjTransform(proj)))
        }
    }

    struct ProjTransform(Proj);

    impl PointTransform for ProjTransform {
        fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
            let (tx, ty) = self
                .0
                .convert((x, y))
                .map_err(|e| Error::Transform(e.to_string()))?;
            if tx.is_finite() && ty.is_finite() {
                Ok((tx, ty))
            } else {
                Err(Error::Transform(format!("({}, {}) has no finite image", x, y)))
            }
        }
    }
}

/// The provider for this build: PROJ when compiled in, otherwise builtin
pub fn default_provider() -> Box<dyn TransformProvider> {
    #[cfg(feature = "proj")]
    {
        Box::new(ProjProvider)
    }
    #[cfg(not(feature = "proj"))]
    {
        Box::new(BuiltinProvider)
    }
}

/// Memoizes transformers keyed by `(from, to)`
pub struct TransformCache<'p> {
    provider: &'p dyn TransformProvider,
    transforms: FxHashMap<(CrsSpec, CrsSpec), Rc<dyn PointTransform>>,
}

impl<'p> TransformCache<'p> {
    pub fn new(provider: &'p dyn TransformProvider) -> Self {
        Self {
            provider,
            transforms: FxHashMap::default(),
        }
    }

    /// Cached transformer, built on first request. Failures are not cached.
    pub fn get(&mut self, from: &CrsSpec, to: &CrsSpec) -> Result<Rc<dyn PointTransform>> {
        let key = (from.clone(), to.clone());
        if let Some(t) = self.transforms.get(&key) {
            return Ok(Rc::clone(t));
        }
        let transform: Rc<dyn PointTransform> = Rc::from(self.provider.transformer(from, to)?);
        self.transforms.insert(key, Rc::clone(&transform));
        Ok(transform)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}
