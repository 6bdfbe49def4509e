// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature source abstraction
//!
//! A source reports its CRS and yields features one at a time in its natural
//! order. Callers may stop pulling at any point; nothing beyond the current
//! page is materialized.

use std::fmt;

use geo::{MultiPolygon, Polygon, Rect};

use crate::error::Result;

/// CRS metadata as stored in a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrsDefinition {
    /// Well-known text (WKT1 or WKT2)
    Wkt(String),
    /// Authority identifier, e.g. `EPSG:25832`
    Identifier(String),
}

/// Geometry type tag, used to report what was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    /// Any other WKB type code (curves, surfaces, TINs, ...)
    Other(u32),
    /// Blob could not be decoded at all
    Malformed,
}

impl GeometryKind {
    /// Map a base WKB type code (dimension flags already stripped)
    pub fn from_wkb_code(code: u32) -> Self {
        match code {
            1 => GeometryKind::Point,
            2 => GeometryKind::LineString,
            3 => GeometryKind::Polygon,
            4 => GeometryKind::MultiPoint,
            5 => GeometryKind::MultiLineString,
            6 => GeometryKind::MultiPolygon,
            7 => GeometryKind::GeometryCollection,
            other => GeometryKind::Other(other),
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryKind::Other(code) => write!(f, "WKB type {}", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Closed set of geometries the extractor understands
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    /// Non-polygonal or undecodable geometry; always skipped
    Unsupported(GeometryKind),
}

impl FeatureGeometry {
    /// Polygonal geometries as a MultiPolygon, `None` for unsupported kinds
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            FeatureGeometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
            FeatureGeometry::MultiPolygon(mp) => Some(mp.clone()),
            FeatureGeometry::Unsupported(_) => None,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            FeatureGeometry::Polygon(_) => GeometryKind::Polygon,
            FeatureGeometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            FeatureGeometry::Unsupported(kind) => *kind,
        }
    }
}

/// One dataset record
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    /// Primary key or position in the source, for diagnostics
    pub id: Option<i64>,
    pub geometry: Option<FeatureGeometry>,
}

/// Pull-based feature stream
pub type FeatureIter<'a> = Box<dyn Iterator<Item = Result<SourceFeature>> + 'a>;

/// A readable feature dataset
pub trait FeatureSource {
    /// CRS declared by the dataset, if any
    fn crs(&self) -> Result<Option<CrsDefinition>>;

    /// Every CRS description the dataset carries, most specific first.
    /// Callers try them in order when the first cannot be used.
    fn crs_candidates(&self) -> Result<Vec<CrsDefinition>> {
        Ok(self.crs()?.into_iter().collect())
    }

    /// Iterate features in natural order.
    ///
    /// `filter` is a coarse rectangle in the source CRS. Implementations may
    /// honour it, ignore it, or fail; callers retry without a filter on
    /// failure.
    fn features(&self, filter: Option<Rect<f64>>) -> Result<FeatureIter<'_>>;
}

/// In-memory source, mostly for tests and already-materialized responses
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub crs: Option<CrsDefinition>,
    pub features: Vec<SourceFeature>,
}

impl MemorySource {
    pub fn new(crs: Option<CrsDefinition>) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, geometry: Option<FeatureGeometry>) {
        let id = self.features.len() as i64;
        self.features.push(SourceFeature {
            id: Some(id),
            geometry,
        });
    }
}

impl FeatureSource for MemorySource {
    fn crs(&self) -> Result<Option<CrsDefinition>> {
        Ok(self.crs.clone())
    }

    // Filter ignored: callers still do the exact intersection test
    fn features(&self, _filter: Option<Rect<f64>>) -> Result<FeatureIter<'_>> {
        Ok(Box::new(self.features.iter().cloned().map(Ok)))
    }
}
