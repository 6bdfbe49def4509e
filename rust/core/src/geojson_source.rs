// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoJSON feature source
//!
//! Covers clipped extracts and already-downloaded WFS responses. The whole
//! document is held in memory, with an R-tree over feature envelopes for
//! bounding-box pre-filtering.

use std::path::Path;

use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use geojson::{GeoJson, JsonObject, Value};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::error::{Error, Result};
use crate::source::{CrsDefinition, FeatureGeometry, FeatureIter, FeatureSource, GeometryKind, SourceFeature};

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// CRS assumed when a document carries no `crs` member (RFC 7946)
pub const GEOJSON_DEFAULT_CRS: &str = "EPSG:4326";

/// In-memory GeoJSON dataset
pub struct GeoJsonSource {
    crs: CrsDefinition,
    features: Vec<SourceFeature>,
    index: RTree<IndexedEnvelope>,
}

impl std::fmt::Debug for GeoJsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoJsonSource")
            .field("crs", &self.crs)
            .field("features", &self.features.len())
            .finish()
    }
}

impl GeoJsonSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let source = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            features = source.features.len(),
            "Loaded GeoJSON"
        );
        Ok(source)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let geojson: GeoJson = content.parse()?;

        let (crs_member, features) = match geojson {
            GeoJson::FeatureCollection(fc) => (
                crs_from_members(fc.foreign_members.as_ref()),
                fc.features
                    .into_iter()
                    .map(|f| f.geometry.map(|g| g.value))
                    .collect::<Vec<_>>(),
            ),
            GeoJson::Feature(f) => (
                crs_from_members(f.foreign_members.as_ref()),
                vec![f.geometry.map(|g| g.value)],
            ),
            GeoJson::Geometry(g) => (crs_from_members(g.foreign_members.as_ref()), vec![Some(g.value)]),
        };

        let features: Vec<SourceFeature> = features
            .into_iter()
            .enumerate()
            .map(|(i, value)| SourceFeature {
                id: Some(i as i64),
                geometry: value.map(convert_value),
            })
            .collect();

        let envelopes = features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let rect = f.geometry.as_ref()?.to_multi_polygon()?.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    i,
                ))
            })
            .collect();

        Ok(Self {
            crs: crs_member.unwrap_or_else(|| CrsDefinition::Identifier(GEOJSON_DEFAULT_CRS.to_string())),
            features,
            index: RTree::bulk_load(envelopes),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureSource for GeoJsonSource {
    fn crs(&self) -> Result<Option<CrsDefinition>> {
        Ok(Some(self.crs.clone()))
    }

    fn features(&self, filter: Option<Rect<f64>>) -> Result<FeatureIter<'_>> {
        let Some(rect) = filter else {
            return Ok(Box::new(self.features.iter().cloned().map(Ok)));
        };

        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut hits: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        // R-tree order is arbitrary; restore dataset order
        hits.sort_unstable();

        Ok(Box::new(
            hits.into_iter().map(move |i| Ok(self.features[i].clone())),
        ))
    }
}

/// Legacy `crs` member, e.g. `{"type":"name","properties":{"name":"EPSG:25832"}}`
fn crs_from_members(members: Option<&JsonObject>) -> Option<CrsDefinition> {
    let crs = members?.get("crs")?;
    let properties = crs.get("properties")?;
    match crs.get("type")?.as_str()? {
        "name" => properties
            .get("name")?
            .as_str()
            .map(|name| CrsDefinition::Identifier(name.to_string())),
        "EPSG" | "epsg" => properties
            .get("code")?
            .as_u64()
            .map(|code| CrsDefinition::Identifier(format!("EPSG:{}", code))),
        _ => None,
    }
}

fn convert_value(value: Value) -> FeatureGeometry {
    let converted = match value {
        Value::Polygon(rings) => polygon_from_rings(&rings).map(FeatureGeometry::Polygon),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| polygon_from_rings(rings))
            .collect::<Option<Vec<_>>>()
            .map(|p| FeatureGeometry::MultiPolygon(MultiPolygon::new(p))),
        Value::Point(_) => Some(FeatureGeometry::Unsupported(GeometryKind::Point)),
        Value::MultiPoint(_) => Some(FeatureGeometry::Unsupported(GeometryKind::MultiPoint)),
        Value::LineString(_) => Some(FeatureGeometry::Unsupported(GeometryKind::LineString)),
        Value::MultiLineString(_) => Some(FeatureGeometry::Unsupported(GeometryKind::MultiLineString)),
        Value::GeometryCollection(_) => Some(FeatureGeometry::Unsupported(GeometryKind::GeometryCollection)),
    };
    converted.unwrap_or(FeatureGeometry::Unsupported(GeometryKind::Malformed))
}

/// `None` when a position has fewer than two ordinates
fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.iter()
            .map(|pos| match pos.as_slice() {
                [x, y, ..] => Some(Coord { x: *x, y: *y }),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(LineString::new)
    });

    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(Vec::new()),
    };
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}
