// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Footprint extraction
//!
//! Turns the polygons of a feature source into axis-aligned boxes in Hammer
//! units. Three CRSs are involved: the source CRS, WGS84 for the query box
//! test and ETRS89 / UTM 32N for area and extent in metres. Coordinates are
//! shifted so the query box centre sits at the map origin, then scaled.

use geo::{Area, BoundingRect, Intersects, MultiPolygon, Rect};

use csmap_core::{BoxDescriptor, FeatureSource, QueryBBox};

use crate::crs::CrsSpec;
use crate::error::{Error, Result};
use crate::transform::{transform_multi_polygon, PointTransform, TransformCache, TransformProvider};
use crate::validity::is_valid;

/// Points per bbox edge when projecting the pre-filter outline
const OUTLINE_POINTS_PER_EDGE: usize = 8;

/// Extraction parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Hammer units per metre
    pub scale: f64,
    /// Minimum footprint area in square metres; smaller footprints are dropped
    pub min_area: f64,
    /// Extrusion height in metres
    pub height: f64,
    /// Stop after this many boxes
    pub max_features: Option<usize>,
    /// Used when the dataset carries no CRS metadata
    pub source_crs: Option<CrsSpec>,
    /// Boxes this thin (output units) or thinner on X or Y are dropped
    pub degenerate_epsilon: f64,
    /// Pass the query box to the source as a coarse filter
    pub prefilter: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scale: 32.0,
            min_area: 2.0,
            height: 10.0,
            max_features: None,
            source_crs: None,
            degenerate_epsilon: 0.1,
            prefilter: true,
        }
    }
}

/// Why a feature produced no box
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkipCounts {
    pub no_geometry: usize,
    pub unsupported: usize,
    pub transform_failed: usize,
    pub invalid: usize,
    pub outside: usize,
    pub empty: usize,
    pub too_small: usize,
    pub degenerate: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.no_geometry
            + self.unsupported
            + self.transform_failed
            + self.invalid
            + self.outside
            + self.empty
            + self.too_small
            + self.degenerate
    }
}

/// Footprint-to-box extractor
pub struct Extractor<'p> {
    provider: &'p dyn TransformProvider,
    options: ExtractOptions,
}

/// Transformers for one run
struct Transforms {
    source_to_geographic: std::rc::Rc<dyn PointTransform>,
    source_to_metric: std::rc::Rc<dyn PointTransform>,
    origin: (f64, f64),
    prefilter: Option<Rect<f64>>,
}

impl<'p> Extractor<'p> {
    pub fn new(provider: &'p dyn TransformProvider, options: ExtractOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Boxes for every qualifying footprint, in source order
    pub fn extract(&self, source: &dyn FeatureSource, bbox: &QueryBBox) -> Result<Vec<BoxDescriptor>> {
        self.extract_with_progress(source, bbox, &mut |_| {})
    }

    /// Like [`Extractor::extract`], calling `progress` with the number of
    /// boxes kept so far after each new box
    pub fn extract_with_progress(
        &self,
        source: &dyn FeatureSource,
        bbox: &QueryBBox,
        progress: &mut dyn FnMut(usize),
    ) -> Result<Vec<BoxDescriptor>> {
        let mut cache = TransformCache::new(self.provider);
        let source_crs = self.resolve_source_crs(source, &mut cache)?;
        let transforms = self.prepare(&mut cache, &source_crs, bbox)?;

        let mut features = match source.features(transforms.prefilter) {
            Ok(features) => features,
            Err(e) if transforms.prefilter.is_some() => {
                tracing::warn!(error = %e, "Source rejected bbox filter, scanning all features");
                source.features(None)?
            }
            Err(e) => return Err(e.into()),
        };

        let query = bbox.to_polygon();
        let scale = self.options.scale;
        let (ox, oy) = transforms.origin;
        let z1 = self.options.height * scale;

        let mut boxes = Vec::new();
        let mut skipped = SkipCounts::default();
        let mut scanned = 0usize;

        loop {
            if self.options.max_features.is_some_and(|max| boxes.len() >= max) {
                tracing::debug!(max = boxes.len(), "Feature cap reached");
                break;
            }
            let Some(feature) = features.next() else {
                break;
            };
            let feature = feature?;
            scanned += 1;

            let Some(geometry) = feature.geometry else {
                skipped.no_geometry += 1;
                continue;
            };
            let Some(footprint) = geometry.to_multi_polygon() else {
                tracing::trace!(fid = ?feature.id, kind = %geometry.kind(), "Skipping non-polygonal feature");
                skipped.unsupported += 1;
                continue;
            };

            let geographic = match transform_multi_polygon(transforms.source_to_geographic.as_ref(), &footprint) {
                Ok(g) => g,
                Err(e) => {
                    tracing::trace!(fid = ?feature.id, error = %e, "Skipping feature, transform to WGS84 failed");
                    skipped.transform_failed += 1;
                    continue;
                }
            };
            if !is_valid(&geographic) {
                tracing::trace!(fid = ?feature.id, "Skipping invalid geometry");
                skipped.invalid += 1;
                continue;
            }
            if !query.intersects(&geographic) {
                skipped.outside += 1;
                continue;
            }

            let metric = match transform_multi_polygon(transforms.source_to_metric.as_ref(), &footprint) {
                Ok(m) => m,
                Err(e) => {
                    tracing::trace!(fid = ?feature.id, error = %e, "Skipping feature, metric transform failed");
                    skipped.transform_failed += 1;
                    continue;
                }
            };
            let Some(bounds) = non_empty_bounds(&metric) else {
                skipped.empty += 1;
                continue;
            };

            let area = metric.unsigned_area();
            if area < self.options.min_area {
                tracing::trace!(fid = ?feature.id, area, "Skipping small footprint");
                skipped.too_small += 1;
                continue;
            }

            let descriptor = BoxDescriptor::new(
                (bounds.min().x - ox) * scale,
                (bounds.min().y - oy) * scale,
                (bounds.max().x - ox) * scale,
                (bounds.max().y - oy) * scale,
                0.0,
                z1,
            );
            let eps = self.options.degenerate_epsilon;
            if descriptor.width() <= eps || descriptor.depth() <= eps {
                tracing::trace!(fid = ?feature.id, "Skipping degenerate box");
                skipped.degenerate += 1;
                continue;
            }

            boxes.push(descriptor);
            progress(boxes.len());
        }

        tracing::info!(
            scanned,
            boxes = boxes.len(),
            skipped = skipped.total(),
            outside = skipped.outside,
            too_small = skipped.too_small,
            invalid = skipped.invalid,
            "Extraction finished"
        );
        tracing::debug!(?skipped, transforms = cache.len(), "Skip breakdown");

        Ok(boxes)
    }

    /// First dataset CRS the provider can use, then the configured fallback
    fn resolve_source_crs(&self, source: &dyn FeatureSource, cache: &mut TransformCache<'_>) -> Result<CrsSpec> {
        let mut rejected = None;
        for definition in source.crs_candidates()? {
            let usable = CrsSpec::from_definition(&definition)
                .and_then(|spec| cache.get(&spec, &CrsSpec::WGS84).map(|_| spec));
            match usable {
                Ok(spec) => return Ok(spec),
                Err(e) => {
                    tracing::debug!(?definition, error = %e, "Dataset CRS not usable");
                    rejected.get_or_insert(e);
                }
            }
        }

        match (self.options.source_crs.clone(), rejected) {
            (Some(spec), Some(e)) => {
                tracing::warn!(error = %e, fallback = %spec, "Unusable dataset CRS, using configured source CRS");
                Ok(spec)
            }
            (Some(spec), None) => Ok(spec),
            (None, Some(e)) => Err(e),
            (None, None) => Err(Error::MissingSourceCrs),
        }
    }

    fn prepare(&self, cache: &mut TransformCache<'_>, source_crs: &CrsSpec, bbox: &QueryBBox) -> Result<Transforms> {
        let geographic = CrsSpec::WGS84;
        let metric = CrsSpec::ETRS89_UTM32N;

        let source_to_geographic = cache.get(source_crs, &geographic)?;
        let source_to_metric = cache.get(source_crs, &metric)?;
        let geographic_to_metric = cache.get(&geographic, &metric)?;

        let (cx, cy) = bbox.center();
        let origin = geographic_to_metric.transform(cx, cy)?;
        tracing::debug!(
            source_crs = %source_crs,
            origin_x = origin.0,
            origin_y = origin.1,
            "Working origin"
        );

        let prefilter = if self.options.prefilter {
            match self.prefilter_rect(cache, source_crs, bbox) {
                Ok(rect) => Some(rect),
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot project bbox to source CRS, scanning all features");
                    None
                }
            }
        } else {
            None
        };

        Ok(Transforms {
            source_to_geographic,
            source_to_metric,
            origin,
            prefilter,
        })
    }

    /// Bounding rectangle of the densified bbox outline in the source CRS
    fn prefilter_rect(&self, cache: &mut TransformCache<'_>, source_crs: &CrsSpec, bbox: &QueryBBox) -> Result<Rect<f64>> {
        let to_source = cache.get(&CrsSpec::WGS84, source_crs)?;
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (lon, lat) in bbox.outline(OUTLINE_POINTS_PER_EDGE) {
            let (x, y) = to_source.transform(lon, lat)?;
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        if !(min.0.is_finite() && min.1.is_finite() && max.0.is_finite() && max.1.is_finite()) {
            return Err(Error::Transform("bbox outline has no finite image".to_string()));
        }
        Ok(Rect::new(min, max))
    }
}

fn non_empty_bounds(geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    if geometry.0.iter().all(|p| p.exterior().0.is_empty()) {
        return None;
    }
    geometry.bounding_rect()
}
