// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dataset → boxes → `.map`

use std::path::{Path, PathBuf};

use csmap_core::{FeatureSource, GeoJsonSource, GeoPackage, QueryBBox};
use csmap_geometry::{default_provider, ExtractOptions, Extractor, TransformProvider};

use crate::error::{Error, Result};
use crate::map220::{write_empty_map, write_map, MapStyle};

/// Supported input formats, by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    GeoPackage,
    GeoJson,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("gpkg") => Ok(InputKind::GeoPackage),
            Some("geojson") | Some("json") => Ok(InputKind::GeoJson),
            _ => Err(Error::UnsupportedInput(path.to_path_buf())),
        }
    }
}

/// Everything one `generate` run needs
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub bbox: QueryBBox,
    pub out: PathBuf,
    pub input: Option<PathBuf>,
    /// GeoPackage layer; ignored for GeoJSON
    pub layer: Option<String>,
    /// Write a worldspawn-only map when there is no input
    pub stub: bool,
    pub extract: ExtractOptions,
    pub style: MapStyle,
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub out: PathBuf,
    pub boxes: usize,
    pub stub: bool,
}

/// Run with the provider compiled into this build
pub fn generate(request: &GenerateRequest, progress: &mut dyn FnMut(usize)) -> Result<GenerateSummary> {
    let provider = default_provider();
    generate_with_provider(request, provider.as_ref(), progress)
}

pub fn generate_with_provider(
    request: &GenerateRequest,
    provider: &dyn TransformProvider,
    progress: &mut dyn FnMut(usize),
) -> Result<GenerateSummary> {
    let Some(input) = &request.input else {
        if !request.stub {
            return Err(Error::NothingToGenerate);
        }
        write_empty_map(&request.out, &request.style.wads)?;
        tracing::info!(out = %request.out.display(), "Wrote structure-only map");
        return Ok(GenerateSummary {
            out: request.out.clone(),
            boxes: 0,
            stub: true,
        });
    };

    let kind = InputKind::from_path(input)?;
    tracing::info!(input = %input.display(), ?kind, bbox = %request.bbox, "Generating map");

    let extractor = Extractor::new(provider, request.extract.clone());
    let boxes = match kind {
        InputKind::GeoPackage => {
            let gpkg = GeoPackage::open(input)?;
            let layer = gpkg.layer(request.layer.as_deref())?;
            run_extract(&extractor, &layer, &request.bbox, progress)?
        }
        InputKind::GeoJson => {
            if request.layer.is_some() {
                tracing::debug!("Layer name ignored for GeoJSON input");
            }
            let source = GeoJsonSource::from_path(input)?;
            run_extract(&extractor, &source, &request.bbox, progress)?
        }
    };

    write_map(&request.out, &boxes, &request.style)?;
    tracing::info!(out = %request.out.display(), boxes = boxes.len(), "Wrote map");

    Ok(GenerateSummary {
        out: request.out.clone(),
        boxes: boxes.len(),
        stub: false,
    })
}

fn run_extract(
    extractor: &Extractor<'_>,
    source: &dyn FeatureSource,
    bbox: &QueryBBox,
    progress: &mut dyn FnMut(usize),
) -> Result<Vec<csmap_core::BoxDescriptor>> {
    Ok(extractor.extract_with_progress(source, bbox, progress)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_kind() {
        assert_eq!(
            InputKind::from_path(Path::new("data/buildings.GPKG")).unwrap(),
            InputKind::GeoPackage
        );
        assert_eq!(
            InputKind::from_path(Path::new("wfs.geojson")).unwrap(),
            InputKind::GeoJson
        );
        assert_eq!(InputKind::from_path(Path::new("wfs.json")).unwrap(), InputKind::GeoJson);
        assert!(matches!(
            InputKind::from_path(Path::new("buildings.shp")),
            Err(Error::UnsupportedInput(_))
        ));
        assert!(InputKind::from_path(Path::new("noext")).is_err());
    }
}
