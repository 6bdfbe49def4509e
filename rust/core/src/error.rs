// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for dataset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading feature datasets
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid bounding box: {0}")]
    InvalidBBox(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GeoPackage query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("GeoPackage {} contains no feature layers", .0.display())]
    NoLayers(PathBuf),

    #[error("Layer '{layer}' not found (available: {available})")]
    LayerNotFound { layer: String, available: String },

    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Malformed geometry blob: {0}")]
    Wkb(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
