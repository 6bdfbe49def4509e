// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use csmap_core::BoxDescriptor;
use thiserror::Error;

/// Result type for map writing and generation
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Box #{index} has a non-positive or non-finite extent: {descriptor:?}")]
    DegenerateBox {
        index: usize,
        descriptor: BoxDescriptor,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported input {} (expected .gpkg, .geojson or .json)", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("Nothing to generate: provide an input dataset or use stub mode")]
    NothingToGenerate,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cannot parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Core(#[from] csmap_core::Error),

    #[error(transparent)]
    Geometry(#[from] csmap_geometry::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
