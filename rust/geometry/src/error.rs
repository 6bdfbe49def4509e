// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for CRS and extraction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during CRS handling and extraction
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot determine source CRS; please pass --source-crs EPSG:xxxx")]
    MissingSourceCrs,

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid CRS definition: {0}")]
    InvalidCrs(String),

    #[error("Coordinate transform failed: {0}")]
    Transform(String),

    #[error("Source error: {0}")]
    Core(#[from] csmap_core::Error),
}
