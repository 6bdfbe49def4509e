// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! csmap Geometry Processing
//!
//! CRS resolution and transforms, footprint validity, and extraction of
//! building footprints into axis-aligned boxes.

pub mod crs;
pub mod error;
pub mod extract;
pub mod projection;
pub mod transform;
pub mod validity;

pub use crs::{CrsSpec, EPSG_ETRS89_UTM32N, EPSG_WGS84};
pub use error::{Error, Result};
pub use extract::{ExtractOptions, Extractor, SkipCounts};
pub use projection::{Ellipsoid, TransverseMercator, WebMercator};
pub use transform::{
    default_provider, transform_multi_polygon, BuiltinProvider, PointTransform, TransformCache,
    TransformProvider,
};
#[cfg(feature = "proj")]
pub use transform::ProjProvider;
pub use validity::{is_valid, is_valid_polygon};
