// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # csmap Core
//!
//! Building footprint sources and the shared box model for csmap.
//!
//! ## Overview
//!
//! - **Query box**: validated WGS84 bounding box ([`QueryBBox`])
//! - **Feature sources**: GeoPackage layers read through SQLite, GeoJSON
//!   documents held in memory, both behind [`FeatureSource`]
//! - **Geometry blobs**: GeoPackage binary header and WKB decoding with [nom](https://docs.rs/nom)
//! - **Box model**: [`BoxDescriptor`], the extruded footprint handed to the map writer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csmap_core::{FeatureSource, GeoPackage, QueryBBox};
//!
//! let bbox: QueryBBox = "9.99,53.55,10.0,53.56".parse()?;
//! let gpkg = GeoPackage::open("buildings.gpkg")?;
//! let layer = gpkg.layer(None)?;
//! for feature in layer.features(None)? {
//!     let feature = feature?;
//!     println!("{:?}", feature.id);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for [`BoxDescriptor`]

pub mod bbox;
pub mod boxes;
pub mod error;
pub mod geojson_source;
pub mod gpkg;
pub mod source;
pub mod wkb;

pub use bbox::QueryBBox;
pub use boxes::BoxDescriptor;
pub use error::{Error, Result};
pub use geojson_source::{GeoJsonSource, GEOJSON_DEFAULT_CRS};
pub use gpkg::{GeoPackage, GpkgLayer, LayerInfo, DEFAULT_PAGE_SIZE};
pub use source::{
    CrsDefinition, FeatureGeometry, FeatureIter, FeatureSource, GeometryKind, MemorySource,
    SourceFeature,
};
pub use wkb::{decode_gpkg_geometry, decode_wkb, GpkgHeader};
