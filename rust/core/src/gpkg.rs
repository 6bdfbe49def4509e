// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoPackage feature reader
//!
//! Reads feature tables straight out of the SQLite container. Queries run on
//! a private current-thread runtime so the reader itself stays synchronous.
//! Rows are fetched in primary-key pages; when the layer has an
//! `rtree_<table>_<column>` index a bounding-box filter is pushed down into
//! the query.

use std::path::{Path, PathBuf};

use geo::Rect;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::runtime::Runtime;

use crate::error::{Error, Result};
use crate::source::{CrsDefinition, FeatureGeometry, FeatureIter, FeatureSource, GeometryKind, SourceFeature};
use crate::wkb::decode_gpkg_geometry;

/// Rows fetched per query
pub const DEFAULT_PAGE_SIZE: usize = 512;

/// An open GeoPackage file. The connection is closed when this is dropped.
pub struct GeoPackage {
    path: PathBuf,
    runtime: Runtime,
    pool: SqlitePool,
}

impl std::fmt::Debug for GeoPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoPackage").field("path", &self.path).finish()
    }
}

/// Feature table entry from `gpkg_contents` / `gpkg_geometry_columns`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub table_name: String,
    pub geometry_column: String,
    pub srs_id: i64,
}

impl GeoPackage {
    /// Open a GeoPackage read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "GeoPackage not found"),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::io(&path, e))?;

        let options = SqliteConnectOptions::new().filename(&path).read_only(true);
        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options),
        )?;

        tracing::debug!(path = %path.display(), "Opened GeoPackage");
        Ok(Self {
            path,
            runtime,
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Feature layers in `gpkg_contents` order
    pub fn layers(&self) -> Result<Vec<LayerInfo>> {
        let rows = self.runtime.block_on(
            sqlx::query(
                "SELECT c.table_name, g.column_name, g.srs_id \
                 FROM gpkg_contents c \
                 JOIN gpkg_geometry_columns g ON g.table_name = c.table_name \
                 WHERE c.data_type = 'features' \
                 ORDER BY c.rowid",
            )
            .fetch_all(&self.pool),
        )?;

        rows.iter()
            .map(|row| -> Result<LayerInfo> {
                Ok(LayerInfo {
                    table_name: row.try_get(0)?,
                    geometry_column: row.try_get(1)?,
                    srs_id: row.try_get(2)?,
                })
            })
            .collect()
    }

    /// Select a layer by name, or the first feature layer when `name` is `None`
    pub fn layer(&self, name: Option<&str>) -> Result<GpkgLayer<'_>> {
        let layers = self.layers()?;
        let info = match name {
            Some(name) => layers
                .iter()
                .find(|l| l.table_name == name)
                .cloned()
                .ok_or_else(|| Error::LayerNotFound {
                    layer: name.to_string(),
                    available: layers
                        .iter()
                        .map(|l| l.table_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })?,
            None => layers
                .first()
                .cloned()
                .ok_or_else(|| Error::NoLayers(self.path.clone()))?,
        };

        let primary_key = self.primary_key(&info.table_name)?;
        let rtree = self.rtree_table(&info)?;

        tracing::debug!(
            layer = %info.table_name,
            geometry_column = %info.geometry_column,
            srs_id = info.srs_id,
            primary_key = %primary_key,
            rtree = rtree.is_some(),
            "Selected GeoPackage layer"
        );

        Ok(GpkgLayer {
            gpkg: self,
            info,
            primary_key,
            rtree,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// CRS metadata for an `srs_id`: WKT definition first, then
    /// `organization:id`
    pub fn crs_for_srs_id(&self, srs_id: i64) -> Result<Option<CrsDefinition>> {
        Ok(self.crs_candidates_for_srs_id(srs_id)?.into_iter().next())
    }

    /// Both CRS descriptions of an `srs_id` that are present, WKT first
    pub fn crs_candidates_for_srs_id(&self, srs_id: i64) -> Result<Vec<CrsDefinition>> {
        let row = self.runtime.block_on(
            sqlx::query(
                "SELECT organization, organization_coordsys_id, definition \
                 FROM gpkg_spatial_ref_sys WHERE srs_id = ?",
            )
            .bind(srs_id)
            .fetch_optional(&self.pool),
        )?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };
        let organization: Option<String> = row.try_get(0)?;
        let coordsys_id: Option<i64> = row.try_get(1)?;
        let definition: Option<String> = row.try_get(2)?;

        let mut candidates = Vec::with_capacity(2);
        if let Some(wkt) = definition
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("undefined"))
        {
            candidates.push(CrsDefinition::Wkt(wkt));
        }
        if let (Some(org), Some(id)) = (organization, coordsys_id) {
            let org = org.trim();
            if !org.is_empty() && !org.eq_ignore_ascii_case("none") && id > 0 {
                candidates.push(CrsDefinition::Identifier(format!("{}:{}", org.to_uppercase(), id)));
            }
        }
        Ok(candidates)
    }

    fn primary_key(&self, table: &str) -> Result<String> {
        let rows = self.runtime.block_on(
            sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
                .fetch_all(&self.pool),
        )?;

        for row in &rows {
            let pk: i64 = row.try_get("pk")?;
            let ty: String = row.try_get("type")?;
            if pk == 1 && ty.eq_ignore_ascii_case("INTEGER") {
                return row.try_get("name").map_err(Error::from);
            }
        }
        Ok("rowid".to_string())
    }

    fn rtree_table(&self, info: &LayerInfo) -> Result<Option<String>> {
        let name = format!("rtree_{}_{}", info.table_name, info.geometry_column);
        let count: i64 = self.runtime.block_on(
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name.as_str())
                .fetch_one(&self.pool),
        )?;
        Ok((count > 0).then_some(name))
    }

    fn fetch(&self, sql: &str, after: i64, filter: Option<Rect<f64>>, limit: usize) -> Result<Vec<SqliteRow>> {
        let mut query = sqlx::query(sql).bind(after);
        if let Some(rect) = filter {
            query = query
                .bind(rect.min().x)
                .bind(rect.max().x)
                .bind(rect.min().y)
                .bind(rect.max().y);
        }
        let rows = self
            .runtime
            .block_on(query.bind(limit as i64).fetch_all(&self.pool))?;
        Ok(rows)
    }
}

impl Drop for GeoPackage {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

/// One feature table of an open GeoPackage
#[derive(Debug)]
pub struct GpkgLayer<'g> {
    gpkg: &'g GeoPackage,
    info: LayerInfo,
    primary_key: String,
    rtree: Option<String>,
    page_size: usize,
}

impl<'g> GpkgLayer<'g> {
    pub fn info(&self) -> &LayerInfo {
        &self.info
    }

    pub fn has_spatial_index(&self) -> bool {
        self.rtree.is_some()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn page_sql(&self, filtered: bool) -> String {
        let table = quote_ident(&self.info.table_name);
        let pk = quote_ident(&self.primary_key);
        let geom = quote_ident(&self.info.geometry_column);

        match (&self.rtree, filtered) {
            (Some(rtree), true) => format!(
                "SELECT t.{pk}, t.{geom} FROM {table} t \
                 JOIN {rtree} r ON r.id = t.{pk} \
                 WHERE t.{pk} > ? AND r.maxx >= ? AND r.minx <= ? AND r.maxy >= ? AND r.miny <= ? \
                 ORDER BY t.{pk} LIMIT ?",
                rtree = quote_ident(rtree),
            ),
            _ => format!(
                "SELECT {pk}, {geom} FROM {table} WHERE {pk} > ? ORDER BY {pk} LIMIT ?"
            ),
        }
    }

    fn fetch_page(&self, after: i64, filter: Option<Rect<f64>>) -> Result<Vec<SourceFeature>> {
        let filter = filter.filter(|_| self.rtree.is_some());
        let sql = self.page_sql(filter.is_some());
        let rows = self.gpkg.fetch(&sql, after, filter, self.page_size)?;

        rows.iter()
            .map(|row| -> Result<SourceFeature> {
                let id: i64 = row.try_get(0)?;
                let blob: Option<Vec<u8>> = row.try_get(1)?;
                Ok(SourceFeature {
                    id: Some(id),
                    geometry: blob.map(|b| decode_blob(id, &b)),
                })
            })
            .collect()
    }
}

fn decode_blob(id: i64, blob: &[u8]) -> FeatureGeometry {
    match decode_gpkg_geometry(blob) {
        Ok((_, geometry)) => geometry,
        Err(e) => {
            tracing::trace!(fid = id, error = %e, "Undecodable geometry blob");
            FeatureGeometry::Unsupported(GeometryKind::Malformed)
        }
    }
}

impl FeatureSource for GpkgLayer<'_> {
    fn crs(&self) -> Result<Option<CrsDefinition>> {
        self.gpkg.crs_for_srs_id(self.info.srs_id)
    }

    fn crs_candidates(&self) -> Result<Vec<CrsDefinition>> {
        self.gpkg.crs_candidates_for_srs_id(self.info.srs_id)
    }

    fn features(&self, filter: Option<Rect<f64>>) -> Result<FeatureIter<'_>> {
        if filter.is_some() && self.rtree.is_none() {
            tracing::debug!(layer = %self.info.table_name, "No spatial index, scanning all features");
        }
        // First page is fetched eagerly so query errors surface here
        let first = self.fetch_page(i64::MIN, filter)?;
        Ok(Box::new(PageCursor::new(self, filter, first)))
    }
}

/// Keyset-paginated cursor over a layer
struct PageCursor<'a> {
    layer: &'a GpkgLayer<'a>,
    filter: Option<Rect<f64>>,
    last_id: i64,
    buffer: std::vec::IntoIter<SourceFeature>,
    exhausted: bool,
}

impl<'a> PageCursor<'a> {
    fn new(layer: &'a GpkgLayer<'a>, filter: Option<Rect<f64>>, first: Vec<SourceFeature>) -> Self {
        let mut cursor = Self {
            layer,
            filter,
            last_id: i64::MIN,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        };
        cursor.load(first);
        cursor
    }

    fn load(&mut self, page: Vec<SourceFeature>) {
        if page.len() < self.layer.page_size {
            self.exhausted = true;
        }
        if let Some(id) = page.last().and_then(|f| f.id) {
            self.last_id = id;
        }
        self.buffer = page.into_iter();
    }
}

impl Iterator for PageCursor<'_> {
    type Item = Result<SourceFeature>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(feature) = self.buffer.next() {
                return Some(Ok(feature));
            }
            if self.exhausted {
                return None;
            }
            match self.layer.fetch_page(self.last_id, self.filter) {
                Ok(page) => self.load(page),
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Quote an SQLite identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
