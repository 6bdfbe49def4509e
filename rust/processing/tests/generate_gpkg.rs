// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end generation from a GeoPackage in ETRS89 / UTM 32N

use std::cell::Cell;
use std::path::{Path, PathBuf};

use csmap_core::{FeatureIter, FeatureSource, GeoPackage, QueryBBox};
use csmap_geometry::{BuiltinProvider, ExtractOptions, Extractor};
use csmap_processing::{generate_with_provider, GenerateRequest, MapStyle};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// ESRI-flavoured WKT without an authority; the EPSG code lives only in
/// `organization` / `organization_coordsys_id`
const ESRI_UTM32_WKT: &str = "PROJCS[\"ETRS_1989_UTM_Zone_32N\",GEOGCS[\"GCS_ETRS_1989\",\
    DATUM[\"D_ETRS_1989\",SPHEROID[\"GRS_1980\",6378137.0,298.257222101]],\
    PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]],\
    PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"False_Easting\",500000.0],\
    PARAMETER[\"False_Northing\",0.0],PARAMETER[\"Central_Meridian\",9.0],\
    PARAMETER[\"Scale_Factor\",0.9996],PARAMETER[\"Latitude_Of_Origin\",0.0],\
    UNIT[\"Meter\",1.0]]";

/// Footprints as (min_x, min_y, width, height) in metres.
///
/// The query box 9.99,53.55,10.0,53.56 projects to a slightly rotated
/// quadrilateral with corners near (565590.9, 5933912.2) SW and
/// (566253.5, 5933921.4) SE, so its bounding rectangle has a sliver below
/// the south edge at the east end.
const FOOTPRINTS: [(f64, f64, f64, f64); 5] = [
    // Near the centre, 20 m x 10 m
    (565_904.0, 5_934_468.0, 20.0, 10.0),
    // Inside, 12 m x 8 m
    (566_000.0, 5_934_600.0, 12.0, 8.0),
    // In the bounding-rectangle sliver, about 3 m south of lat 53.55
    (566_243.0, 5_933_913.0, 8.0, 5.0),
    // Inside but 1 m²
    (565_950.0, 5_934_300.0, 1.0, 1.0),
    // 5 km east, outside the bounding rectangle
    (571_000.0, 5_934_400.0, 20.0, 20.0),
];

fn polygon_blob(x: f64, y: f64, w: f64, h: f64) -> Vec<u8> {
    let mut blob = vec![b'G', b'P', 0, 0b0000_0001];
    blob.extend_from_slice(&25832i32.to_le_bytes());
    blob.push(1);
    blob.extend_from_slice(&3u32.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&5u32.to_le_bytes());
    for (px, py) in [(x, y), (x + w, y), (x + w, y + h), (x, y + h), (x, y)] {
        blob.extend_from_slice(&px.to_le_bytes());
        blob.extend_from_slice(&py.to_le_bytes());
    }
    blob
}

fn write_geopackage(path: &Path) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        let schema = [
            "CREATE TABLE gpkg_spatial_ref_sys (srs_name TEXT, srs_id INTEGER PRIMARY KEY, \
             organization TEXT, organization_coordsys_id INTEGER, definition TEXT, description TEXT)",
            "CREATE TABLE gpkg_contents (table_name TEXT PRIMARY KEY, data_type TEXT, identifier TEXT, \
             srs_id INTEGER)",
            "CREATE TABLE gpkg_geometry_columns (table_name TEXT, column_name TEXT, \
             geometry_type_name TEXT, srs_id INTEGER, z INTEGER, m INTEGER)",
            "INSERT INTO gpkg_contents VALUES ('gebaeude', 'features', 'gebaeude', 25832)",
            "INSERT INTO gpkg_geometry_columns VALUES ('gebaeude', 'geom', 'POLYGON', 25832, 0, 0)",
            "CREATE TABLE gebaeude (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB)",
            "CREATE TABLE rtree_gebaeude_geom (id INTEGER PRIMARY KEY, minx REAL, maxx REAL, \
             miny REAL, maxy REAL)",
        ];
        for sql in schema {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        sqlx::query("INSERT INTO gpkg_spatial_ref_sys VALUES ('ETRS89 / UTM 32N', 25832, 'EPSG', 25832, ?, NULL)")
            .bind(ESRI_UTM32_WKT)
            .execute(&pool)
            .await
            .unwrap();

        for (i, (x, y, w, h)) in FOOTPRINTS.iter().copied().enumerate() {
            let fid = i as i64 + 1;
            sqlx::query("INSERT INTO gebaeude (fid, geom) VALUES (?, ?)")
                .bind(fid)
                .bind(polygon_blob(x, y, w, h))
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO rtree_gebaeude_geom VALUES (?, ?, ?, ?, ?)")
                .bind(fid)
                .bind(x)
                .bind(x + w)
                .bind(y)
                .bind(y + h)
                .execute(&pool)
                .await
                .unwrap();
        }

        pool.close().await;
    });
}

fn fixture() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gebaeude.gpkg");
    write_geopackage(&path);
    (dir, path)
}

fn bbox() -> QueryBBox {
    QueryBBox::parse("9.99,53.55,10.0,53.56").unwrap()
}

#[test]
fn test_generate_from_geopackage() {
    let (dir, input) = fixture();
    let request = GenerateRequest {
        bbox: bbox(),
        out: dir.path().join("maps").join("gebaeude.map"),
        input: Some(input),
        layer: None,
        stub: false,
        extract: ExtractOptions::default(),
        style: MapStyle::default(),
    };

    let mut progress = Vec::new();
    let summary = generate_with_provider(&request, &BuiltinProvider, &mut |n| progress.push(n)).unwrap();
    assert_eq!(summary.boxes, 2);
    assert_eq!(progress, vec![1, 2]);

    let text = std::fs::read_to_string(&summary.out).unwrap();
    assert_eq!(text.lines().filter(|l| *l == "{").count(), 3);
    assert_eq!(text.lines().filter(|l| l.starts_with('(')).count(), 12);
    assert_eq!(text.lines().filter(|l| l.contains(" ROOF/ROOF01 ")).count(), 2);
}

/// Counts the features a source hands out
struct Counting<'a> {
    inner: &'a dyn FeatureSource,
    pulled: Cell<usize>,
}

impl FeatureSource for Counting<'_> {
    fn crs(&self) -> csmap_core::Result<Option<csmap_core::CrsDefinition>> {
        self.inner.crs()
    }

    fn crs_candidates(&self) -> csmap_core::Result<Vec<csmap_core::CrsDefinition>> {
        self.inner.crs_candidates()
    }

    fn features(&self, filter: Option<geo::Rect<f64>>) -> csmap_core::Result<FeatureIter<'_>> {
        let features = self.inner.features(filter)?;
        Ok(Box::new(features.inspect(move |_| self.pulled.set(self.pulled.get() + 1))))
    }
}

#[test]
fn test_spatial_index_narrows_but_exact_test_decides() {
    let (_dir, input) = fixture();
    let gpkg = GeoPackage::open(&input).unwrap();
    let layer = gpkg.layer(None).unwrap();
    assert!(layer.has_spatial_index());

    let source = Counting {
        inner: &layer,
        pulled: Cell::new(0),
    };
    let boxes = Extractor::new(&BuiltinProvider, ExtractOptions::default())
        .extract(&source, &bbox())
        .unwrap();

    // The far footprint never leaves the index; the sliver one does but is dropped
    assert_eq!(source.pulled.get(), 4);
    assert_eq!(boxes.len(), 2);
    assert!(boxes.iter().all(|b| b.is_solid()));
    assert!((boxes[0].width() - 20.0 * 32.0).abs() < 1e-6);
    assert!((boxes[1].depth() - 8.0 * 32.0).abs() < 1e-6);

    let unfiltered = Counting {
        inner: &layer,
        pulled: Cell::new(0),
    };
    let options = ExtractOptions {
        prefilter: false,
        ..Default::default()
    };
    let same = Extractor::new(&BuiltinProvider, options)
        .extract(&unfiltered, &bbox())
        .unwrap();
    assert_eq!(unfiltered.pulled.get(), 5);
    assert_eq!(same, boxes);
}
