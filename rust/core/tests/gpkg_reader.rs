// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoPackage reader against a small fixture written with sqlx

use std::path::Path;

use csmap_core::{CrsDefinition, Error, FeatureGeometry, FeatureSource, GeoPackage};
use geo::{coord, Rect};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Little-endian GeoPackage blob holding a unit-ish square at `(x, y)`
fn square_blob(srs_id: i32, x: f64, y: f64, size: f64) -> Vec<u8> {
    let mut blob = vec![b'G', b'P', 0, 0b0000_0001];
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.push(1);
    blob.extend_from_slice(&3u32.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&5u32.to_le_bytes());
    for (px, py) in [(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)] {
        blob.extend_from_slice(&px.to_le_bytes());
        blob.extend_from_slice(&py.to_le_bytes());
    }
    blob
}

fn point_blob(srs_id: i32) -> Vec<u8> {
    let mut blob = vec![b'G', b'P', 0, 0b0000_0001];
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.push(1);
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&1.0f64.to_le_bytes());
    blob.extend_from_slice(&2.0f64.to_le_bytes());
    blob
}

fn write_fixture(path: &Path, with_layers: bool) {
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
            "INSERT INTO gpkg_spatial_ref_sys VALUES ('ETRS89 / UTM 32N', 25832, 'epsg', 25832, 'undefined', NULL)",
            "INSERT INTO gpkg_spatial_ref_sys VALUES ('WGS 84', 4326, 'EPSG', 4326, \
             'GEOGCS[\"WGS 84\",AUTHORITY[\"EPSG\",\"4326\"]]', NULL)",
            "INSERT INTO gpkg_spatial_ref_sys VALUES ('Undefined', 0, 'NONE', 0, 'undefined', NULL)",
        ];
        for sql in schema {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        if with_layers {
            let layers = [
                "INSERT INTO gpkg_contents VALUES ('buildings', 'features', 'buildings', 25832)",
                "INSERT INTO gpkg_contents VALUES ('tiles', 'tiles', 'tiles', 25832)",
                "INSERT INTO gpkg_contents VALUES ('parcels', 'features', 'parcels', 4326)",
                "INSERT INTO gpkg_geometry_columns VALUES ('buildings', 'geom', 'POLYGON', 25832, 0, 0)",
                "INSERT INTO gpkg_geometry_columns VALUES ('parcels', 'shape', 'POLYGON', 4326, 0, 0)",
                "CREATE TABLE buildings (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB, name TEXT)",
                "CREATE TABLE parcels (shape BLOB)",
                "CREATE TABLE rtree_buildings_geom (id INTEGER PRIMARY KEY, minx REAL, maxx REAL, \
                 miny REAL, maxy REAL)",
            ];
            for sql in layers {
                sqlx::query(sql).execute(&pool).await.unwrap();
            }

            // fids 1..=5 at x = 0, 100, 200, 300, 400; fid 3 has no geometry, fid 5 is a point
            for i in 0..5i64 {
                let x = i as f64 * 100.0;
                let blob = match i {
                    2 => None,
                    4 => Some(point_blob(25832)),
                    _ => Some(square_blob(25832, x, 0.0, 10.0)),
                };
                sqlx::query("INSERT INTO buildings (geom, name) VALUES (?, ?)")
                    .bind(blob)
                    .bind(format!("b{}", i))
                    .execute(&pool)
                    .await
                    .unwrap();
                sqlx::query("INSERT INTO rtree_buildings_geom VALUES (?, ?, ?, ?, ?)")
                    .bind(i + 1)
                    .bind(x)
                    .bind(x + 10.0)
                    .bind(0.0)
                    .bind(10.0)
                    .execute(&pool)
                    .await
                    .unwrap();
            }

            sqlx::query("INSERT INTO parcels (shape) VALUES (?)")
                .bind(square_blob(4326, 10.0, 53.0, 0.001))
                .execute(&pool)
                .await
                .unwrap();
        }

        pool.close().await;
    });
}

fn fixture(with_layers: bool) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.gpkg");
    write_fixture(&path, with_layers);
    (dir, path)
}

#[test]
fn test_layers_in_contents_order() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();
    let names: Vec<_> = gpkg
        .layers()
        .unwrap()
        .into_iter()
        .map(|l| l.table_name)
        .collect();
    assert_eq!(names, vec!["buildings", "parcels"]);

    let first = gpkg.layer(None).unwrap();
    assert_eq!(first.info().table_name, "buildings");
    assert_eq!(first.info().geometry_column, "geom");
    assert!(first.has_spatial_index());

    let parcels = gpkg.layer(Some("parcels")).unwrap();
    assert!(!parcels.has_spatial_index());
}

#[test]
fn test_unknown_layer_lists_available() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();
    match gpkg.layer(Some("roads")).unwrap_err() {
        Error::LayerNotFound { layer, available } => {
            assert_eq!(layer, "roads");
            assert_eq!(available, "buildings, parcels");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_empty_geopackage_has_no_layers() {
    let (_dir, path) = fixture(false);
    let gpkg = GeoPackage::open(&path).unwrap();
    assert!(gpkg.layers().unwrap().is_empty());
    assert!(matches!(gpkg.layer(None).unwrap_err(), Error::NoLayers(_)));
}

#[test]
fn test_crs_resolution() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();

    let buildings = gpkg.layer(Some("buildings")).unwrap();
    assert_eq!(
        buildings.crs().unwrap(),
        Some(CrsDefinition::Identifier("EPSG:25832".to_string()))
    );

    let parcels = gpkg.layer(Some("parcels")).unwrap();
    match parcels.crs().unwrap() {
        Some(CrsDefinition::Wkt(wkt)) => assert!(wkt.starts_with("GEOGCS[\"WGS 84\"")),
        other => panic!("expected WKT, got {:?}", other),
    }
    let candidates = parcels.crs_candidates().unwrap();
    assert_eq!(candidates.len(), 2);
    assert!(matches!(&candidates[0], CrsDefinition::Wkt(_)));
    assert_eq!(candidates[1], CrsDefinition::Identifier("EPSG:4326".to_string()));
    assert_eq!(
        buildings.crs_candidates().unwrap(),
        vec![CrsDefinition::Identifier("EPSG:25832".to_string())]
    );

    assert_eq!(gpkg.crs_for_srs_id(0).unwrap(), None);
    assert_eq!(gpkg.crs_for_srs_id(999).unwrap(), None);
    assert!(gpkg.crs_candidates_for_srs_id(0).unwrap().is_empty());
}

#[test]
fn test_paging_yields_every_feature_in_order() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();
    let layer = gpkg.layer(None).unwrap().with_page_size(2);

    let features: Vec<_> = layer
        .features(None)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let ids: Vec<_> = features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);

    assert!(matches!(features[0].geometry, Some(FeatureGeometry::Polygon(_))));
    assert!(features[2].geometry.is_none());
    assert!(matches!(
        features[4].geometry,
        Some(FeatureGeometry::Unsupported(_))
    ));
}

#[test]
fn test_early_stop_is_allowed() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();
    let layer = gpkg.layer(None).unwrap().with_page_size(1);
    let first_two: Vec<_> = layer.features(None).unwrap().take(2).collect();
    assert_eq!(first_two.len(), 2);
}

#[test]
fn test_rtree_filter_is_pushed_down() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();
    let layer = gpkg.layer(None).unwrap().with_page_size(1);

    let rect = Rect::new(coord! { x: 95.0, y: -5.0 }, coord! { x: 205.0, y: 5.0 });
    let ids: Vec<_> = layer
        .features(Some(rect))
        .unwrap()
        .map(|f| f.unwrap().id)
        .collect();
    assert_eq!(ids, vec![Some(2), Some(3)]);
}

#[test]
fn test_filter_without_index_scans_everything() {
    let (_dir, path) = fixture(true);
    let gpkg = GeoPackage::open(&path).unwrap();
    let layer = gpkg.layer(Some("parcels")).unwrap();

    let far_away = Rect::new(coord! { x: -50.0, y: -50.0 }, coord! { x: -40.0, y: -40.0 });
    assert_eq!(layer.features(Some(far_away)).unwrap().count(), 1);
}
