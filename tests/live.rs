//! Integration tests against a live SpatiaLite database.
//!
//! Each test bootstraps its own fixture into a temp directory, which needs
//! `mod_spatialite` to be loadable on the host. The suite is ignored by
//! default for that reason; run it with `cargo test -- --ignored`.

use std::io::Read;
use std::path::{Path, PathBuf};

use assert_approx_eq::assert_approx_eq;
use flate2::read::GzDecoder;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;

use spatialite_tiles::{Error, SourceUri, SpatialiteSource, TileSource};

/// Creates a SpatiaLite database holding a `points` table with the given
/// web mercator coordinates.
async fn fixture(dir: &TempDir, rows: &[(f64, f64, &str)]) -> PathBuf {
    let path = dir.path().join("fixture.sqlite");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .extension("mod_spatialite");
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();

    sqlx::query("SELECT InitSpatialMetaData(1)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE points (id INTEGER PRIMARY KEY, name TEXT)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("SELECT AddGeometryColumn('points', 'geometry', 3857, 'POINT', 'XY')")
        .execute(&mut conn)
        .await
        .unwrap();

    for (i, (x, y, name)) in rows.iter().enumerate() {
        sqlx::query("INSERT INTO points (id, name, geometry) VALUES (?, ?, MakePoint(?, ?, 3857))")
            .bind((i + 1) as i64)
            .bind(*name)
            .bind(*x)
            .bind(*y)
            .execute(&mut conn)
            .await
            .unwrap();
    }

    conn.close().await.unwrap();
    path
}

fn uri(path: &Path) -> SourceUri {
    SourceUri::Uri(format!("spatialite://{}?table=points", path.display()))
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

#[tokio::test]
#[ignore]
async fn info_reports_geographic_bounds_and_midpoint_center() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, &[(0.0, 0.0, "a"), (1_000_000.0, 1_000_000.0, "b")]).await;
    let source = SpatialiteSource::connect(uri(&path)).await.unwrap();

    let info = source.info().await.unwrap();
    assert!(info.bounds[0] <= info.bounds[2]);
    assert!(info.bounds[1] <= info.bounds[3]);
    // 1,000,000m east of the meridian is just under 9 degrees of longitude.
    assert_approx_eq!(info.bounds[0], 0.0, 1e-6);
    assert_approx_eq!(info.bounds[2], 8.983152, 1e-3);
    assert_eq!(info.center[0], (info.bounds[0] + info.bounds[2]) / 2.0);
    assert_eq!(info.center[1], (info.bounds[1] + info.bounds[3]) / 2.0);
    assert_eq!(info.center[2], 12.0);
    assert_eq!(info.min_zoom, 0);
    assert_eq!(info.max_zoom, 14);
    assert_eq!(info.format, "pbf");
    assert_eq!(info.vector_layers.len(), 1);
    assert_eq!(info.vector_layers[0].id, "points");
    assert!(info.vector_layers[0].fields.is_empty());
}

#[tokio::test]
#[ignore]
async fn info_is_computed_once() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, &[(0.0, 0.0, "a")]).await;
    let source = SpatialiteSource::connect(uri(&path)).await.unwrap();

    let first = source.info().await.unwrap() as *const _;
    let second = source.info().await.unwrap() as *const _;
    assert_eq!(first, second);

    // The memoized value survives without a connection at all.
    source.close().await.unwrap();
    assert!(source.info().await.is_ok());
}

#[tokio::test]
#[ignore]
async fn empty_table_has_no_bounds() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, &[]).await;
    let source = SpatialiteSource::connect(uri(&path)).await.unwrap();

    assert!(matches!(source.info().await, Err(Error::NoData)));
}

#[tokio::test]
#[ignore]
async fn tiles_render_data_and_empty_addresses_alike() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, &[(0.0, 0.0, "origin")]).await;
    let source = SpatialiteSource::connect(uri(&path)).await.unwrap();

    let tile = source.tile(0, 0, 0).await.unwrap();
    assert_eq!(tile.content_type, "application/x-protobuf");
    assert!(!gunzip(&tile.data).is_empty());

    // A tile far from any data decompresses cleanly to nothing.
    let far = source.tile(14, 16383, 16383).await.unwrap();
    assert!(gunzip(&far.data).is_empty());
}

#[tokio::test]
#[ignore]
async fn schema_verification_runs_at_connect() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, &[(0.0, 0.0, "a")]).await;

    let err = SpatialiteSource::connect(SourceUri::Uri(format!(
        "spatialite://{}?table=rivers",
        path.display()
    )))
    .await
    .unwrap_err();
    assert!(matches!(err, Error::TableNotFound(_)));

    let err = SpatialiteSource::connect(SourceUri::Uri(format!(
        "spatialite://{}?table=points&geometry=geom",
        path.display()
    )))
    .await
    .unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound(_)));
}

#[tokio::test]
#[ignore]
async fn close_is_idempotent_and_terminal() {
    let dir = TempDir::new().unwrap();
    let path = fixture(&dir, &[(0.0, 0.0, "a")]).await;
    let source = SpatialiteSource::connect(uri(&path)).await.unwrap();

    // Through the host-facing trait, like a tile server would call it.
    TileSource::close(&source).await.unwrap();
    TileSource::close(&source).await.unwrap();

    assert!(matches!(source.tile(0, 0, 0).await, Err(Error::Closed)));
}
