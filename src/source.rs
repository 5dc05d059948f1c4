use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, Row};
use tokio::sync::{Mutex, OnceCell};

use crate::db;
use crate::encode::TileData;
use crate::error::Error;
use crate::uri::{SourceConfig, SourceUri};

/// Zoom range advertised by every source. The range is fixed rather than
/// derived from data.
const MIN_ZOOM: u8 = 0;
const MAX_ZOOM: u8 = 14;

/// Display zoom paired with the bounds midpoint in `center`.
const CENTER_ZOOM: f64 = 12.0;

const TILE_FORMAT: &str = "pbf";

/// Source-level metadata in TileJSON field spelling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceInfo {
    /// Geographic bounds as `[min_lon, min_lat, max_lon, max_lat]`.
    pub bounds: [f64; 4],
    /// `[lon, lat, zoom]`: the bounds midpoint at the default display zoom.
    pub center: [f64; 3],
    #[serde(rename = "minzoom")]
    pub min_zoom: u8,
    #[serde(rename = "maxzoom")]
    pub max_zoom: u8,
    pub format: String,
    pub vector_layers: Vec<VectorLayer>,
}

/// Layer descriptor advertised alongside the bounds. Per-field metadata is
/// not derived from the schema; `fields` stays empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VectorLayer {
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// One configured tile source backed by a SpatiaLite database.
///
/// The connection handle is exclusively owned and serialized behind a mutex;
/// the engine does not support overlapping query execution on one handle.
/// The attribute-column list and the metadata document are each computed once
/// per source and memoized, with concurrent first callers sharing a single
/// in-flight computation.
#[derive(Debug)]
pub struct SpatialiteSource {
    config: SourceConfig,
    conn: Mutex<Option<SqliteConnection>>,
    columns: OnceCell<Vec<String>>,
    info: OnceCell<SourceInfo>,
}

impl SpatialiteSource {
    /// Resolves and validates `uri`, opens the database read-only with the
    /// spatial extension, and verifies the configured table and geometry
    /// column. The source is fully initialized when this returns; a schema
    /// failure after the connection opened closes it again before surfacing
    /// the error.
    pub async fn connect(uri: SourceUri) -> Result<SpatialiteSource, Error> {
        let config = SourceConfig::from_uri(uri)?;
        let mut conn = db::open(&config.path).await?;
        if let Err(err) =
            db::verify_schema(&mut conn, &config.table, &config.geometry_column).await
        {
            let _ = conn.close().await;
            return Err(err);
        }

        Ok(SpatialiteSource {
            config,
            conn: Mutex::new(Some(conn)),
            columns: OnceCell::new(),
            info: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Renders the tile at `zoom`/`x`/`y` as a compressed vector-tile
    /// payload.
    ///
    /// A tile that intersects no geometry is a success: the engine matches
    /// no rows and the payload encodes an empty tile. Addresses beyond the
    /// zoom level's theoretical range take the same path.
    pub async fn tile(&self, zoom: u8, x: u32, y: u32) -> Result<TileData, Error> {
        let columns = self.columns().await?;
        let sql = tile_query(&self.config, columns, zoom, x, y);
        debug!("rendering {}/{}/{} from {:?}", zoom, x, y, self.config.table);

        let raw = {
            let mut guard = self.conn.lock().await;
            let conn = guard.as_mut().ok_or(Error::Closed)?;
            let row = sqlx::query(&sql)
                .fetch_optional(&mut *conn)
                .await
                .map_err(Error::Query)?;
            match row {
                Some(row) => row
                    .try_get::<Option<Vec<u8>>, _>(0)
                    .map_err(Error::Query)?
                    .unwrap_or_default(),
                None => Vec::new(),
            }
        };

        TileData::from_raw(&raw)
    }

    /// Bounds, center, zoom range, and layer descriptor for this source.
    ///
    /// Computed once by querying the geometry extent and transforming it to
    /// geographic coordinates; later calls return the memoized value without
    /// touching the database. An empty table, or one whose geometry is all
    /// NULL, fails with [`Error::NoData`].
    pub async fn info(&self) -> Result<&SourceInfo, Error> {
        self.info
            .get_or_try_init(|| async {
                let sql = bounds_query(&self.config);
                debug!("computing bounds of {:?}", self.config.table);

                let mut guard = self.conn.lock().await;
                let conn = guard.as_mut().ok_or(Error::Closed)?;
                let row = sqlx::query(&sql)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(Error::Query)?
                    .ok_or(Error::NoData)?;

                let mut bounds = [0.0; 4];
                for (i, slot) in bounds.iter_mut().enumerate() {
                    *slot = row
                        .try_get::<Option<f64>, _>(i)
                        .map_err(Error::Query)?
                        .ok_or(Error::NoData)?;
                }

                Ok(SourceInfo {
                    bounds,
                    center: center_of(bounds),
                    min_zoom: MIN_ZOOM,
                    max_zoom: MAX_ZOOM,
                    format: TILE_FORMAT.to_string(),
                    vector_layers: vec![VectorLayer {
                        id: self.config.layer_name.clone(),
                        fields: HashMap::new(),
                    }],
                })
            })
            .await
    }

    /// Releases the connection. Safe to call repeatedly; a second close is a
    /// no-op. A failure from the engine comes back as [`Error::Close`], not
    /// a panic.
    pub async fn close(&self) -> Result<(), Error> {
        let conn = self.conn.lock().await.take();
        match conn {
            Some(conn) => conn.close().await.map_err(Error::Close),
            None => Ok(()),
        }
    }

    async fn columns(&self) -> Result<&[String], Error> {
        let columns = self
            .columns
            .get_or_try_init(|| async {
                let mut guard = self.conn.lock().await;
                let conn = guard.as_mut().ok_or(Error::Closed)?;
                db::table_columns(conn, &self.config.table, &self.config.geometry_column).await
            })
            .await?;
        Ok(columns.as_slice())
    }
}

#[async_trait]
impl crate::TileSource for SpatialiteSource {
    async fn tile(&self, zoom: u8, x: u32, y: u32) -> Result<TileData, Error> {
        SpatialiteSource::tile(self, zoom, x, y).await
    }

    async fn info(&self) -> Result<SourceInfo, Error> {
        SpatialiteSource::info(self).await.cloned()
    }

    async fn close(&self) -> Result<(), Error> {
        SpatialiteSource::close(self).await
    }
}

fn center_of(bounds: [f64; 4]) -> [f64; 3] {
    [
        (bounds[0] + bounds[2]) / 2.0,
        (bounds[1] + bounds[3]) / 2.0,
        CENTER_ZOOM,
    ]
}

// Names reaching the query builders have passed the identifier gate, so the
// quoting itself is the only escaping an identifier needs.
fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One-shot extent query behind `info()`: aggregate the geometry extent in
/// the working projection and transform it to longitude/latitude.
fn bounds_query(config: &SourceConfig) -> String {
    format!(
        "SELECT MbrMinX(extent), MbrMinY(extent), MbrMaxX(extent), MbrMaxY(extent) \
         FROM (SELECT ST_Transform(Extent({geometry}), 4326) AS extent FROM {table})",
        geometry = quote_identifier(&config.geometry_column),
        table = quote_identifier(&config.table),
    )
}

/// Per-request tile query. Every row intersecting the tile envelope is
/// converted into tile-local space and assembled, together with its
/// attribute columns, into a single MVT blob tagged with the layer name.
/// `ST_Reverse` corrects ring winding after the tile-space conversion: the
/// Mercator-to-tile Y flip inverts winding relative to what the output
/// format requires.
fn tile_query(config: &SourceConfig, columns: &[String], zoom: u8, x: u32, y: u32) -> String {
    let geometry = quote_identifier(&config.geometry_column);
    let envelope = format!("ST_TileEnvelope({zoom}, {x}, {y})");

    let mut fields = vec![format!(
        "ST_Reverse(ST_AsMVTGeom({geometry}, {envelope})) AS mvtgeometry"
    )];
    fields.extend(columns.iter().map(|name| quote_identifier(name)));

    format!(
        "SELECT ST_AsMVT(tile, {layer}) FROM \
         (SELECT {fields} FROM {table} WHERE ST_Intersects({geometry}, {envelope})) AS tile",
        layer = quote_literal(&config.layer_name),
        fields = fields.join(", "),
        table = quote_identifier(&config.table),
    )
}
