use std::path::Path;

use futures::TryStreamExt;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};

use crate::error::Error;

/// Name of the engine extension providing the spatial SQL surface.
const SPATIAL_EXTENSION: &str = "mod_spatialite";

/// Opens the backing database read-only with the spatial extension loaded.
/// A missing or unreadable file, and a failed extension load, both surface
/// as [`Error::Connection`].
pub async fn open(path: &Path) -> Result<SqliteConnection, Error> {
    debug!("opening {} read-only", path.display());
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .extension(SPATIAL_EXTENSION);
    SqliteConnection::connect_with(&options)
        .await
        .map_err(Error::Connection)
}

/// Checks that the configured table and geometry column exist before the
/// source is handed to callers. Both probes bind the names as parameters;
/// the identifier gate is only needed on the query-construction path, where
/// names are embedded structurally.
pub async fn verify_schema(
    conn: &mut SqliteConnection,
    table: &str,
    geometry_column: &str,
) -> Result<(), Error> {
    let table_row = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
    )
    .bind(table)
    .fetch_optional(&mut *conn)
    .await
    .map_err(Error::Connection)?;
    if table_row.is_none() {
        return Err(Error::TableNotFound(table.to_string()));
    }

    let column_row = sqlx::query("SELECT name FROM pragma_table_info(?) WHERE name = ?")
        .bind(table)
        .bind(geometry_column)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::Connection)?;
    if column_row.is_none() {
        return Err(Error::ColumnNotFound(geometry_column.to_string()));
    }

    Ok(())
}

/// All columns of `table` except the geometry column, in declaration order.
/// These become the attribute set of every rendered tile.
pub async fn table_columns(
    conn: &mut SqliteConnection,
    table: &str,
    geometry_column: &str,
) -> Result<Vec<String>, Error> {
    let mut rows =
        sqlx::query("SELECT name FROM pragma_table_info(?) WHERE name <> ? ORDER BY cid")
            .bind(table)
            .bind(geometry_column)
            .fetch(&mut *conn);

    let mut columns = Vec::new();
    while let Some(row) = rows.try_next().await.map_err(Error::Query)? {
        columns.push(row.try_get("name").map_err(Error::Query)?);
    }
    Ok(columns)
}
