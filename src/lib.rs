//! # Spatialite Tiles
//!
//! Tools for serving Mapbox Vector Tiles from SpatiaLite databases.
//!
//! ## Current status
//!
//! This crate should be regarded as stable in terms of code
//! reliability/correctness, but not yet stable in terms of trait and method
//! signatures. We are releasing this code in Rust tradition as 0.x until we
//! feel the interface and feature set have stabilized, but welcome usage and
//! contributions from the Rust GIS community.
//!
//! ## Current features
//!
//! Given a SpatiaLite database and a `spatialite://` source URI naming a
//! table and geometry column, this crate renders Mapbox Vector Tiles on
//! demand and reports TileJSON-style source metadata. Tile hosts construct a
//! [`SpatialiteSource`] from the URI, serve [`TileSource::tile`] responses
//! (gzip payload plus headers), and tear the source down with
//! [`TileSource::close`].
//!
//! ## Known limitations
//!
//! The database is assumed to store geometry in EPSG:3857 web mercator
//! already; projection of source data is not performed here. Tile envelope
//! math, geometry clipping, and MVT assembly are delegated to the engine's
//! spatial functions, so the database must have a SpatiaLite build that
//! provides them. One connection is held per source and queries against it
//! are serialized; pooling is up to the calling application.

#![deny(warnings)]

// TODO: remove once async fn in traits become stable
use async_trait::async_trait;

mod db;
mod encode;
mod error;
mod ident;
mod source;
mod uri;

pub use encode::{TileData, MVT_CONTENT_TYPE};
pub use error::Error;
pub use ident::{is_valid_identifier, validate_identifier};
pub use source::{SourceInfo, SpatialiteSource, VectorLayer};
pub use uri::{SourceConfig, SourceUri, DEFAULT_GEOMETRY_COLUMN, SCHEME};

/// This is the main trait exported by this crate. Tile hosts register a
/// constructor for [`SCHEME`] in their protocol registry and then speak to
/// the source exclusively through this interface.
#[async_trait]
pub trait TileSource {
    /// Renders the vector tile for a slippy map tile in XYZ format.
    ///
    /// An address that intersects no data yields a valid, empty tile rather
    /// than an error.
    async fn tile(&self, zoom: u8, x: u32, y: u32) -> Result<TileData, Error>;

    /// Reports bounds, center, zoom range, and the layer descriptor for the
    /// source. Computed on first call and memoized for the source lifetime.
    async fn info(&self) -> Result<SourceInfo, Error>;

    /// Releases the underlying connection. Idempotent; failures are
    /// returned, never panicked.
    async fn close(&self) -> Result<(), Error>;
}
