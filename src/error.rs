/// Errors surfaced by a SpatiaLite tile source.
///
/// Construction can fail with any of `MissingTable` through `ColumnNotFound`;
/// the remaining variants belong to the per-request paths. Every failure is
/// returned through the operation's `Result`; nothing in this crate panics
/// across an await point.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("source URI has no 'table' parameter")]
    MissingTable,

    #[error("invalid {kind} identifier: {name:?}")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("unable to open database")]
    Connection(#[source] sqlx::Error),

    #[error("no such table: {0:?}")]
    TableNotFound(String),

    #[error("no such geometry column: {0:?}")]
    ColumnNotFound(String),

    #[error("table contains no geometry to compute bounds from")]
    NoData,

    #[error("tile query failed")]
    Query(#[source] sqlx::Error),

    #[error("unable to compress tile payload")]
    Encoding(#[source] std::io::Error),

    #[error("unable to close database")]
    Close(#[source] sqlx::Error),

    #[error("source has been closed")]
    Closed,
}
