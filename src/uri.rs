use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use url::Url;

use crate::error::Error;
use crate::ident::validate_identifier;

/// Scheme under which tile hosts register this source type.
pub const SCHEME: &str = "spatialite";

/// Geometry column assumed when the URI does not name one.
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geometry";

/// The configuration shapes hosts hand over when constructing a source.
///
/// All three normalize to the same path + parameter form before any other
/// logic runs; see [`SourceConfig::from_uri`].
#[derive(Clone, Debug)]
pub enum SourceUri {
    /// A raw URI string, e.g. `spatialite:///data/roads.sqlite?table=roads`.
    Uri(String),
    /// An already-parsed URL.
    Parsed(Url),
    /// A pre-split path and query, as older hosts pass them.
    Parts {
        path: String,
        params: HashMap<String, String>,
    },
}

/// Resolved, validated configuration for one tile source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Absolute location of the backing database.
    pub path: PathBuf,
    /// Source relation. Passed the identifier gate.
    pub table: String,
    /// Geometry-bearing column. Passed the identifier gate.
    pub geometry_column: String,
    /// Layer id stamped on rendered tiles. Only ever embedded as an escaped
    /// string literal, so it is not restricted to the identifier alphabet.
    pub layer_name: String,
}

impl SourceConfig {
    /// Normalizes any accepted URI shape and applies the parameter rules:
    /// `table` is required, `geometry` defaults to
    /// [`DEFAULT_GEOMETRY_COLUMN`], `layer` defaults to the table name.
    ///
    /// Fails with [`Error::MissingTable`] or [`Error::InvalidIdentifier`]
    /// before any connection is attempted.
    pub fn from_uri(uri: SourceUri) -> Result<SourceConfig, Error> {
        let (raw_path, params) = split_uri(uri);

        let table = params.get("table").cloned().ok_or(Error::MissingTable)?;
        validate_identifier("table", &table)?;

        let geometry_column = params
            .get("geometry")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_string());
        validate_identifier("geometry column", &geometry_column)?;

        let layer_name = params
            .get("layer")
            .cloned()
            .unwrap_or_else(|| table.clone());

        Ok(SourceConfig {
            path: resolve_path(&raw_path),
            table,
            geometry_column,
            layer_name,
        })
    }
}

fn split_uri(uri: SourceUri) -> (String, HashMap<String, String>) {
    match uri {
        SourceUri::Uri(raw) => match Url::parse(&raw) {
            Ok(url) => split_parsed(&url),
            // No scheme at all: a bare path with an optional query string.
            Err(_) => match raw.find('?') {
                Some(i) => (raw[..i].to_string(), parse_query(&raw[i + 1..])),
                None => (raw, HashMap::new()),
            },
        },
        SourceUri::Parsed(url) => split_parsed(&url),
        SourceUri::Parts { path, params } => (path, params),
    }
}

fn split_parsed(url: &Url) -> (String, HashMap<String, String>) {
    // `spatialite://./relative.sqlite` parses `.` as the host; rejoin host
    // and path so relative forms survive URL parsing.
    let mut path = url.host_str().unwrap_or("").to_string();
    path.push_str(url.path());
    (path, parse_query(url.query().unwrap_or("")))
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn resolve_path(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if raw.starts_with("./") || raw.starts_with("../") {
        working_dir().join(path)
    } else if path.is_absolute() {
        path.to_path_buf()
    } else if !raw.contains('/') && !raw.contains(MAIN_SEPARATOR) {
        // A bare filename lives in the working directory.
        working_dir().join(path)
    } else {
        // Contains separators but is neither relative nor absolute: a
        // composed-scheme leftover, taken verbatim as the path field of a
        // pre-parsed input.
        path.to_path_buf()
    }
}

fn working_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
