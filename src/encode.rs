use std::collections::HashMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Error;

/// Content type attached to every rendered tile.
pub const MVT_CONTENT_TYPE: &str = "application/x-protobuf";

/// A rendered, wire-ready tile: gzip-compressed MVT payload plus the
/// transport headers the host should attach to the response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileData {
    pub data: Vec<u8>,
    pub content_type: &'static str,
}

impl TileData {
    pub(crate) fn from_raw(raw: &[u8]) -> Result<TileData, Error> {
        Ok(TileData {
            data: gzip(raw)?,
            content_type: MVT_CONTENT_TYPE,
        })
    }

    pub fn headers(&self) -> HashMap<&'static str, &'static str> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type", self.content_type);
        headers.insert("Content-Encoding", "gzip");
        headers
    }
}

/// Compresses a raw tile payload for the wire. An empty payload takes the
/// same path as any other; a tile with no features is still a valid gzip
/// stream, not an error.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(Error::Encoding)?;
    encoder.finish().map_err(Error::Encoding)
}
