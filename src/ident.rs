use crate::error::Error;

/// Returns true if `name` is safe to embed in SQL as a bare identifier:
/// non-empty, ASCII letters, digits, and underscore only.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Gate for any user-supplied name that will be interpolated into a query
/// string as a structural identifier. Table and geometry column names must
/// pass through here before they are ever used to build SQL; there is no
/// other defense on that path, since the engine's tile functions require
/// identifiers at the syntax level and cannot take bound parameters.
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<(), Error> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}
