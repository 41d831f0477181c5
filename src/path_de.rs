//! Description loading with JSON-path context in error messages.
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::errors::SchemaError;
use crate::schema::Schema;
use crate::schema::describe::Description;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DescriptionError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DescriptionError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DescriptionError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DescriptionError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Parse a JSON description and build the live schema.
pub fn schema_from_str(src: &str) -> Result<Schema, DescriptionError> {
    let desc: Description = from_str_with_path(src)?;
    Ok(Schema::build(&desc)?)
}

pub fn load_schema(path: &Path) -> Result<Schema, DescriptionError> {
    let bytes = std::fs::read(path).map_err(|source| DescriptionError::Read { path: path.to_path_buf(), source })?;
    let desc: Description = from_slice_with_path(&bytes)?;
    Ok(Schema::build(&desc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_the_offending_path() {
        let err = schema_from_str(r#"{"type": "alternatives", "matches": [{"schema": {"type": "bool"}}]}"#)
            .unwrap_err();
        match err {
            DescriptionError::Parse { path, .. } => assert_eq!(path, "matches[0].schema.type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn build_errors_surface_as_schema_errors() {
        let err = schema_from_str(r#"{"type": "alternatives", "matches": [{}]}"#).unwrap_err();
        assert!(matches!(err, DescriptionError::Schema(SchemaError::Description(_))));
        assert!(schema_from_str(r#"{"type": "boolean", "truthy": ["Y"]}"#).is_ok());
    }
}
