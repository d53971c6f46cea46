use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum NormgraphError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Reference to {ident} at {path} has no entity in the database")]
    DanglingReference { path: String, ident: String },
    #[error("Normalization exceeded the maximum entity depth of {0}")]
    DepthExceeded(usize),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Malformed ident: {0}")]
    MalformedIdent(String),
    #[error("Query for component '{0}' carries no ident annotation")]
    MissingAnnotation(String),
    #[error("Ident field {field} is absent or null in props")]
    MissingIdentField { field: String },
    #[error("Value at {0} is not a reference list")]
    NotAReferenceList(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Index {index} is out of bounds for the list of length {len} at {path}")]
    OutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("Path does not resolve to an existing location: {0}")]
    PathNotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl NormgraphError {
    /// Errors that invalidate an ident resolution. Under a best-effort policy the normalizer
    /// turns these into diagnostics and keeps going.
    pub fn is_ident_error(&self) -> bool {
        matches!(
            self,
            NormgraphError::MalformedIdent(_) | NormgraphError::MissingIdentField { .. }
        )
    }
}

impl From<JsonError> for NormgraphError {
    fn from(src: JsonError) -> NormgraphError {
        NormgraphError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for NormgraphError {
    fn from(src: toml::de::Error) -> NormgraphError {
        NormgraphError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for NormgraphError {
    fn from(src: toml::ser::Error) -> NormgraphError {
        NormgraphError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<uuid::Error> for NormgraphError {
    fn from(src: uuid::Error) -> NormgraphError {
        NormgraphError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for NormgraphError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => NormgraphError::NotFound(format!("{x}")),
            _ => NormgraphError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for NormgraphError {
    fn from(x: fmt::Error) -> Self {
        NormgraphError::Serialization(format!("{x}"))
    }
}
