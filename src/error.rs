//! Gemara store error types

use std::path::PathBuf;
use thiserror::Error;

/// Gemara store error type
#[derive(Error, Debug)]
pub enum Error {
    /// Layer number outside the supported range
    #[error("invalid layer: {0} (must be {min}-{max})", min = crate::layer::MIN_LAYER, max = crate::layer::MAX_LAYER)]
    InvalidLayer(u32),

    /// Document carries no `metadata.id`
    #[error("metadata.id is required in artifact content")]
    MissingId,

    /// Id cannot be used as a file name
    #[error("invalid artifact id: {0:?}")]
    InvalidId(String),

    /// No index entry for the requested artifact
    #[error("artifact not found: layer {layer}, id {id}")]
    NotFound { layer: u32, id: String },

    /// Stored artifact could not be read or parsed
    #[error("failed to load artifact at {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// Submitted content is not well-formed YAML/JSON
    #[error("parse error: {0}")]
    Parse(String),

    /// Schema fragments could not be fetched, composed or compiled
    #[error("schema error: {0}")]
    Schema(String),

    /// Document does not satisfy its layer schema
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },

    /// Schema fragment source unreachable or returned a non-success status
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Schema fragment payload could not be read
    #[error("read error: {0}")]
    Read(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error; malformed input is reported as `Parse`
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse error classes for callers that render user-facing guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller's input is malformed; retry after correcting it
    Input,
    /// The requested artifact does not exist
    NotFound,
    /// The service could not do its job (schema, disk, network)
    Service,
}

impl Error {
    /// Classify the error for upstream rendering.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidLayer(_)
            | Error::MissingId
            | Error::InvalidId(_)
            | Error::Parse(_)
            | Error::Validation { .. } => ErrorClass::Input,
            Error::NotFound { .. } => ErrorClass::NotFound,
            Error::Load { .. }
            | Error::Schema(_)
            | Error::Fetch(_)
            | Error::Read(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Yaml(_)
            | Error::Serialization(_)
            | Error::Http(_) => ErrorClass::Service,
        }
    }
}

/// Result type alias for Gemara store operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_layer_message() {
        let err = Error::InvalidLayer(9);
        assert_eq!(err.to_string(), "invalid layer: 9 (must be 1-4)");
        assert_eq!(err.class(), ErrorClass::Input);
    }

    #[test]
    fn test_classes() {
        let not_found = Error::NotFound {
            layer: 2,
            id: "ccc".to_string(),
        };
        assert_eq!(not_found.class(), ErrorClass::NotFound);
        assert_eq!(not_found.to_string(), "artifact not found: layer 2, id ccc");

        assert_eq!(
            Error::Schema("no entry point".into()).class(),
            ErrorClass::Service
        );
        assert_eq!(Error::MissingId.class(), ErrorClass::Input);
        assert_eq!(Error::Parse("bad".into()).class(), ErrorClass::Input);
    }

    #[test]
    fn test_yaml_serialization_is_a_service_error() {
        let yaml_err = serde_yaml::from_str::<u32>("[").unwrap_err();
        assert_eq!(Error::from(yaml_err).class(), ErrorClass::Service);
    }
}
