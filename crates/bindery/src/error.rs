use std::fmt;
use thiserror::Error;

use crate::sync::types::SyncError;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A rejection produced by a model's validate hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The offending attribute, when the validator can name one.
    pub attr: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            attr: None,
            message: message.into(),
        }
    }

    pub fn for_attr(attr: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attr: Some(attr.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attr {
            Some(attr) => write!(f, r#"Validation failed at "{}": {}"#, attr, self.message),
            None => write!(f, "Validation failed: {}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Server response was rejected: {source}")]
    MalformedResponse {
        #[source]
        source: ValidationError,
    },

    #[error("Model has no sync bridge. Configure one with ModelBuilder::bridge().")]
    NoBridge,
}

/// Result alias defaulting to `ModelError`.
pub type Result<T, E = ModelError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
