//! Animation error types

use std::path::PathBuf;

use thiserror::Error;

/// Animation errors
#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unknown {kind}: {name}")]
    ReferenceError {
        /// What kind of thing was looked up (layer, state, animation, ...)
        kind: &'static str,
        /// The name that failed to resolve
        name: String,
    },

    #[error("Parameter kind mismatch: {parameter}")]
    KindMismatch {
        /// The parameter whose declared kind disagrees with its value
        parameter: String,
    },
}

impl AnimationError {
    /// Shorthand for a [`AnimationError::ReferenceError`].
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::ReferenceError {
            kind,
            name: name.into(),
        }
    }
}

/// Result type for animation operations
pub type AnimationResult<T> = Result<T, AnimationError>;
