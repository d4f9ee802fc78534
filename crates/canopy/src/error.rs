//! Error types for Canopy operations.
//!
//! Problems with individual elements never surface here: they are recovered
//! locally and recorded as warnings on the [`Document`](crate::Document).
//! [`CanopyError`] covers failures of a whole operation.

use std::io;

use thiserror::Error;

use canopy_core::tree::ElementId;
use canopy_parser::error::ParseError;

/// The main error type for Canopy operations.
#[derive(Debug, Error)]
pub enum CanopyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("element {0} is not linked to a scene node")]
    Unlinked(ElementId),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CanopyError {
    /// Create a new `Parse` error with the associated source text.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}
