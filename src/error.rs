//! Error types for xsd-catalog
//!
//! This module defines all error types used throughout the library.
//! Fetch failures have their own classified type in [`crate::loaders`].

use std::fmt;
use thiserror::Error;

use crate::loaders::FetchError;

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tokenizing and catalog resolution
#[derive(Error, Debug)]
pub enum Error {
    /// Markup the tokenizer could not delimit (unterminated tag, quote, comment...)
    #[error("malformed markup: {0}")]
    Malformed(#[from] ParseError),

    /// A span was longer than the rewind distance of the character source
    #[error("rewind limit exceeded: mark invalidated after {limit} characters")]
    RewindLimit {
        /// Configured maximum rewind distance
        limit: usize,
    },

    /// Classified resource fetch failure
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Catalog file error
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Invalid UTF-8 in the character stream
    #[error("invalid UTF-8 at byte {offset}")]
    Encoding {
        /// Byte offset of the offending sequence
        offset: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Check whether this error came from a fetch the resolver may tolerate
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Fetch(FetchError::Unreachable { .. }))
    }
}

/// Markup error with the character offset where the construct started
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Character offset in the document
    pub offset: Option<u64>,
    /// Document location (URL or path)
    pub location: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
            location: None,
        }
    }

    /// Set the character offset
    pub fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(offset) = self.offset {
            write!(f, " at character {}", offset)?;
        }

        if let Some(ref loc) = self.location {
            write!(f, " in {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}
