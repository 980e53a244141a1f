//! Error types for the reflgen-core library.
//!
//! Every failure is fatal for the whole run: the generator validates and renders
//! all of its output in memory before it touches the output directory, so an
//! error never leaves per-type units out of sync with the dispatch unit.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reflgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all reflgen operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A descriptor document or generator setting is malformed
    #[error("invalid configuration in '{source_name}' ({field}): {message}")]
    Config {
        /// Document (or setting group) the problem was found in
        source_name: String,
        /// Offending field, e.g. `post[2].header`
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// A descriptor document is not valid JSON
    #[error("failed to parse descriptor document '{path}': {source}")]
    Json {
        /// Path to the document
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Two types normalize to the same generated identifier
    #[error("generated identifier '{identifier}' is ambiguous: both '{first}' and '{second}' map to it")]
    IdentifierCollision {
        /// The colliding identifier
        identifier: String,
        /// Qualified name that claimed the identifier first
        first: String,
        /// Qualified name that collided with it
        second: String,
    },

    /// The parser capability reported fatal diagnostics for a header
    #[error("failed to parse '{path}': {}", .messages.join("; "))]
    Parse {
        /// Header that could not be parsed
        path: PathBuf,
        /// Fatal diagnostic messages
        messages: Vec<String>,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A mirrored output path would land outside the output directory
    #[error("path traversal detected: '{path}' would escape output directory")]
    PathTraversal {
        /// The suspicious path
        path: PathBuf,
    },
}

impl Error {
    /// Creates a new configuration error
    pub fn config(
        source_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Config {
            source_name: source_name.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error for a required field that is absent or empty
    pub fn missing_field(source_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::config(source_name, field, "required field is missing or empty")
    }

    /// Creates a new JSON document error
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Creates a new identifier collision error
    pub fn identifier_collision(
        identifier: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::IdentifierCollision {
            identifier: identifier.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Creates a new parse error
    pub fn parse(path: impl Into<PathBuf>, messages: Vec<String>) -> Self {
        Self::Parse {
            path: path.into(),
            messages,
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new path traversal error
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Returns true for errors caused by the descriptor inputs rather than headers or I/O
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Json { .. } | Self::IdentifierCollision { .. }
        )
    }
}
