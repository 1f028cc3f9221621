//! Error types for source parsing and discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for source parsing operations.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The Go grammar could not be loaded into the parser.
    #[error("failed to load Go grammar: {message}")]
    Grammar {
        /// Error message.
        message: String,
    },

    /// The parser produced no syntax tree.
    #[error("failed to parse '{}'", path.display())]
    NoTree {
        /// File that failed to parse.
        path: PathBuf,
    },

    /// The file has no package clause.
    #[error("missing package clause in '{}'", path.display())]
    MissingPackage {
        /// File without a package clause.
        path: PathBuf,
    },

    /// No module name was given and none could be inferred.
    #[error("cannot infer module name: no 'module' line in '{}'", path.display())]
    MissingModule {
        /// Manifest that was searched.
        path: PathBuf,
    },

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Creates a grammar loading error.
    pub fn grammar(message: impl Into<String>) -> Self {
        Self::Grammar {
            message: message.into(),
        }
    }

    /// Creates a missing package clause error.
    pub fn missing_package(path: impl Into<PathBuf>) -> Self {
        Self::MissingPackage { path: path.into() }
    }
}
