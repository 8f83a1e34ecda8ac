//! Error types for tree edits and article storage.

use std::path::PathBuf;

use thiserror::Error;

use crate::ops::Path;

/// Errors raised while applying ops to the tree.
///
/// Block operations catch these, roll the transaction back and report a
/// plain `false`.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The operation needs a caret or range and there is none.
    #[error("no selection")]
    NoSelection,

    #[error("no block at {0:?}")]
    NoBlock(Path),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("article not found: {0}")]
    NotFound(String),

    /// Ids become file names, so separators and dot segments are refused.
    #[error("invalid article id: {0:?}")]
    InvalidId(String),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("article {id} is {schema} v{version}, which this build cannot read")]
    Unsupported {
        id: String,
        schema: String,
        version: u32,
    },

    #[error("malformed article {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
