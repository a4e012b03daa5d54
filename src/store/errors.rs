//! Store error types
//!
//! Every expected failure mode surfaces as a structured `StoreError` at
//! the operation boundary; callers branch on the `Result`, never on
//! panics. Each variant carries a stable string code for callers that
//! dispatch on codes rather than variants.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Expected failure modes of store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A `null` record was passed to insert or update
    #[error("cannot insert a null record")]
    NullRecord,

    /// The record lacks the configured identity field
    #[error("record is missing identity field `{id_key}`")]
    MissingIdKey {
        /// The configured identity field name
        id_key: String,
    },

    /// A `unique` index already holds a live mapping for this key
    #[error("duplicate key `{key}` on unique index `{path}`")]
    DuplicateKey {
        /// The offending index path
        path: String,
        /// The colliding key value
        key: String,
    },

    /// `update` was invoked against a non-unique (or unknown) index path
    #[error("update requires a unique index, but `{path}` is not unique")]
    NotUnique {
        /// The rejected index path
        path: String,
    },

    /// `update` found no live record and `upsert` was not set
    #[error("update cannot find a live record for key `{key}` on `{path}`")]
    NotFound {
        /// The index path that was searched
        path: String,
        /// The key that matched nothing
        key: String,
    },

    /// An index already exists for this path
    #[error("index `{path}` already exists")]
    IndexExists {
        /// The redefined path
        path: String,
    },
}

impl StoreError {
    /// Returns the stable string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NullRecord | StoreError::MissingIdKey { .. } => "ERR_VALIDATION",
            StoreError::DuplicateKey { .. } => "ERR_DUPLICATE",
            StoreError::NotUnique { .. } => "ERR_INVALID_OP",
            StoreError::NotFound { .. } => "ERR_NOT_FOUND",
            StoreError::IndexExists { .. } => "ERR_INDEX_EXISTS",
        }
    }
}
