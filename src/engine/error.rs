//! Engine error taxonomy
//!
//! CircularReference, InvalidItem, and NotFound abort the surrounding
//! transaction and surface unmodified. DepthExceeded is always fatal and
//! never truncated. Unresolvable units are not an error: the normalizer
//! recovers them locally as an estimated canonical-serving fallback.

use thiserror::Error;

use crate::db::DbError;

/// Errors raised by the template expansion and aggregation engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("linking template {child} into template {parent} would create a circular reference")]
    CircularReference { parent: i64, child: i64 },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: i64 },

    #[error("invalid template item: {0}")]
    InvalidItem(String),

    #[error("template expansion exceeded the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Db(DbError::Sqlite(e))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
