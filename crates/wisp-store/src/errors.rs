//! Store errors.

/// Errors from the SQLite persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool failure.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Serialization failure for a JSON column.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure creating the database directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
