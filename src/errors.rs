#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("URL has an opaque origin and cannot key a partition: {0}")]
    OpaqueOrigin(String),

    #[error("Invalid serialized partition key: {0}")]
    InvalidPartitionKey(String),

    #[error("Partition key with a nonce is transient and cannot be serialized")]
    TransientPartitionKey,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite_cookie_store")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] r2d2_sqlite::rusqlite::Error),

    #[cfg(feature = "sqlite_cookie_store")]
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}
