use thiserror::Error;

/// Columnar store domain error (§7 `StorePersistError`).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("not found")]
    NotFound,
    #[error("initialization error: {0}")]
    InitError(String),
}
