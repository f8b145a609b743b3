use thiserror::Error;

/// Hot-cache domain error (§7 `CacheError`) — always warned, counted, ignored.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("storage error: {0}")]
    Storage(String),
}
