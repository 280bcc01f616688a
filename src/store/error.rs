use thiserror::Error;

/// Error taxonomy for the durable store layer.
///
/// Variants carry a `String` only and the enum derives `Clone` so a single
/// failed flush batch can reject every waiter with the same error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Serialization/deserialization error: {0}")]
    Serialization(String),

    #[error("Database backend error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
