use model::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row that was expected to exist is gone.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A conditional stock decrement found fewer units than required.
    ///
    /// Raised inside the checkout commit when a concurrent checkout consumed
    /// the stock between the caller's validation and the commit.
    #[error("insufficient stock for product {0}")]
    StockConflict(ProductId),

    /// A guarded status flip found the order no longer in the state it was
    /// validated against.
    ///
    /// Raised inside a commit when a concurrent operation moved the order
    /// between the caller's check and the write.
    #[error("order {order} is no longer {expected}")]
    StatusConflict { order: OrderId, expected: OrderStatus },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("column decode error: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
