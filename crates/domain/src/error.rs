//! Domain error taxonomy.

use model::{CartStatus, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// The API layer maps these onto HTTP status codes: `NotFound` → 404,
/// `Forbidden` → 403, the conflict family → 409, the validation family →
/// 400, and `Store` → 500.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An entity referenced by the request does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor may not perform this operation.
    #[error("operation not permitted for this actor")]
    Forbidden,

    /// A cart operation needs an item quantity of at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Checkout over a cart with no items.
    #[error("cart is empty")]
    EmptyCart,

    /// The requested quantity exceeds the product's live stock.
    #[error("insufficient stock for product {product}")]
    InsufficientStock { product: String },

    /// The cart has already been checked out or expired.
    #[error("cart is not active (status {0})")]
    CartNotActive(CartStatus),

    /// The requested status change is not in the transition table.
    #[error("invalid order status transition {from} -> {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Shipping requires a paid order.
    #[error("order is not paid (status {0})")]
    NotPaid(OrderStatus),

    /// Delivery requires a shipped order.
    #[error("order is not shipped (status {0})")]
    NotShipped(OrderStatus),

    /// The persistence layer failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
