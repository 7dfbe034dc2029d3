//! Business services for the order lifecycle.
//!
//! Every operation takes an explicit [`model::ActorContext`] and returns
//! `Result<_, DomainError>`. Mutations write one audit record after their
//! commit succeeds; multi-entity writes go through the store's atomic
//! commit units rather than sequences of single-row updates.

pub mod audit;
pub mod carts;
pub mod catalog;
pub mod customers;
pub mod error;
pub mod orders;
pub mod payments;
pub mod shipping;

pub use audit::AuditRecorder;
pub use carts::{CartService, CartTotals};
pub use catalog::CatalogService;
pub use customers::{CustomerService, NewAddress};
pub use error::DomainError;
pub use orders::{OrderDetails, OrderService};
pub use payments::{PaymentOutcome, PaymentService};
pub use shipping::{ShippingOutcome, ShippingService};
