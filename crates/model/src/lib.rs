//! Shared data model for the commerce backend.
//!
//! This crate defines the vocabulary every other layer speaks:
//! - typed UUID identifiers
//! - exact-decimal [`Money`] and the flat [`VAT rate`](vat_rate)
//! - the [`ActorContext`] authorization value passed into every operation
//! - entity structs for carts, orders, payments, shipments and the catalog
//! - the closed [`OrderStatus`] state machine

pub mod actor;
pub mod entities;
pub mod ids;
pub mod money;
pub mod status;

pub use actor::{ActorContext, Role};
pub use entities::{
    Address, AddressSnapshot, AuditRecord, Cart, CartItem, Customer, Order, OrderItem, Payment,
    Product, Shipment, StatusChange,
};
pub use ids::{
    AddressId, CartId, CustomerId, OrderId, PaymentId, ProductId, ShipmentId, StatusChangeId,
};
pub use money::{Money, vat_rate};
pub use status::{AddressType, CartStatus, OrderStatus, ParseEnumError, PaymentMethod, PaymentStatus};
