//! HTTP route handlers.

pub mod audit;
pub mod carts;
pub mod customers;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;
