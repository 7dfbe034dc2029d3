//! Persistence boundary for the commerce backend.
//!
//! The [`Store`] trait exposes simple CRUD reads plus *atomic commit units*
//! for the multi-entity workflow writes (checkout, payment, shipping). Two
//! backends implement it: [`MemoryStore`] for tests and standalone runs, and
//! [`PostgresStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{CheckoutCommit, Store};
