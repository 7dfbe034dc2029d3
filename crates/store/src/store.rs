use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    Address, AuditRecord, Cart, CartId, Customer, CustomerId, Order, OrderId, Payment, Product,
    ProductId, Shipment, StatusChange,
};

use crate::Result;

/// Everything that must be made durable by a successful checkout, applied
/// all-or-nothing.
///
/// Stock decrements are carried as `(product, quantity)` pairs and
/// re-validated inside the commit (`stock >= quantity`, otherwise
/// [`StockConflict`](crate::StoreError::StockConflict) and nothing is
/// applied). That closes the window between the caller's stock check and the
/// write under concurrent checkouts.
#[derive(Debug, Clone)]
pub struct CheckoutCommit {
    /// The fully built order, including items and address snapshot.
    pub order: Order,
    /// Per-product quantities to subtract from live stock.
    pub stock_decrements: Vec<(ProductId, u32)>,
    /// The initial `None -> NEW` history row.
    pub initial_change: StatusChange,
    /// The source cart, to be marked checked out in the same commit.
    pub cart_id: CartId,
}

/// Core persistence trait.
///
/// Reads are plain CRUD lookups. Workflow writes that touch several entities
/// are expressed as `commit_*` units so that every backend can apply them
/// atomically: a transaction in PostgreSQL, a single write-lock critical
/// section in memory. All implementations must be thread-safe.
#[async_trait]
pub trait Store: Send + Sync {
    // -- catalog --

    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn update_product(&self, product: &Product) -> Result<()>;

    // -- customers & addresses --

    async fn insert_customer(&self, customer: &Customer) -> Result<()>;
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Inserts an address. When the address is flagged default, the default
    /// flag is cleared on the customer's other addresses of the same kind.
    async fn insert_address(&self, address: &Address) -> Result<()>;
    async fn addresses_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Address>>;

    /// The customer's default shipping address, if one exists.
    async fn default_shipping_address(&self, customer_id: CustomerId) -> Result<Option<Address>>;

    // -- carts --

    async fn insert_cart(&self, cart: &Cart) -> Result<()>;
    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>>;
    async fn update_cart(&self, cart: &Cart) -> Result<()>;

    /// The customer's current `NEW` cart, if any. Together with
    /// [`insert_cart`](Store::insert_cart) this backs the lookup-or-create
    /// invariant of one active cart per customer.
    async fn active_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>>;

    /// Carts still `NEW` whose `expires_at` has passed.
    async fn expired_carts(&self, now: DateTime<Utc>) -> Result<Vec<Cart>>;

    // -- orders and satellites --

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn list_orders(&self) -> Result<Vec<Order>>;
    async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;
    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;
    async fn history_for_order(&self, order_id: OrderId) -> Result<Vec<StatusChange>>;
    async fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>>;

    // -- atomic commit units --

    /// Applies a checkout: stock decrements, order insert, initial history
    /// row and cart status flip, all-or-nothing.
    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<()>;

    /// Persists an order's new status together with its history row.
    async fn commit_status_change(&self, order: &Order, change: &StatusChange) -> Result<()>;

    /// Persists a payment attempt; on success also the `NEW -> PAID` flip
    /// and its history row.
    async fn commit_payment(
        &self,
        payment: &Payment,
        status_change: Option<(&Order, &StatusChange)>,
    ) -> Result<()>;

    /// Persists a new shipment together with the `PAID -> SHIPPED` flip.
    async fn commit_shipment(
        &self,
        shipment: &Shipment,
        order: &Order,
        change: &StatusChange,
    ) -> Result<()>;

    /// Persists a shipment's delivery timestamp together with the
    /// `SHIPPED -> DELIVERED` flip.
    async fn commit_delivery(
        &self,
        shipment: &Shipment,
        order: &Order,
        change: &StatusChange,
    ) -> Result<()>;

    // -- audit --

    async fn append_audit(&self, record: &AuditRecord) -> Result<()>;
    async fn audit_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>>;
}
