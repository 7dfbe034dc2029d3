//! Entity and value definitions for the commerce domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{
    AddressId, CartId, CustomerId, OrderId, PaymentId, ProductId, ShipmentId, StatusChangeId,
};
use crate::money::Money;
use crate::status::{AddressType, CartStatus, OrderStatus, PaymentMethod, PaymentStatus};

/// A catalog product. Stock is the single shared mutable counter in the
/// system; checkout is the only workflow that decrements it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
        }
    }
}

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// An address-book entry. Checkout reads the customer's default shipping
/// address; later edits never touch existing orders thanks to
/// [`AddressSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub kind: AddressType,
    pub is_default: bool,
}

/// Copy of the shipping address frozen at order-creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl From<&Address> for AddressSnapshot {
    fn from(address: &Address) -> Self {
        Self {
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            region: address.region.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        }
    }
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A customer's mutable pre-checkout basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a fresh cart for a customer with the given lifetime.
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            id: CartId::new(),
            customer_id,
            status: CartStatus::New,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns true while the cart can still be mutated or checked out.
    pub fn is_active(&self) -> bool {
        self.status == CartStatus::New
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current quantity of a product in the cart, zero if absent.
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|line| line.product_id == product_id)
            .map_or(0, |line| line.quantity)
    }

    /// Adds to an existing line or appends a new one.
    pub fn upsert_item(&mut self, product_id: ProductId, quantity: u32) {
        match self
            .items
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => line.quantity += quantity,
            None => self.items.push(CartItem {
                product_id,
                quantity,
            }),
        }
    }

    /// Removes a line entirely. Returns false if the product was not present.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.product_id != product_id);
        self.items.len() != before
    }

    /// Decrements a line by one, collapsing it at zero.
    ///
    /// Returns false if the product was not present.
    pub fn decrement_item(&mut self, product_id: ProductId) -> bool {
        let Some(pos) = self
            .items
            .iter()
            .position(|line| line.product_id == product_id)
        else {
            return false;
        };
        if self.items[pos].quantity > 1 {
            self.items[pos].quantity -= 1;
        } else {
            self.items.remove(pos);
        }
        true
    }
}

/// One line of an order, frozen at checkout.
///
/// `unit_price` is the catalog price at order-creation time; later price
/// changes never alter historical orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    /// Captures a product's current price for the given quantity.
    pub fn capture(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            line_total: product.price.times(quantity),
        }
    }
}

/// Immutable commercial record created from a cart at checkout.
///
/// Totals are computed once at creation and never recomputed; only `status`
/// changes afterwards, and only through the transition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub cart_id: CartId,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub subtotal: Money,
    pub vat_total: Money,
    pub total: Money,
    pub items: Vec<OrderItem>,
    pub shipping_address: AddressSnapshot,
}

/// One row of the append-only status-history ledger.
///
/// `from` is `None` only for the initial `NEW` entry written at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: StatusChangeId,
    pub order_id: OrderId,
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(order_id: OrderId, from: Option<OrderStatus>, to: OrderStatus) -> Self {
        Self {
            id: StatusChangeId::new(),
            order_id,
            from,
            to,
            changed_at: Utc::now(),
        }
    }
}

/// One payment attempt. Append-only; retries after a failure add rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    pub status: PaymentStatus,
    pub txn_ref: String,
    pub created_at: DateTime<Utc>,
}

/// The (at most one) shipment of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub carrier: String,
    pub tracking_number: String,
    pub shipped_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: uuid::Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            actor: actor.into(),
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cart() -> Cart {
        Cart::new(CustomerId::new(), Utc::now(), Duration::hours(2))
    }

    #[test]
    fn new_cart_is_active_and_empty() {
        let cart = cart();
        assert!(cart.is_active());
        assert!(cart.is_empty());
        assert_eq!(cart.expires_at - cart.created_at, Duration::hours(2));
    }

    #[test]
    fn upsert_merges_lines() {
        let mut cart = cart();
        let product = ProductId::new();
        cart.upsert_item(product, 2);
        cart.upsert_item(product, 3);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.quantity_of(product), 5);
    }

    #[test]
    fn decrement_collapses_line_at_zero() {
        let mut cart = cart();
        let product = ProductId::new();
        cart.upsert_item(product, 2);
        assert!(cart.decrement_item(product));
        assert_eq!(cart.quantity_of(product), 1);
        assert!(cart.decrement_item(product));
        assert!(cart.is_empty());
        assert!(!cart.decrement_item(product));
    }

    #[test]
    fn remove_reports_missing_lines() {
        let mut cart = cart();
        let product = ProductId::new();
        assert!(!cart.remove_item(product));
        cart.upsert_item(product, 1);
        assert!(cart.remove_item(product));
    }

    #[test]
    fn order_item_captures_current_price() {
        let product = Product::new("Widget", Money::from_major(500), 10);
        let item = OrderItem::capture(&product, 2);
        assert_eq!(item.unit_price, Money::from_major(500));
        assert_eq!(item.line_total, Money::from_major(1000));
        assert_eq!(item.product_name, "Widget");
    }

    #[test]
    fn address_snapshot_copies_all_fields() {
        let address = Address {
            id: AddressId::new(),
            customer_id: CustomerId::new(),
            line1: "1 Main St".into(),
            line2: Some("Apt 2".into()),
            city: "Springfield".into(),
            region: None,
            postal_code: "12345".into(),
            country: "US".into(),
            kind: AddressType::Shipping,
            is_default: true,
        };
        let snapshot = AddressSnapshot::from(&address);
        assert_eq!(snapshot.line1, address.line1);
        assert_eq!(snapshot.line2, address.line2);
        assert_eq!(snapshot.postal_code, address.postal_code);
    }
}
