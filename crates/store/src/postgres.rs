use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    Address, AddressId, AddressSnapshot, AuditRecord, Cart, CartId, CartItem, CartStatus,
    Customer, CustomerId, Order, OrderId, OrderItem, ParseEnumError, Payment, PaymentId, Product,
    ProductId, Shipment, ShipmentId, StatusChange, StatusChangeId,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::store::{CheckoutCommit, Store};
use crate::{Result, StoreError};

/// PostgreSQL-backed store.
///
/// Uses runtime-checked queries throughout; the commit units run inside a
/// single transaction, so a validation failure mid-commit rolls everything
/// back. The stock decrement is a conditional `UPDATE ... AND stock >= $n`,
/// which makes concurrent checkouts race-safe at the row level.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn parse_enum<T>(value: String) -> Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: ParseEnumError| StoreError::Decode(e.to_string()))
}

fn parse_enum_opt<T>(value: Option<String>) -> Result<Option<T>>
where
    T: FromStr<Err = ParseEnumError>,
{
    value.map(parse_enum).transpose()
}

fn db_int(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("quantity out of range: {value}")))
}

fn db_u32(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Decode(format!("negative quantity in database: {value}")))
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: row.try_get::<Decimal, _>("price")?.into(),
            stock: db_u32(row.try_get("stock")?)?,
        })
    }

    fn row_to_customer(row: &PgRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }

    fn row_to_address(row: &PgRow) -> Result<Address> {
        Ok(Address {
            id: AddressId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            line1: row.try_get("line1")?,
            line2: row.try_get("line2")?,
            city: row.try_get("city")?,
            region: row.try_get("region")?,
            postal_code: row.try_get("postal_code")?,
            country: row.try_get("country")?,
            kind: parse_enum(row.try_get("kind")?)?,
            is_default: row.try_get("is_default")?,
        })
    }

    fn row_to_cart_shell(row: &PgRow) -> Result<Cart> {
        Ok(Cart {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            status: parse_enum(row.try_get("status")?)?,
            items: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    async fn load_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY product_id",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartItem {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: db_u32(row.try_get("quantity")?)?,
                })
            })
            .collect()
    }

    async fn load_cart(&self, row: &PgRow) -> Result<Cart> {
        let mut cart = Self::row_to_cart_shell(row)?;
        cart.items = self.load_cart_items(cart.id).await?;
        Ok(cart)
    }

    fn row_to_order_shell(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            status: parse_enum(row.try_get("status")?)?,
            order_date: row.try_get("order_date")?,
            subtotal: row.try_get::<Decimal, _>("subtotal")?.into(),
            vat_total: row.try_get::<Decimal, _>("vat_total")?.into(),
            total: row.try_get::<Decimal, _>("total")?.into(),
            items: Vec::new(),
            shipping_address: AddressSnapshot {
                line1: row.try_get("ship_line1")?,
                line2: row.try_get("ship_line2")?,
                city: row.try_get("ship_city")?,
                region: row.try_get("ship_region")?,
                postal_code: row.try_get("ship_postal_code")?,
                country: row.try_get("ship_country")?,
            },
        })
    }

    async fn load_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price, line_total
            FROM order_items WHERE order_id = $1 ORDER BY product_name
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderItem {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    product_name: row.try_get("product_name")?,
                    quantity: db_u32(row.try_get("quantity")?)?,
                    unit_price: row.try_get::<Decimal, _>("unit_price")?.into(),
                    line_total: row.try_get::<Decimal, _>("line_total")?.into(),
                })
            })
            .collect()
    }

    async fn load_order(&self, row: &PgRow) -> Result<Order> {
        let mut order = Self::row_to_order_shell(row)?;
        order.items = self.load_order_items(order.id).await?;
        Ok(order)
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            method: parse_enum(row.try_get("method")?)?,
            amount: row.try_get::<Decimal, _>("amount")?.into(),
            status: parse_enum(row.try_get("status")?)?,
            txn_ref: row.try_get("txn_ref")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_change(row: &PgRow) -> Result<StatusChange> {
        Ok(StatusChange {
            id: StatusChangeId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            from: parse_enum_opt(row.try_get("from_status")?)?,
            to: parse_enum(row.try_get("to_status")?)?,
            changed_at: row.try_get("changed_at")?,
        })
    }

    fn row_to_shipment(row: &PgRow) -> Result<Shipment> {
        Ok(Shipment {
            id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            carrier: row.try_get("carrier")?,
            tracking_number: row.try_get("tracking_number")?,
            shipped_at: row.try_get("shipped_at")?,
            delivered_at: row.try_get("delivered_at")?,
        })
    }

    fn row_to_audit(row: &PgRow) -> Result<AuditRecord> {
        Ok(AuditRecord {
            id: row.try_get("id")?,
            actor: row.try_get("actor")?,
            action: row.try_get("action")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            payload: row.try_get("payload")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

async fn insert_order_tx(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, customer_id, cart_id, status, order_date,
                            subtotal, vat_total, total,
                            ship_line1, ship_line2, ship_city, ship_region,
                            ship_postal_code, ship_country)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.customer_id.as_uuid())
    .bind(order.cart_id.as_uuid())
    .bind(order.status.as_str())
    .bind(order.order_date)
    .bind(Decimal::from(order.subtotal))
    .bind(Decimal::from(order.vat_total))
    .bind(Decimal::from(order.total))
    .bind(&order.shipping_address.line1)
    .bind(&order.shipping_address.line2)
    .bind(&order.shipping_address.city)
    .bind(&order.shipping_address.region)
    .bind(&order.shipping_address.postal_code)
    .bind(&order.shipping_address.country)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity,
                                     unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(&item.product_name)
        .bind(db_int(item.quantity)?)
        .bind(Decimal::from(item.unit_price))
        .bind(Decimal::from(item.line_total))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_change_tx(conn: &mut PgConnection, change: &StatusChange) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_status_history (id, order_id, from_status, to_status, changed_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(change.id.as_uuid())
    .bind(change.order_id.as_uuid())
    .bind(change.from.map(|s| s.as_str()))
    .bind(change.to.as_str())
    .bind(change.changed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Flips an order's status, guarded on the state the change was validated
/// against. A concurrent flip makes the guard miss, like the conditional
/// stock decrement in [`commit_checkout`](Store::commit_checkout).
async fn update_order_status_tx(
    conn: &mut PgConnection,
    order: &Order,
    change: &StatusChange,
) -> Result<()> {
    match change.from {
        Some(expected) => {
            let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = $3")
                .bind(order.status.as_str())
                .bind(order.id.as_uuid())
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await?;
            if result.rows_affected() == 0 {
                tracing::debug!(order_id = %order.id, %expected, "status conflict, rolling back");
                return Err(StoreError::StatusConflict {
                    order: order.id,
                    expected,
                });
            }
        }
        None => {
            let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
                .bind(order.status.as_str())
                .bind(order.id.as_uuid())
                .execute(&mut *conn)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "order",
                    id: order.id.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, price, stock) VALUES ($1, $2, $3, $4)")
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(Decimal::from(product.price))
            .bind(db_int(product.stock)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT id, name, price, stock FROM products ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET name = $1, price = $2, stock = $3 WHERE id = $4")
                .bind(&product.name)
                .bind(Decimal::from(product.price))
                .bind(db_int(product.stock)?)
                .bind(product.id.as_uuid())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query("INSERT INTO customers (id, name, email) VALUES ($1, $2, $3)")
            .bind(customer.id.as_uuid())
            .bind(&customer.name)
            .bind(&customer.email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, name, email FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_customer).transpose()
    }

    async fn insert_address(&self, address: &Address) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if address.is_default {
            sqlx::query(
                "UPDATE addresses SET is_default = FALSE WHERE customer_id = $1 AND kind = $2",
            )
            .bind(address.customer_id.as_uuid())
            .bind(address.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            r#"
            INSERT INTO addresses (id, customer_id, line1, line2, city, region,
                                   postal_code, country, kind, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(address.customer_id.as_uuid())
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.region)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.kind.as_str())
        .bind(address.is_default)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn addresses_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Address>> {
        let rows = sqlx::query("SELECT * FROM addresses WHERE customer_id = $1 ORDER BY line1")
            .bind(customer_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_address).collect()
    }

    async fn default_shipping_address(&self, customer_id: CustomerId) -> Result<Option<Address>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM addresses
            WHERE customer_id = $1 AND kind = 'SHIPPING' AND is_default
            LIMIT 1
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_address).transpose()
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO carts (id, customer_id, status, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.customer_id.as_uuid())
        .bind(cart.status.as_str())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .execute(&mut *tx)
        .await?;
        for item in &cart.items {
            sqlx::query(
                "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(cart.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(db_int(item.quantity)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT * FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_cart(&row).await?)),
            None => Ok(None),
        }
    }

    async fn update_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE carts SET status = $1, updated_at = $2, expires_at = $3 WHERE id = $4",
        )
        .bind(cart.status.as_str())
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .bind(cart.id.as_uuid())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "cart",
                id: cart.id.to_string(),
            });
        }
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        for item in &cart.items {
            sqlx::query(
                "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(cart.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(db_int(item.quantity)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn active_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT * FROM carts WHERE customer_id = $1 AND status = 'NEW'")
            .bind(customer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_cart(&row).await?)),
            None => Ok(None),
        }
    }

    async fn expired_carts(&self, now: DateTime<Utc>) -> Result<Vec<Cart>> {
        let rows = sqlx::query("SELECT * FROM carts WHERE status = 'NEW' AND expires_at < $1")
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        let mut carts = Vec::with_capacity(rows.len());
        for row in &rows {
            carts.push(self.load_cart(row).await?);
        }
        Ok(carts)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_order(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY order_date")
            .fetch_all(&self.pool)
            .await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.load_order(row).await?);
        }
        Ok(orders)
    }

    async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders WHERE customer_id = $1 ORDER BY order_date")
            .bind(customer_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.load_order(row).await?);
        }
        Ok(orders)
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let rows = sqlx::query("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_payment).collect()
    }

    async fn history_for_order(&self, order_id: OrderId) -> Result<Vec<StatusChange>> {
        let rows = sqlx::query(
            "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY changed_at",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_change).collect()
    }

    async fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        let row = sqlx::query("SELECT * FROM shipments WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_shipment).transpose()
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Conditional decrement: fails (and rolls back everything) when a
        // concurrent checkout consumed the stock first.
        for (product_id, quantity) in &commit.stock_decrements {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1",
            )
            .bind(db_int(*quantity)?)
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                tracing::debug!(%product_id, quantity, "stock conflict, rolling back checkout");
                return Err(StoreError::StockConflict(*product_id));
            }
        }

        insert_order_tx(&mut *tx, &commit.order).await?;
        insert_change_tx(&mut *tx, &commit.initial_change).await?;

        let result = sqlx::query(
            "UPDATE carts SET status = 'CHECKED_OUT', updated_at = NOW() WHERE id = $1",
        )
        .bind(commit.cart_id.as_uuid())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "cart",
                id: commit.cart_id.to_string(),
            });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn commit_status_change(&self, order: &Order, change: &StatusChange) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_order_status_tx(&mut *tx, order, change).await?;
        insert_change_tx(&mut *tx, change).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_payment(
        &self,
        payment: &Payment,
        status_change: Option<(&Order, &StatusChange)>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, amount, status, txn_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(Decimal::from(payment.amount))
        .bind(payment.status.as_str())
        .bind(&payment.txn_ref)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;
        if let Some((order, change)) = status_change {
            update_order_status_tx(&mut *tx, order, change).await?;
            insert_change_tx(&mut *tx, change).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn commit_shipment(
        &self,
        shipment: &Shipment,
        order: &Order,
        change: &StatusChange,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO shipments (id, order_id, carrier, tracking_number, shipped_at, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(shipment.order_id.as_uuid())
        .bind(&shipment.carrier)
        .bind(&shipment.tracking_number)
        .bind(shipment.shipped_at)
        .bind(shipment.delivered_at)
        .execute(&mut *tx)
        .await?;
        update_order_status_tx(&mut *tx, order, change).await?;
        insert_change_tx(&mut *tx, change).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_delivery(
        &self,
        shipment: &Shipment,
        order: &Order,
        change: &StatusChange,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE shipments SET delivered_at = $1 WHERE id = $2")
            .bind(shipment.delivered_at)
            .bind(shipment.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "shipment",
                id: shipment.id.to_string(),
            });
        }
        update_order_status_tx(&mut *tx, order, change).await?;
        insert_change_tx(&mut *tx, change).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor, action, entity_type, entity_id, payload, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.actor)
        .bind(&record.action)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.payload)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn audit_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM audit_log
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY recorded_at
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_audit).collect()
    }
}
