//! HTTP API server for the order lifecycle backend.
//!
//! Maps the domain services onto REST routes, with structured logging
//! (tracing) and Prometheus metrics. Caller identity arrives as gateway
//! headers and is turned into an explicit actor context per request.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{
    AuditRecorder, CartService, CatalogService, CustomerService, OrderService, PaymentService,
    ShippingService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub payments: PaymentService<S>,
    pub shipping: ShippingService<S>,
    pub catalog: CatalogService<S>,
    pub customers: CustomerService<S>,
    pub audit: AuditRecorder<S>,
}

impl<S: Store> AppState<S> {
    /// Wires every domain service over one shared store.
    pub fn new(store: Arc<S>, cart_ttl: chrono::Duration) -> Self {
        Self {
            carts: CartService::new(Arc::clone(&store), cart_ttl),
            orders: OrderService::new(Arc::clone(&store)),
            payments: PaymentService::new(Arc::clone(&store)),
            shipping: ShippingService::new(Arc::clone(&store)),
            catalog: CatalogService::new(Arc::clone(&store)),
            customers: CustomerService::new(Arc::clone(&store)),
            audit: AuditRecorder::new(store),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // carts
        .route(
            "/carts/customer/{customer_id}",
            post(routes::carts::get_or_create::<S>),
        )
        .route("/carts/{cart_id}", get(routes::carts::get::<S>))
        .route("/carts/{cart_id}/items", post(routes::carts::add_item::<S>))
        .route(
            "/carts/{cart_id}/items/{product_id}",
            delete(routes::carts::remove_item::<S>),
        )
        .route(
            "/carts/{cart_id}/items/{product_id}/decrement",
            post(routes::carts::decrement_item::<S>),
        )
        .route("/carts/{cart_id}/clear", post(routes::carts::clear::<S>))
        // orders
        .route(
            "/orders/from-cart/{cart_id}",
            post(routes::orders::create_from_cart::<S>),
        )
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/customer/{customer_id}",
            get(routes::orders::list_for_customer::<S>),
        )
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        // payments & shipping
        .route("/payments/{order_id}/pay", post(routes::payments::pay::<S>))
        .route(
            "/shipping/orders/{id}/ship",
            post(routes::shipping::ship::<S>),
        )
        .route(
            "/shipping/orders/{id}/deliver",
            post(routes::shipping::deliver::<S>),
        )
        // catalog
        .route(
            "/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route("/products/{id}", get(routes::products::get::<S>))
        // customers
        .route("/customers", post(routes::customers::create::<S>))
        .route(
            "/customers/{id}/addresses",
            post(routes::customers::add_address::<S>).get(routes::customers::list_addresses::<S>),
        )
        // audit
        .route(
            "/audit/{entity_type}/{entity_id}",
            get(routes::audit::for_entity::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
