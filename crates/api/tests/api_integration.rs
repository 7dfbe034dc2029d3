//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use metrics_exporter_prometheus::PrometheusHandle;
use model::{ActorContext, Address, Cart, Customer, Money, Order, OrderStatus, Product};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use store::MemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(api::AppState::new(store, chrono::Duration::hours(2)));
    api::create_app(state, get_metrics_handle())
}

fn request(
    method: Method,
    uri: &str,
    actor: Option<&ActorContext>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        if let Some(id) = actor.customer_id {
            builder = builder.header("X-Actor-Id", id.to_string());
        }
        let roles: Vec<&str> = actor.roles.iter().map(|r| r.as_str()).collect();
        if !roles.is_empty() {
            builder = builder.header("X-Actor-Roles", roles.join(","));
        }
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn send_as<T: DeserializeOwned>(
    app: &Router,
    req: Request<Body>,
    expected: StatusCode,
) -> T {
    let (status, body) = send(app, req).await;
    assert_eq!(status, expected, "unexpected response body: {body}");
    serde_json::from_value(body).unwrap()
}

/// Seeds a product, a customer with a default shipping address, and returns
/// the customer's actor context.
async fn seed(app: &Router) -> (Product, Customer, ActorContext) {
    let admin = ActorContext::admin();
    let product: Product = send_as(
        app,
        request(
            Method::POST,
            "/products",
            Some(&admin),
            Some(json!({ "name": "Widget", "price": "500.00", "stock": 10 })),
        ),
        StatusCode::CREATED,
    )
    .await;

    let customer: Customer = send_as(
        app,
        request(
            Method::POST,
            "/customers",
            None,
            Some(json!({ "name": "Ada", "email": "ada@example.com" })),
        ),
        StatusCode::CREATED,
    )
    .await;
    let actor = ActorContext::customer(customer.id);

    let _: Address = send_as(
        app,
        request(
            Method::POST,
            &format!("/customers/{}/addresses", customer.id),
            Some(&actor),
            Some(json!({
                "line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US",
                "kind": "SHIPPING",
                "is_default": true,
            })),
        ),
        StatusCode::CREATED,
    )
    .await;

    (product, customer, actor)
}

#[tokio::test]
async fn health_check() {
    let app = setup();
    let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let app = setup();
    let response = app
        .oneshot(request(Method::GET, "/metrics", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_order_lifecycle_over_http() {
    let app = setup();
    let admin = ActorContext::admin();
    let (product, customer, actor) = seed(&app).await;

    let cart: Cart = send_as(
        &app,
        request(
            Method::POST,
            &format!("/carts/customer/{}", customer.id),
            Some(&actor),
            None,
        ),
        StatusCode::OK,
    )
    .await;

    let cart: Cart = {
        let body = json!({ "product_id": product.id, "quantity": 2 });
        send_as(
            &app,
            request(
                Method::POST,
                &format!("/carts/{}/items", cart.id),
                Some(&actor),
                Some(body),
            ),
            StatusCode::OK,
        )
        .await
    };

    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/carts/{}", cart.id), Some(&actor), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let total: Money = serde_json::from_value(body["totals"]["total"].clone()).unwrap();
    assert_eq!(total, Money::from_major(1150));

    let order: Order = send_as(
        &app,
        request(
            Method::POST,
            &format!("/orders/from-cart/{}", cart.id),
            Some(&actor),
            None,
        ),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.subtotal, Money::from_major(1000));
    assert_eq!(order.vat_total, Money::from_major(150));
    assert_eq!(order.total, Money::from_major(1150));

    // stock was reserved
    let live: Product = send_as(
        &app,
        request(Method::GET, &format!("/products/{}", product.id), None, None),
        StatusCode::OK,
    )
    .await;
    assert_eq!(live.stock, 8);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/payments/{}/pay", order.id),
            Some(&actor),
            Some(json!({ "amount": order.total, "method": "CARD", "txn_ref": "txn-1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["status"], "SUCCEEDED");
    assert_eq!(body["order"]["status"], "PAID");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/shipping/orders/{}/ship", order.id),
            Some(&admin),
            Some(json!({ "carrier": "UPS" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "SHIPPED");
    assert!(
        body["shipment"]["tracking_number"]
            .as_str()
            .unwrap()
            .starts_with("TRK-")
    );

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/shipping/orders/{}/deliver", order.id),
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "DELIVERED");

    // the order details carry the whole story
    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/orders/{}", order.id), Some(&actor), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"].as_array().unwrap().len(), 4);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);
    assert!(!body["shipment"].is_null());

    // and an admin can read the audit trail
    let (status, body) = send(
        &app,
        request(
            Method::GET,
            &format!("/audit/order/{}", order.id),
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn error_mapping() {
    let app = setup();
    let (product, customer, actor) = seed(&app).await;

    // anonymous callers cannot create products
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/products",
            None,
            Some(json!({ "name": "X", "price": "1.00", "stock": 1 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // customers cannot ship
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            &format!("/shipping/orders/{}/ship", uuid::Uuid::new_v4()),
            Some(&actor),
            Some(json!({ "carrier": "UPS" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // unknown order
    let (status, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/orders/{}", uuid::Uuid::new_v4()),
            Some(&ActorContext::admin()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // malformed identity header
    let req = Request::builder()
        .method(Method::GET)
        .uri("/orders")
        .header("X-Actor-Id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // empty-cart checkout is a 400
    let cart: Cart = send_as(
        &app,
        request(
            Method::POST,
            &format!("/carts/customer/{}", customer.id),
            Some(&actor),
            None,
        ),
        StatusCode::OK,
    )
    .await;
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            &format!("/orders/from-cart/{}", cart.id),
            Some(&actor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // out-of-table transition is a 409
    let _: Cart = send_as(
        &app,
        request(
            Method::POST,
            &format!("/carts/{}/items", cart.id),
            Some(&actor),
            Some(json!({ "product_id": product.id, "quantity": 1 })),
        ),
        StatusCode::OK,
    )
    .await;
    let order: Order = send_as(
        &app,
        request(
            Method::POST,
            &format!("/orders/from-cart/{}", cart.id),
            Some(&actor),
            None,
        ),
        StatusCode::CREATED,
    )
    .await;
    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            &format!("/orders/{}/status", order.id),
            Some(&actor),
            Some(json!({ "status": "DELIVERED" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cross_customer_access_is_forbidden() {
    let app = setup();
    let (_, customer, actor) = seed(&app).await;

    let cart: Cart = send_as(
        &app,
        request(
            Method::POST,
            &format!("/carts/customer/{}", customer.id),
            Some(&actor),
            None,
        ),
        StatusCode::OK,
    )
    .await;

    let stranger: Customer = send_as(
        &app,
        request(
            Method::POST,
            "/customers",
            None,
            Some(json!({ "name": "Grace", "email": "grace@example.com" })),
        ),
        StatusCode::CREATED,
    )
    .await;
    let stranger_actor = ActorContext::customer(stranger.id);

    let (status, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/carts/{}", cart.id),
            Some(&stranger_actor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/orders/customer/{}", customer.id),
            Some(&stranger_actor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // admin audit route is closed to customers
    let (status, _) = send(
        &app,
        request(
            Method::GET,
            &format!("/audit/cart/{}", cart.id),
            Some(&stranger_actor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
