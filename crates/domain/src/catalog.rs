//! Catalog support service.

use std::sync::Arc;

use model::{ActorContext, Money, Product, ProductId};
use serde_json::json;
use store::Store;

use crate::audit::AuditRecorder;
use crate::error::DomainError;

pub struct CatalogService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
        }
    }
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Adds a product to the catalog. Admin only.
    #[tracing::instrument(skip(self, actor))]
    pub async fn create_product(
        &self,
        name: String,
        price: Money,
        stock: u32,
        actor: &ActorContext,
    ) -> Result<Product, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }
        let product = Product::new(name, price, stock);
        self.store.insert_product(&product).await?;
        self.audit
            .record(
                actor,
                "CREATE_PRODUCT",
                "product",
                product.id,
                json!({ "name": &product.name, "price": product.price, "stock": stock }),
            )
            .await;
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }
}
