//! Customer and address-book support service.

use std::sync::Arc;

use model::{ActorContext, Address, AddressId, AddressType, Customer, CustomerId};
use serde::Deserialize;
use serde_json::json;
use store::Store;

use crate::audit::AuditRecorder;
use crate::error::DomainError;

/// Input for a new address-book entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub kind: AddressType,
    #[serde(default)]
    pub is_default: bool,
}

pub struct CustomerService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S> Clone for CustomerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
        }
    }
}

impl<S: Store> CustomerService<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Registers a customer. Open to any actor.
    #[tracing::instrument(skip(self, actor))]
    pub async fn create_customer(
        &self,
        name: String,
        email: String,
        actor: &ActorContext,
    ) -> Result<Customer, DomainError> {
        let customer = Customer::new(name, email);
        self.store.insert_customer(&customer).await?;
        self.audit
            .record(
                actor,
                "CREATE_CUSTOMER",
                "customer",
                customer.id,
                json!({ "email": &customer.email }),
            )
            .await;
        Ok(customer)
    }

    /// Adds an address-book entry. Marking it default clears the default
    /// flag on the customer's other addresses of the same kind.
    #[tracing::instrument(skip(self, input, actor))]
    pub async fn add_address(
        &self,
        customer_id: CustomerId,
        input: NewAddress,
        actor: &ActorContext,
    ) -> Result<Address, DomainError> {
        if !actor.can_access(customer_id) {
            return Err(DomainError::Forbidden);
        }
        self.store
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", customer_id))?;

        let address = Address {
            id: AddressId::new(),
            customer_id,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
            kind: input.kind,
            is_default: input.is_default,
        };
        self.store.insert_address(&address).await?;
        self.audit
            .record(
                actor,
                "ADD_ADDRESS",
                "customer",
                customer_id,
                json!({ "address_id": address.id, "kind": address.kind }),
            )
            .await;
        Ok(address)
    }

    #[tracing::instrument(skip(self, actor))]
    pub async fn list_addresses(
        &self,
        customer_id: CustomerId,
        actor: &ActorContext,
    ) -> Result<Vec<Address>, DomainError> {
        if !actor.can_access(customer_id) {
            return Err(DomainError::Forbidden);
        }
        Ok(self.store.addresses_for_customer(customer_id).await?)
    }
}
