//! Post-commit audit recording.

use std::sync::Arc;

use model::{ActorContext, AuditRecord};
use store::Store;

use crate::error::DomainError;

/// Writes audit records after a business operation has committed.
///
/// Auditing is best-effort: a failed append is logged at `warn` and
/// swallowed, it never fails the operation that triggered it.
pub struct AuditRecorder<S> {
    store: Arc<S>,
}

impl<S> Clone for AuditRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> AuditRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Appends one audit record for a committed operation.
    pub async fn record(
        &self,
        actor: &ActorContext,
        action: &str,
        entity_type: &str,
        entity_id: impl ToString,
        payload: serde_json::Value,
    ) {
        let record = AuditRecord::new(
            actor.audit_label(),
            action,
            entity_type,
            entity_id.to_string(),
            payload,
        );
        if let Err(error) = self.store.append_audit(&record).await {
            tracing::warn!(%error, action, entity_type, "failed to append audit record");
        }
    }

    /// Returns the audit trail for one entity, oldest first.
    pub async fn logs_for(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        Ok(self.store.audit_for_entity(entity_type, entity_id).await?)
    }
}
