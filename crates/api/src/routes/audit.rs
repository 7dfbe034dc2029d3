//! Audit trail endpoint (admin only).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::DomainError;
use model::AuditRecord;
use store::Store;

use crate::AppState;
use crate::auth::Actor;
use crate::error::ApiError;

/// GET /audit/{entity_type}/{entity_id} — one entity's audit trail.
#[tracing::instrument(skip(state, actor))]
pub async fn for_entity<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path((entity_type, entity_id)): Path<(String, String)>,
    Actor(actor): Actor,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    if !actor.is_admin() {
        return Err(DomainError::Forbidden.into());
    }
    let records = state.audit.logs_for(&entity_type, &entity_id).await?;
    Ok(Json(records))
}
