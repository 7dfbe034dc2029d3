//! Actor-context extraction from gateway headers.
//!
//! The upstream gateway authenticates the caller and forwards the result as
//! `X-Actor-Id` (customer UUID) and `X-Actor-Roles` (comma-separated role
//! names). Requests without these headers get an anonymous context, which
//! fails every role check downstream.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use model::{ActorContext, CustomerId, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

/// Extractor wrapper around [`ActorContext`].
#[derive(Debug, Clone)]
pub struct Actor(pub ActorContext);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer_id = match parts.headers.get(ACTOR_ID_HEADER) {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest("invalid X-Actor-Id header".into()))?;
                let uuid = Uuid::parse_str(raw).map_err(|e| {
                    ApiError::BadRequest(format!("invalid X-Actor-Id header: {e}"))
                })?;
                Some(CustomerId::from_uuid(uuid))
            }
            None => None,
        };

        // Unknown role names are ignored; the gateway owns the vocabulary.
        let roles = match parts.headers.get(ACTOR_ROLES_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| ApiError::BadRequest("invalid X-Actor-Roles header".into()))?
                .split(',')
                .filter_map(|role| Role::parse(role.trim()))
                .collect(),
            None => Vec::new(),
        };

        Ok(Actor(ActorContext { customer_id, roles }))
    }
}
