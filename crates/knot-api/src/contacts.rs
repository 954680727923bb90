//! Handler for `GET /contacts/{id}`: the consolidated identity containing a
//! contact, whether that contact is the primary or a secondary.

use axum::{
  Json,
  extract::{Path, State, rejection::PathRejection},
};
use knot_core::store::ContactStore;
use serde_json::Value;

use crate::{ApiState, error::ApiError, wire::envelope};

/// `GET /contacts/{id}`: 404 if no live contact has that id.
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: ContactStore + 'static,
{
  let Path(id) = id.map_err(|e| ApiError::Malformed(e.body_text()))?;
  let view = state
    .resolver
    .cluster_of(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(envelope(&view, state.wire)))
}
