//! Handler for `POST /identify`.
//!
//! Body: `{"email": "...", "phoneNumber": "..."}`; either field may be
//! omitted or null, but not both. `phoneNumber` may also be a JSON number.

use std::fmt;

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use knot_core::{contact::Fragment, store::ContactStore};
use serde::Deserialize;
use serde_json::Value;

use crate::{ApiState, error::ApiError, wire::envelope};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyBody {
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default)]
  pub phone_number: Option<PhoneInput>,
}

/// Phone numbers arrive as strings or, from some clients, as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PhoneInput {
  Text(String),
  Number(serde_json::Number),
}

impl fmt::Display for PhoneInput {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PhoneInput::Text(s) => f.write_str(s),
      PhoneInput::Number(n) => write!(f, "{n}"),
    }
  }
}

/// `POST /identify`: returns 200 + the consolidated contact.
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<IdentifyBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: ContactStore + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::Malformed(e.body_text()))?;
  let fragment = Fragment::new(
    body.email,
    body.phone_number.map(|p| p.to_string()),
  )?;

  let view = state.resolver.resolve(fragment).await?;
  Ok(Json(envelope(&view, state.wire)))
}
