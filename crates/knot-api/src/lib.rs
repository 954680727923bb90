//! JSON entry point for Knot.
//!
//! Exposes an axum [`Router`] backed by a [`Resolver`] over any
//! [`ContactStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/identify` | Body: `{"email"?, "phoneNumber"?}` |
//! | `GET`  | `/contacts/{id}` | Cluster containing contact `id`; 404 if absent |

pub mod contacts;
pub mod error;
pub mod identify;
pub mod wire;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use knot_core::{resolver::Resolver, store::ContactStore};

pub use error::ApiError;
pub use wire::WireOptions;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub resolver: Arc<Resolver<S>>,
  pub wire:     WireOptions,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { resolver: self.resolver.clone(), wire: self.wire }
  }
}

/// Build the API router for `resolver`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(resolver: Arc<Resolver<S>>, wire: WireOptions) -> Router<()>
where
  S: ContactStore + 'static,
{
  Router::new()
    .route("/identify", post(identify::handler::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .with_state(ApiState { resolver, wire })
}
