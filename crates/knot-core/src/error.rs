//! Error types for `knot-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The fragment carried neither an email nor a phone number.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// A secondary contact whose primary is missing from the store.
  #[error("contact {contact_id} links to missing primary {linked_id:?}")]
  DanglingLink {
    contact_id: i64,
    linked_id:  Option<i64>,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Stable machine-readable code, suitable for wire responses.
  pub fn code(&self) -> &'static str {
    match self {
      Self::InvalidInput(_) => "invalid_input",
      Self::DanglingLink { .. } => "integrity",
      Self::Store(_) => "store_unavailable",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
