//! The JSON envelope shared by every successful response.

use knot_core::view::ConsolidatedContact;
use serde_json::{Value, json};

/// Key legacy clients expect for the primary id, typo included.
pub const LEGACY_PRIMARY_KEY: &str = "primaryContatctId";

/// Response shape options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireOptions {
  /// Emit [`LEGACY_PRIMARY_KEY`] instead of `primaryContactId`.
  pub legacy_field_names: bool,
}

/// Wrap a view as `{"contact": {...}}`.
pub fn envelope(view: &ConsolidatedContact, opts: WireOptions) -> Value {
  let mut contact = json!(view);
  if opts.legacy_field_names
    && let Some(fields) = contact.as_object_mut()
    && let Some(id) = fields.remove("primaryContactId")
  {
    fields.insert(LEGACY_PRIMARY_KEY.to_owned(), id);
  }
  json!({ "contact": contact })
}
