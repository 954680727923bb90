//! The `ContactStore` trait, the gateway between the resolver and storage.
//!
//! The trait is implemented by storage backends (e.g. `knot-store-sqlite`,
//! and [`crate::memory::MemoryStore`] for tests). The resolver depends on
//! this abstraction, never on a concrete backend.

use std::future::Future;

use crate::contact::{Contact, NewContact};

/// Abstraction over a Knot contact store backend.
///
/// Every read excludes soft-deleted rows and returns contacts ordered by id
/// ascending. Backends hold no business rules beyond keeping links flat: a
/// secondary must never end up linked to a contact that is itself a
/// secondary.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ContactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All contacts whose email equals `email`.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + 'a;

  /// All contacts whose phone number equals `phone`.
  fn find_by_phone<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + 'a;

  /// The contacts with the given ids. Unknown ids are silently skipped.
  fn find_by_ids<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + 'a;

  /// All contacts whose `linked_id` is `primary_id`.
  fn find_secondaries_of(
    &self,
    primary_id: i64,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new contact and return it with its assigned id and
  /// timestamps.
  ///
  /// If `input.linked_id` names a contact that has since been demoted, the
  /// new row links to that contact's current primary instead.
  fn insert(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Demote `old_primary_id` under `new_primary_id`, re-pointing every
  /// secondary of the demoted contact in the same atomic step.
  ///
  /// Both ids are first resolved to their current primaries; if those
  /// coincide nothing changes, otherwise the lower id survives. Returns the
  /// id of the surviving primary.
  fn reparent(
    &self,
    old_primary_id: i64,
    new_primary_id: i64,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;
}
