//! In-memory [`ContactStore`] backend.
//!
//! Every operation runs under a single mutex, so each call is atomic with
//! respect to every other. Intended for tests and embedded use.

use std::sync::{
  Arc, Mutex, MutexGuard, PoisonError,
  atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use thiserror::Error;

use crate::{
  contact::{Contact, LinkPrecedence, NewContact},
  store::ContactStore,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  /// Returned by every call while [`MemoryStore::set_unavailable`] is on.
  #[error("store unavailable")]
  Unavailable,

  #[error("contact not found: {0}")]
  ContactNotFound(i64),
}

#[derive(Debug, Default)]
struct State {
  /// Row `n` has id `n + 1`.
  rows: Vec<Contact>,
}

impl State {
  fn live(&self) -> impl Iterator<Item = &Contact> {
    self.rows.iter().filter(|c| c.deleted_at.is_none())
  }

  fn get(&self, id: i64) -> Option<&Contact> {
    usize::try_from(id - 1)
      .ok()
      .and_then(|i| self.rows.get(i))
      .filter(|c| c.deleted_at.is_none())
  }

  /// Follow one link to the current primary.
  fn root_of(&self, id: i64) -> Result<i64, MemoryError> {
    let contact = self.get(id).ok_or(MemoryError::ContactNotFound(id))?;
    Ok(contact.primary_id().unwrap_or(id))
  }
}

/// A thread-safe, in-process contact store.
///
/// Cloning is cheap; clones share the same rows.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
  state:       Arc<Mutex<State>>,
  unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Make every subsequent call fail with [`MemoryError::Unavailable`].
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  /// Every row, soft-deleted ones included, in id order.
  pub fn snapshot(&self) -> Vec<Contact> {
    self.lock().rows.clone()
  }

  /// Mark a row as soft-deleted. Returns `false` if no such row exists.
  pub fn soft_delete(&self, id: i64) -> bool {
    let mut state = self.lock();
    let Some(row) = usize::try_from(id - 1)
      .ok()
      .and_then(|i| state.rows.get_mut(i))
    else {
      return false;
    };
    row.deleted_at = Some(Utc::now());
    true
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn available(&self) -> Result<MutexGuard<'_, State>, MemoryError> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(MemoryError::Unavailable);
    }
    Ok(self.lock())
  }

  fn select(
    &self,
    pred: impl Fn(&Contact) -> bool,
  ) -> Result<Vec<Contact>, MemoryError> {
    let state = self.available()?;
    Ok(state.live().filter(|&c| pred(c)).cloned().collect())
  }
}

impl ContactStore for MemoryStore {
  type Error = MemoryError;

  async fn find_by_email(&self, email: &str) -> Result<Vec<Contact>, MemoryError> {
    self.select(|c| c.email.as_deref() == Some(email))
  }

  async fn find_by_phone(&self, phone: &str) -> Result<Vec<Contact>, MemoryError> {
    self.select(|c| c.phone_number.as_deref() == Some(phone))
  }

  async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Contact>, MemoryError> {
    self.select(|c| ids.contains(&c.id))
  }

  async fn find_secondaries_of(
    &self,
    primary_id: i64,
  ) -> Result<Vec<Contact>, MemoryError> {
    self.select(|c| c.linked_id == Some(primary_id))
  }

  async fn insert(&self, input: NewContact) -> Result<Contact, MemoryError> {
    let mut state = self.available()?;

    let linked_id = input
      .linked_id
      .map(|id| state.root_of(id))
      .transpose()?;

    let now = Utc::now();
    let contact = Contact {
      id: state.rows.len() as i64 + 1,
      email: input.email,
      phone_number: input.phone_number,
      linked_id,
      link_precedence: input.link_precedence,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    };
    state.rows.push(contact.clone());
    Ok(contact)
  }

  async fn reparent(
    &self,
    old_primary_id: i64,
    new_primary_id: i64,
  ) -> Result<i64, MemoryError> {
    let mut state = self.available()?;

    let a = state.root_of(old_primary_id)?;
    let b = state.root_of(new_primary_id)?;
    if a == b {
      return Ok(a);
    }
    let (senior, junior) = (a.min(b), a.max(b));

    let now = Utc::now();
    for row in state.rows.iter_mut().filter(|c| c.deleted_at.is_none()) {
      if row.id == junior || row.linked_id == Some(junior) {
        row.link_precedence = LinkPrecedence::Secondary;
        row.linked_id = Some(senior);
        row.updated_at = now;
      }
    }
    Ok(senior)
  }
}
