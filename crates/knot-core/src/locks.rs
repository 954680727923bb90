//! Per-key async mutual exclusion.
//!
//! The resolver reads candidates and then writes based on what it saw. Two
//! requests carrying the same email or phone number must not interleave those
//! phases, so each request first takes one lock per value it carries.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// A table of async mutexes created on demand and evicted once idle.
#[derive(Debug, Default, Clone)]
pub struct KeyLocks {
  slots: Slots,
}

/// Holds every lock taken by one [`KeyLocks::acquire`] call until dropped.
#[must_use = "the locks are released as soon as the guard is dropped"]
pub struct KeyGuard {
  keys:    Vec<String>,
  mutexes: Vec<Arc<AsyncMutex<()>>>,
  guards:  Vec<OwnedMutexGuard<()>>,
  slots:   Slots,
}

impl KeyLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait for exclusive access to every key in `keys`.
  ///
  /// Keys are taken in sorted order so that two callers with overlapping key
  /// sets cannot deadlock.
  pub async fn acquire(&self, keys: impl IntoIterator<Item = String>) -> KeyGuard {
    let mut keys: Vec<String> = keys.into_iter().collect();
    keys.sort();
    keys.dedup();

    let mutexes: Vec<Arc<AsyncMutex<()>>> = {
      let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      keys
        .iter()
        .map(|k| slots.entry(k.clone()).or_default().clone())
        .collect()
    };

    // Built before the first await: if this future is dropped while waiting,
    // the guard's `Drop` still evicts the entries registered above.
    let mut guard = KeyGuard {
      keys,
      guards: Vec::with_capacity(mutexes.len()),
      mutexes,
      slots: self.slots.clone(),
    };
    for i in 0..guard.mutexes.len() {
      let mutex = guard.mutexes[i].clone();
      guard.guards.push(mutex.lock_owned().await);
    }
    guard
  }

  /// Number of keys currently tracked (held or awaited).
  pub fn tracked(&self) -> usize {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

impl Drop for KeyGuard {
  fn drop(&mut self) {
    self.guards.clear();
    self.mutexes.clear();

    // Entries are cloned out only under the slots lock, so a count of one
    // here means no other caller holds, awaits or is about to await the key.
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    for key in &self.keys {
      if slots.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
        slots.remove(key);
      }
    }
  }
}
