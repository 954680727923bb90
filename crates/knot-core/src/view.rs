//! The consolidated read model for a cluster.
//!
//! A [`ConsolidatedContact`] is never stored; it is assembled from a primary
//! and its secondaries every time a cluster is resolved.

use std::{collections::HashSet, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::contact::{Contact, Fragment};

// ─── OrderedSet ──────────────────────────────────────────────────────────────

/// An insertion-ordered collection that ignores repeated values.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
  items: Vec<T>,
  seen:  HashSet<T>,
}

impl<T: Clone + Eq + Hash> OrderedSet<T> {
  pub fn new() -> Self {
    Self { items: Vec::new(), seen: HashSet::new() }
  }

  /// Append `value` unless it is already present. Returns whether it was
  /// added.
  pub fn insert(&mut self, value: T) -> bool {
    if self.seen.contains(&value) {
      return false;
    }
    self.seen.insert(value.clone());
    self.items.push(value);
    true
  }

  pub fn contains(&self, value: &T) -> bool { self.seen.contains(value) }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  pub fn iter(&self) -> std::slice::Iter<'_, T> { self.items.iter() }

  pub fn into_vec(self) -> Vec<T> { self.items }
}

impl<T: Clone + Eq + Hash> Default for OrderedSet<T> {
  fn default() -> Self { Self::new() }
}

impl<T: Clone + Eq + Hash> Extend<T> for OrderedSet<T> {
  fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
    for value in iter {
      self.insert(value);
    }
  }
}

impl<T: Clone + Eq + Hash> FromIterator<T> for OrderedSet<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    let mut set = Self::new();
    set.extend(iter);
    set
  }
}

// ─── ConsolidatedContact ─────────────────────────────────────────────────────

/// Every value known for one identity, anchored at its primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
  pub primary_contact_id:    i64,
  /// Distinct emails; the primary's first, then in secondary id order.
  pub emails:                Vec<String>,
  /// Distinct phone numbers; the primary's first, then in secondary id order.
  pub phone_numbers:         Vec<String>,
  /// Ids of every secondary in the cluster, ascending.
  pub secondary_contact_ids: Vec<i64>,
}

impl ConsolidatedContact {
  /// Build the view of a cluster from its primary and secondaries.
  ///
  /// `secondaries` may arrive in any order; they are folded in by id.
  pub fn from_cluster(primary: &Contact, secondaries: &[Contact]) -> Self {
    let mut ordered: Vec<&Contact> = secondaries.iter().collect();
    ordered.sort_by_key(|c| c.id);

    let members = std::iter::once(primary).chain(ordered.iter().copied());

    let mut emails = OrderedSet::new();
    let mut phones = OrderedSet::new();
    let mut ids = OrderedSet::new();
    for contact in members {
      emails.extend(contact.email.clone());
      phones.extend(contact.phone_number.clone());
      if contact.id != primary.id {
        ids.insert(contact.id);
      }
    }

    Self {
      primary_contact_id:    primary.id,
      emails:                emails.into_vec(),
      phone_numbers:         phones.into_vec(),
      secondary_contact_ids: ids.into_vec(),
    }
  }

  /// A freshly created primary with no secondaries.
  pub fn singleton(primary: &Contact) -> Self {
    Self::from_cluster(primary, &[])
  }

  /// Whether `fragment` carries a value this cluster does not yet hold.
  pub fn is_novel(&self, fragment: &Fragment) -> bool {
    let new_email = fragment
      .email()
      .is_some_and(|e| !self.emails.iter().any(|known| known == e));
    let new_phone = fragment
      .phone_number()
      .is_some_and(|p| !self.phone_numbers.iter().any(|known| known == p));
    new_email || new_phone
  }

  /// Fold a newly attached secondary into the view.
  pub fn absorb(&mut self, secondary: &Contact) {
    if let Some(email) = &secondary.email
      && !self.emails.contains(email)
    {
      self.emails.push(email.clone());
    }
    if let Some(phone) = &secondary.phone_number
      && !self.phone_numbers.contains(phone)
    {
      self.phone_numbers.push(phone.clone());
    }
    if !self.secondary_contact_ids.contains(&secondary.id) {
      self.secondary_contact_ids.push(secondary.id);
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::contact::LinkPrecedence;

  fn contact(
    id: i64,
    email: Option<&str>,
    phone: Option<&str>,
    linked_id: Option<i64>,
  ) -> Contact {
    let now = Utc::now();
    Contact {
      id,
      email: email.map(str::to_owned),
      phone_number: phone.map(str::to_owned),
      linked_id,
      link_precedence: if linked_id.is_some() {
        LinkPrecedence::Secondary
      } else {
        LinkPrecedence::Primary
      },
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }

  #[test]
  fn ordered_set_keeps_first_seen_order() {
    let set: OrderedSet<&str> = ["b", "a", "b", "c", "a"].into_iter().collect();
    assert_eq!(set.len(), 3);
    assert!(set.contains(&"c"));
    assert_eq!(set.into_vec(), vec!["b", "a", "c"]);
  }

  #[test]
  fn primary_values_come_first() {
    let primary = contact(1, Some("lorraine@hillvalley.edu"), Some("123456"), None);
    let secondaries = vec![
      contact(23, Some("mcfly@hillvalley.edu"), Some("123456"), Some(1)),
      contact(7, None, Some("999"), Some(1)),
    ];

    let view = ConsolidatedContact::from_cluster(&primary, &secondaries);
    assert_eq!(view.primary_contact_id, 1);
    assert_eq!(
      view.emails,
      vec!["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"]
    );
    assert_eq!(view.phone_numbers, vec!["123456", "999"]);
    assert_eq!(view.secondary_contact_ids, vec![7, 23]);
  }

  #[test]
  fn absent_values_are_skipped() {
    let primary = contact(4, None, Some("555"), None);
    let view = ConsolidatedContact::singleton(&primary);
    assert!(view.emails.is_empty());
    assert_eq!(view.phone_numbers, vec!["555"]);
    assert!(view.secondary_contact_ids.is_empty());
  }

  #[test]
  fn novelty_checks_each_value() {
    let primary = contact(1, Some("a@x.com"), Some("111"), None);
    let view = ConsolidatedContact::singleton(&primary);

    let same = Fragment::new(Some("a@x.com".into()), Some("111".into())).unwrap();
    let email_only = Fragment::new(Some("a@x.com".into()), None).unwrap();
    let new_phone = Fragment::new(Some("a@x.com".into()), Some("222".into())).unwrap();

    assert!(!view.is_novel(&same));
    assert!(!view.is_novel(&email_only));
    assert!(view.is_novel(&new_phone));
  }

  #[test]
  fn absorb_appends_only_new_values() {
    let primary = contact(1, Some("a@x.com"), Some("111"), None);
    let mut view = ConsolidatedContact::singleton(&primary);
    view.absorb(&contact(2, Some("a@x.com"), Some("222"), Some(1)));

    assert_eq!(view.emails, vec!["a@x.com"]);
    assert_eq!(view.phone_numbers, vec!["111", "222"]);
    assert_eq!(view.secondary_contact_ids, vec![2]);
  }
}
