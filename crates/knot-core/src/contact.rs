//! Contact types: the stored identity fragments and the input that creates
//! them.
//!
//! A contact's `email` and `phone_number` never change after creation. Only
//! its link (precedence and `linked_id`) is rewritten, and only when a merge
//! demotes a primary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Link precedence ─────────────────────────────────────────────────────────

/// Whether a contact anchors its cluster or aliases another contact.
///
/// The string forms (`"primary"`, `"secondary"`) are what the stores persist.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkPrecedence {
  Primary,
  Secondary,
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// One stored identity fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  /// Store-assigned, monotonically increasing. Lower is more senior.
  pub id:              i64,
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  /// Set only for secondaries; always names the cluster's current primary.
  pub linked_id:       Option<i64>,
  pub link_precedence: LinkPrecedence,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  /// Soft-deletion marker. Rows with this set are never returned by a store.
  pub deleted_at:      Option<DateTime<Utc>>,
}

impl Contact {
  pub fn is_primary(&self) -> bool {
    self.link_precedence == LinkPrecedence::Primary
  }

  /// The id of the primary anchoring this contact's cluster.
  ///
  /// `None` only for a malformed secondary with no `linked_id`.
  pub fn primary_id(&self) -> Option<i64> {
    match self.link_precedence {
      LinkPrecedence::Primary => Some(self.id),
      LinkPrecedence::Secondary => self.linked_id,
    }
  }
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactStore::insert`].
/// `id` and timestamps are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  pub linked_id:       Option<i64>,
  pub link_precedence: LinkPrecedence,
}

impl NewContact {
  /// A contact that starts a new cluster.
  pub fn primary(fragment: &Fragment) -> Self {
    Self {
      email:           fragment.email.clone(),
      phone_number:    fragment.phone_number.clone(),
      linked_id:       None,
      link_precedence: LinkPrecedence::Primary,
    }
  }

  /// A contact that joins the cluster anchored at `primary_id`.
  pub fn secondary(fragment: &Fragment, primary_id: i64) -> Self {
    Self {
      email:           fragment.email.clone(),
      phone_number:    fragment.phone_number.clone(),
      linked_id:       Some(primary_id),
      link_precedence: LinkPrecedence::Secondary,
    }
  }
}

// ─── Fragment ────────────────────────────────────────────────────────────────

/// One sighting of an identity: an email, a phone number, or both.
///
/// The fields are private so that [`Fragment::new`], which normalises both
/// values and rejects a fragment that carries neither, is the only way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
  email:        Option<String>,
  phone_number: Option<String>,
}

impl Fragment {
  /// Trim both values, treat empty strings as absent and lowercase the email.
  pub fn new(
    email: Option<String>,
    phone_number: Option<String>,
  ) -> Result<Self> {
    let fragment = Self {
      email:        normalize_email(email),
      phone_number: normalize_phone(phone_number),
    };
    fragment.ensure_present()?;
    Ok(fragment)
  }

  /// Build a fragment without normalising or validating it.
  #[cfg(test)]
  pub(crate) fn unchecked(
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Self {
    Self {
      email:        email.map(str::to_owned),
      phone_number: phone_number.map(str::to_owned),
    }
  }

  pub fn email(&self) -> Option<&str> { self.email.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }

  /// Fails with [`Error::InvalidInput`] unless at least one value is present.
  pub fn ensure_present(&self) -> Result<()> {
    if self.email.is_none() && self.phone_number.is_none() {
      return Err(Error::InvalidInput(
        "either email or phoneNumber must be provided".to_owned(),
      ));
    }
    Ok(())
  }

  /// Lock keys covering every value this fragment carries.
  pub fn lock_keys(&self) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    if let Some(email) = &self.email {
      keys.push(format!("email:{email}"));
    }
    if let Some(phone) = &self.phone_number {
      keys.push(format!("phone:{phone}"));
    }
    keys
  }
}

fn normalize_email(raw: Option<String>) -> Option<String> {
  raw
    .map(|e| e.trim().to_ascii_lowercase())
    .filter(|e| !e.is_empty())
}

fn normalize_phone(raw: Option<String>) -> Option<String> {
  raw.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty())
}
