//! Identity reconciliation.
//!
//! Given a [`Fragment`], the [`Resolver`] decides whether it describes a new
//! identity, a new alias of a known identity, or proof that two known
//! identities are the same person, and updates the store to match.
//!
//! Resolution for one fragment runs under [`KeyLocks`] held for every value
//! the fragment carries, so concurrent requests that share an email or phone
//! number observe each other's writes.

use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  contact::{Contact, Fragment, NewContact},
  locks::KeyLocks,
  store::ContactStore,
  view::ConsolidatedContact,
};

/// Links are flat, so a single hop normally suffices; the bound guards against
/// a corrupted store containing a cycle.
const MAX_LINK_HOPS: usize = 4;

/// The reconciliation engine, generic over its storage backend.
pub struct Resolver<S> {
  store: Arc<S>,
  locks: KeyLocks,
}

impl<S: ContactStore> Resolver<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, locks: KeyLocks::new() }
  }

  /// Reconcile `fragment` against the store and return the consolidated
  /// identity it belongs to.
  pub async fn resolve(&self, fragment: Fragment) -> Result<ConsolidatedContact> {
    fragment.ensure_present()?;
    let _guard = self.locks.acquire(fragment.lock_keys()).await;

    let candidates = self.candidates(&fragment).await?;
    debug!(
      email = ?fragment.email(),
      phone = ?fragment.phone_number(),
      by_email = candidates.by_email.len(),
      by_phone = candidates.by_phone.len(),
      collision = candidates.collides(),
      "fetched candidates",
    );

    let primaries = self.primaries_of(&candidates).await?;

    let [senior, juniors @ ..] = primaries.as_slice() else {
      let created = self
        .store
        .insert(NewContact::primary(&fragment))
        .await
        .map_err(Error::store)?;
      info!(contact_id = created.id, "created primary contact");
      return Ok(ConsolidatedContact::singleton(&created));
    };

    if !juniors.is_empty() {
      // The email and the phone each hit a different cluster.
      let mut survivor = senior.id;
      for junior in juniors {
        survivor = self
          .store
          .reparent(junior.id, survivor)
          .await
          .map_err(Error::store)?;
        info!(
          primary_id = survivor,
          demoted_id = junior.id,
          "merged clusters"
        );
      }
      return self.assemble(survivor).await;
    }

    let primary_id = senior.id;
    let mut view = self.assemble(primary_id).await?;
    if !view.is_novel(&fragment) {
      debug!(primary_id, "fragment already known");
      return Ok(view);
    }

    let created = self
      .store
      .insert(NewContact::secondary(&fragment, primary_id))
      .await
      .map_err(Error::store)?;
    info!(
      contact_id = created.id,
      primary_id, "attached secondary contact"
    );

    match created.linked_id {
      Some(linked) if linked == primary_id => {
        view.absorb(&created);
        Ok(view)
      }
      // The store re-pointed the row at a newer primary.
      _ => self.assemble(created.primary_id().unwrap_or(primary_id)).await,
    }
  }

  /// The consolidated identity containing contact `contact_id`, or `None` if
  /// no such contact exists or its primary has been deleted.
  pub async fn cluster_of(
    &self,
    contact_id: i64,
  ) -> Result<Option<ConsolidatedContact>> {
    let found = self
      .store
      .find_by_ids(&[contact_id])
      .await
      .map_err(Error::store)?;
    let Some(contact) = found.into_iter().next() else {
      return Ok(None);
    };
    let primary_id = contact.primary_id().ok_or(Error::DanglingLink {
      contact_id,
      linked_id: None,
    })?;
    match self.live_primary(primary_id).await? {
      Some(primary) => self.cluster(&primary).await.map(Some),
      None => Ok(None),
    }
  }

  /// Contacts matching the fragment's email, then those matching its phone
  /// that the email query did not already return.
  async fn candidates(&self, fragment: &Fragment) -> Result<Candidates> {
    let by_email = match fragment.email() {
      Some(email) => self
        .store
        .find_by_email(email)
        .await
        .map_err(Error::store)?,
      None => Vec::new(),
    };

    let phone_hits = match fragment.phone_number() {
      Some(phone) => self
        .store
        .find_by_phone(phone)
        .await
        .map_err(Error::store)?,
      None => Vec::new(),
    };
    let phone_matched = !phone_hits.is_empty();
    let by_phone = phone_hits
      .into_iter()
      .filter(|c| !by_email.iter().any(|e| e.id == c.id))
      .collect();

    Ok(Candidates { by_email, by_phone, phone_matched })
  }

  /// The distinct live primaries anchoring the candidates, ascending by id.
  ///
  /// A secondary whose primary has been deleted belongs to no live cluster
  /// and is skipped, so it can neither anchor nor join a resolution.
  async fn primaries_of(&self, candidates: &Candidates) -> Result<Vec<Contact>> {
    let mut ids = BTreeSet::new();
    for contact in candidates.iter() {
      let primary_id = contact.primary_id().ok_or(Error::DanglingLink {
        contact_id: contact.id,
        linked_id:  None,
      })?;
      ids.insert(primary_id);
    }
    let ids: Vec<i64> = ids.into_iter().collect();

    let mut primaries = self
      .store
      .find_by_ids(&ids)
      .await
      .map_err(Error::store)?;
    primaries.sort_by_key(|c| c.id);

    for contact in candidates.iter() {
      let linked = contact.primary_id();
      if !primaries.iter().any(|p| Some(p.id) == linked) {
        warn!(
          contact_id = contact.id,
          linked_id = ?linked,
          "ignoring contact whose primary is deleted"
        );
      }
    }

    // A row read as primary above may since have been demoted by a merge
    // that shares none of our keys; the first live one of each chain wins.
    let mut live = Vec::with_capacity(primaries.len());
    for primary in primaries {
      if let Some(root) = self.live_primary(primary.id).await?
        && !live.iter().any(|p: &Contact| p.id == root.id)
      {
        live.push(root);
      }
    }
    live.sort_by_key(|c| c.id);
    Ok(live)
  }

  /// Follow links from `id` to the live primary currently anchoring it.
  ///
  /// `None` if the chain ends at a deleted or missing row.
  async fn live_primary(&self, id: i64) -> Result<Option<Contact>> {
    let mut id = id;
    for _ in 0..MAX_LINK_HOPS {
      let Some(contact) = self
        .store
        .find_by_ids(&[id])
        .await
        .map_err(Error::store)?
        .into_iter()
        .next()
      else {
        return Ok(None);
      };

      if contact.is_primary() {
        return Ok(Some(contact));
      }
      // Demoted by a concurrent merge since we read it.
      id = contact.primary_id().ok_or(Error::DanglingLink {
        contact_id: contact.id,
        linked_id:  None,
      })?;
    }

    Err(Error::DanglingLink { contact_id: id, linked_id: Some(id) })
  }

  /// Read the cluster anchored at `primary_id` back out of the store.
  async fn assemble(&self, primary_id: i64) -> Result<ConsolidatedContact> {
    let primary = self.live_primary(primary_id).await?.ok_or(
      Error::DanglingLink { contact_id: primary_id, linked_id: Some(primary_id) },
    )?;
    self.cluster(&primary).await
  }

  async fn cluster(&self, primary: &Contact) -> Result<ConsolidatedContact> {
    let secondaries = self
      .store
      .find_secondaries_of(primary.id)
      .await
      .map_err(Error::store)?;
    Ok(ConsolidatedContact::from_cluster(primary, &secondaries))
  }
}

/// Rows matched by one fragment.
struct Candidates {
  by_email:      Vec<Contact>,
  /// Phone matches not already in `by_email`.
  by_phone:      Vec<Contact>,
  /// Whether the phone matched anything at all, before de-duplication.
  phone_matched: bool,
}

impl Candidates {
  /// Email and phone each hit at least one existing row.
  fn collides(&self) -> bool {
    !self.by_email.is_empty() && self.phone_matched
  }

  fn iter(&self) -> impl Iterator<Item = &Contact> {
    self.by_email.iter().chain(&self.by_phone)
  }
}
