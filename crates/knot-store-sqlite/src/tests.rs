//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use knot_core::{
  contact::{Fragment, LinkPrecedence, NewContact},
  resolver::Resolver,
  store::ContactStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn primary(email: Option<&str>, phone: Option<&str>) -> NewContact {
  NewContact {
    email:           email.map(str::to_owned),
    phone_number:    phone.map(str::to_owned),
    linked_id:       None,
    link_precedence: LinkPrecedence::Primary,
  }
}

fn secondary(email: Option<&str>, phone: Option<&str>, linked_id: i64) -> NewContact {
  NewContact {
    email:           email.map(str::to_owned),
    phone_number:    phone.map(str::to_owned),
    linked_id:       Some(linked_id),
    link_precedence: LinkPrecedence::Secondary,
  }
}

// ─── Inserts and reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_by_each_field() {
  let s = store().await;

  let c = s
    .insert(primary(Some("doc@hillvalley.edu"), Some("88")))
    .await
    .unwrap();
  assert_eq!(c.id, 1);
  assert!(c.is_primary());
  assert!(c.linked_id.is_none());

  let by_email = s.find_by_email("doc@hillvalley.edu").await.unwrap();
  assert_eq!(by_email, vec![c.clone()]);

  let by_phone = s.find_by_phone("88").await.unwrap();
  assert_eq!(by_phone.len(), 1);
  assert_eq!(by_phone[0].id, c.id);

  assert!(s.find_by_email("nobody@x.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn ids_are_monotonic() {
  let s = store().await;
  let a = s.insert(primary(Some("a@x.com"), None)).await.unwrap();
  let b = s.insert(primary(Some("b@x.com"), None)).await.unwrap();
  let c = s.insert(primary(None, Some("3"))).await.unwrap();
  assert!(a.id < b.id && b.id < c.id);
}

#[tokio::test]
async fn find_by_ids_skips_unknown_and_orders_by_id() {
  let s = store().await;
  let a = s.insert(primary(Some("a@x.com"), None)).await.unwrap();
  let b = s.insert(primary(Some("b@x.com"), None)).await.unwrap();

  let found = s.find_by_ids(&[b.id, 999, a.id]).await.unwrap();
  let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
  assert_eq!(ids, vec![a.id, b.id]);

  assert!(s.find_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn secondaries_are_found_by_link() {
  let s = store().await;
  let p = s.insert(primary(Some("a@x.com"), Some("1"))).await.unwrap();
  let s1 = s
    .insert(secondary(Some("a@x.com"), Some("2"), p.id))
    .await
    .unwrap();
  let s2 = s
    .insert(secondary(Some("b@x.com"), Some("1"), p.id))
    .await
    .unwrap();

  let found = s.find_secondaries_of(p.id).await.unwrap();
  let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
  assert_eq!(ids, vec![s1.id, s2.id]);
  assert!(found.iter().all(|c| c.linked_id == Some(p.id)));
}

#[tokio::test]
async fn secondary_needs_existing_target() {
  let s = store().await;
  let err = s
    .insert(secondary(Some("a@x.com"), None, 42))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::ContactNotFound(42)));
}

#[tokio::test]
async fn soft_deleted_rows_are_invisible() {
  let s = store().await;
  let p = s.insert(primary(Some("a@x.com"), Some("1"))).await.unwrap();
  let sec = s
    .insert(secondary(Some("b@x.com"), Some("1"), p.id))
    .await
    .unwrap();
  s.soft_delete(sec.id).await.unwrap();

  assert!(s.find_by_email("b@x.com").await.unwrap().is_empty());
  assert_eq!(s.find_by_phone("1").await.unwrap().len(), 1);
  assert!(s.find_by_ids(&[sec.id]).await.unwrap().is_empty());
  assert!(s.find_secondaries_of(p.id).await.unwrap().is_empty());
}

#[test]
fn precedence_column_matches_serde_name() {
  for p in [LinkPrecedence::Primary, LinkPrecedence::Secondary] {
    let column = crate::encode::encode_precedence(p);
    let serde_name = serde_json::to_value(p).unwrap();
    assert_eq!(serde_json::Value::from(column), serde_name);
    assert_eq!(crate::encode::decode_precedence(column).unwrap(), p);
  }
}

// ─── Reparenting ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reparent_moves_junior_and_its_secondaries() {
  let s = store().await;
  let p1 = s.insert(primary(Some("a@x.com"), None)).await.unwrap();
  let p2 = s.insert(primary(None, Some("222"))).await.unwrap();
  let child = s
    .insert(secondary(Some("c@x.com"), Some("222"), p2.id))
    .await
    .unwrap();

  let survivor = s.reparent(p2.id, p1.id).await.unwrap();
  assert_eq!(survivor, p1.id);

  let rows = s.find_by_ids(&[p1.id, p2.id, child.id]).await.unwrap();
  assert!(rows[0].is_primary());
  for row in &rows[1..] {
    assert_eq!(row.link_precedence, LinkPrecedence::Secondary);
    assert_eq!(row.linked_id, Some(p1.id));
  }
  assert!(rows[1].updated_at >= rows[1].created_at);
  assert!(s.find_secondaries_of(p2.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn reparent_keeps_senior_regardless_of_argument_order() {
  let s = store().await;
  let p1 = s.insert(primary(Some("a@x.com"), None)).await.unwrap();
  let p2 = s.insert(primary(Some("b@x.com"), None)).await.unwrap();

  assert_eq!(s.reparent(p1.id, p2.id).await.unwrap(), p1.id);
  let rows = s.find_by_ids(&[p1.id, p2.id]).await.unwrap();
  assert!(rows[0].is_primary());
  assert_eq!(rows[1].linked_id, Some(p1.id));
}

#[tokio::test]
async fn reparent_within_one_cluster_is_noop() {
  let s = store().await;
  let p = s.insert(primary(Some("a@x.com"), None)).await.unwrap();
  let sec = s
    .insert(secondary(None, Some("1"), p.id))
    .await
    .unwrap();

  assert_eq!(s.reparent(sec.id, p.id).await.unwrap(), p.id);
  let rows = s.find_by_ids(&[p.id, sec.id]).await.unwrap();
  assert!(rows[0].is_primary());
  assert_eq!(rows[1].linked_id, Some(p.id));
}

#[tokio::test]
async fn insert_linked_to_demoted_contact_is_flattened() {
  let s = store().await;
  let p1 = s.insert(primary(Some("a@x.com"), None)).await.unwrap();
  let p2 = s.insert(primary(Some("b@x.com"), None)).await.unwrap();
  s.reparent(p2.id, p1.id).await.unwrap();

  let late = s
    .insert(secondary(Some("b@x.com"), Some("9"), p2.id))
    .await
    .unwrap();
  assert_eq!(late.linked_id, Some(p1.id));
}

// ─── Resolver over SQLite ────────────────────────────────────────────────────

#[tokio::test]
async fn resolver_merges_clusters_in_sqlite() {
  let s = Arc::new(store().await);
  let resolver = Resolver::new(s.clone());
  let frag = |e: Option<&str>, p: Option<&str>| {
    Fragment::new(e.map(str::to_owned), p.map(str::to_owned)).unwrap()
  };

  resolver
    .resolve(frag(Some("george@hillvalley.edu"), Some("919191")))
    .await
    .unwrap();
  resolver
    .resolve(frag(Some("biffsucks@hillvalley.edu"), Some("717171")))
    .await
    .unwrap();

  let view = resolver
    .resolve(frag(Some("george@hillvalley.edu"), Some("717171")))
    .await
    .unwrap();

  assert_eq!(view.primary_contact_id, 1);
  assert_eq!(view.emails, vec![
    "george@hillvalley.edu",
    "biffsucks@hillvalley.edu"
  ]);
  assert_eq!(view.phone_numbers, vec!["919191", "717171"]);
  assert_eq!(view.secondary_contact_ids, vec![2]);

  let demoted = s.find_by_ids(&[2]).await.unwrap();
  assert_eq!(demoted[0].link_precedence, LinkPrecedence::Secondary);
  assert_eq!(demoted[0].linked_id, Some(1));
}
