//! [`SqliteStore`]: the SQLite implementation of [`ContactStore`].

use std::path::Path;

use chrono::Utc;
use knot_core::{
  contact::{Contact, LinkPrecedence, NewContact},
  store::ContactStore,
};
use rusqlite::{OptionalExtension as _, types::Value};

use crate::{
  Error, Result,
  encode::{CONTACT_COLUMNS, RawContact, encode_dt, encode_precedence},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Knot contact store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("contact schema ready");
    Ok(())
  }

  /// Run a `SELECT` over live rows and decode the results, ordered by id.
  ///
  /// `filter` is spliced after `WHERE deleted_at IS NULL AND`.
  async fn select(&self, filter: String, params: Vec<Value>) -> Result<Vec<Contact>> {
    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {CONTACT_COLUMNS} FROM contact
           WHERE deleted_at IS NULL AND ({filter})
           ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }

  /// Soft-delete a row. Only tests exercise deletion.
  #[cfg(test)]
  pub(crate) async fn soft_delete(&self, id: i64) -> Result<()> {
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE contact SET deleted_at = ?1 WHERE id = ?2",
          rusqlite::params![at_str, id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// The id of the live primary anchoring `id`'s cluster, or `None` if `id` is
/// absent or soft-deleted.
fn root_of(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<i64>> {
  let secondary = encode_precedence(LinkPrecedence::Secondary);
  conn
    .query_row(
      "SELECT CASE WHEN link_precedence = ?2 THEN linked_id ELSE id END
       FROM contact
       WHERE id = ?1 AND deleted_at IS NULL",
      rusqlite::params![id, secondary],
      |row| row.get(0),
    )
    .optional()
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn find_by_email(&self, email: &str) -> Result<Vec<Contact>> {
    let params = vec![Value::Text(email.to_owned())];
    self.select("email = ?1".to_owned(), params).await
  }

  async fn find_by_phone(&self, phone: &str) -> Result<Vec<Contact>> {
    let params = vec![Value::Text(phone.to_owned())];
    self.select("phone_number = ?1".to_owned(), params).await
  }

  async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Contact>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let placeholders = (1..=ids.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let params = ids.iter().copied().map(Value::Integer).collect();
    self.select(format!("id IN ({placeholders})"), params).await
  }

  async fn find_secondaries_of(&self, primary_id: i64) -> Result<Vec<Contact>> {
    self
      .select("linked_id = ?1".to_owned(), vec![Value::Integer(primary_id)])
      .await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, input: NewContact) -> Result<Contact> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    let precedence = encode_precedence(input.link_precedence);
    let email = input.email.clone();
    let phone = input.phone_number.clone();
    let requested_link = input.linked_id;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let linked_id = match requested_link {
          Some(id) => match root_of(&tx, id)? {
            Some(root) => Some(root),
            None => return Ok(Err(id)),
          },
          None => None,
        };

        tx.execute(
          "INSERT INTO contact (
             email, phone_number, linked_id, link_precedence,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![email, phone, linked_id, precedence, now_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok((id, linked_id)))
      })
      .await?;

    let (id, linked_id) = outcome.map_err(Error::ContactNotFound)?;
    Ok(Contact {
      id,
      email: input.email,
      phone_number: input.phone_number,
      linked_id,
      link_precedence: input.link_precedence,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    })
  }

  async fn reparent(&self, old_primary_id: i64, new_primary_id: i64) -> Result<i64> {
    let now_str = encode_dt(Utc::now());
    let secondary = encode_precedence(LinkPrecedence::Secondary);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(a) = root_of(&tx, old_primary_id)? else {
          return Ok(Err(old_primary_id));
        };
        let Some(b) = root_of(&tx, new_primary_id)? else {
          return Ok(Err(new_primary_id));
        };
        if a == b {
          return Ok(Ok(a));
        }
        let (senior, junior) = (a.min(b), a.max(b));

        let moved = tx.execute(
          "UPDATE contact
           SET link_precedence = ?1, linked_id = ?2, updated_at = ?3
           WHERE deleted_at IS NULL AND (id = ?4 OR linked_id = ?4)",
          rusqlite::params![secondary, senior, now_str, junior],
        )?;
        tx.commit()?;
        tracing::debug!(senior, junior, moved, "reparented cluster");
        Ok(Ok(senior))
      })
      .await?;

    outcome.map_err(Error::ContactNotFound)
  }
}
