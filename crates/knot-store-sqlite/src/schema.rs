//! SQL schema for the Knot SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per identity fragment. email and phone_number are never updated;
-- only the link columns change, when a merge demotes a primary.
CREATE TABLE IF NOT EXISTS contact (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number    TEXT,
    email           TEXT,
    linked_id       INTEGER REFERENCES contact(id),
    link_precedence TEXT NOT NULL,   -- 'primary' | 'secondary'
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at      TEXT NOT NULL,   -- RFC 3339 UTC
    deleted_at      TEXT,            -- soft deletion; NULL while live
    CHECK (
      (link_precedence = 'primary'   AND linked_id IS NULL) OR
      (link_precedence = 'secondary' AND linked_id IS NOT NULL)
    )
);

CREATE INDEX IF NOT EXISTS contact_email_idx  ON contact(email);
CREATE INDEX IF NOT EXISTS contact_phone_idx  ON contact(phone_number);
CREATE INDEX IF NOT EXISTS contact_linked_idx ON contact(linked_id);

PRAGMA user_version = 1;
";
