//! Server wiring for Knot: configuration and application assembly.
//!
//! The binary in `main.rs` parses flags, initialises tracing, and calls into
//! this module; everything here is also exercised by the tests below.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use knot_api::{WireOptions, api_router};
use knot_core::{resolver::Resolver, store::ContactStore};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `KNOT_*`
/// environment variables. Every field has a default.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Emit `primaryContatctId` for legacy clients.
  #[serde(default)]
  pub legacy_field_names: bool,
}

fn default_host() -> String { "0.0.0.0".to_owned() }

fn default_port() -> u16 { 9003 }

fn default_store_path() -> PathBuf { PathBuf::from("knot.db") }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               default_host(),
      port:               default_port(),
      store_path:         default_store_path(),
      legacy_field_names: false,
    }
  }
}

impl ServerConfig {
  /// Layer the TOML file at `path` (optional) under `KNOT_*` environment
  /// variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("KNOT"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn wire(&self) -> WireOptions {
    WireOptions { legacy_field_names: self.legacy_field_names }
  }
}

// ─── Application ──────────────────────────────────────────────────────────────

/// Build the full HTTP application over `store`.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: ContactStore + 'static,
{
  let resolver = Arc::new(Resolver::new(store));
  api_router(resolver, config.wire()).layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use knot_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.port, 9003);
    assert_eq!(cfg.store_path, PathBuf::from("knot.db"));
    assert!(!cfg.legacy_field_names);
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      "port = 8080\nstore_path = \"/var/lib/knot/contacts.db\"\nlegacy_field_names = true"
    )
    .unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.address(), "0.0.0.0:8080");
    assert!(cfg.wire().legacy_field_names);
  }

  #[test]
  fn tilde_expands_only_at_start() {
    let plain = Path::new("/data/~/knot.db");
    assert_eq!(expand_tilde(plain), plain.to_path_buf());
  }

  #[tokio::test]
  async fn app_serves_identify_over_sqlite() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let config = ServerConfig { legacy_field_names: true, ..Default::default() };
    let router = app(store, &config);

    let req = Request::builder()
      .method("POST")
      .uri("/identify")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"email":"doc@hillvalley.edu","phoneNumber":"88"}"#))
      .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["contact"]["primaryContatctId"], 1);
    assert_eq!(body["contact"]["phoneNumbers"], serde_json::json!(["88"]));
  }
}
