//! SOAP transport for the BMS gateway.
//!
//! Exposes an axum [`Router`] that accepts `GenericRequest` envelopes on
//! `/ws`, dispatches them against any [`RecordStore`], and answers with a
//! `GenericResponse`.

pub mod audit;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod xml;

pub use error::Error;

use std::{
  net::SocketAddr,
  path::PathBuf,
  sync::Arc,
  time::{Duration, Instant},
};

use axum::{
  Router,
  extract::{ConnectInfo, Request, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use bms_core::{
  envelope::{HeaderPolicy, Request as GenericRequest},
  store::RecordStore,
  table::{DEFAULT_SCHEMA, TableRegistry},
};
use bms_store_sqlite::StoreOptions;
use bytes::Bytes;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{Instrument as _, info_span, warn};
use uuid::Uuid;

use audit::AuditEntry;
use dispatch::dispatch;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `BMS_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub database_path:    PathBuf,
  /// Name of the warehouse schema that qualifies every physical table.
  pub schema_name:      String,
  /// File backing the warehouse schema; in-memory when unset.
  pub schema_path:      Option<PathBuf>,
  pub bootstrap_schema: bool,
  pub busy_timeout_ms:  u64,
  /// Extra alias → physical table mappings.
  pub aliases:          Vec<TableAlias>,
  pub header:           HeaderPolicy,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "0.0.0.0".to_string(),
      port:             8080,
      database_path:    PathBuf::from("bms.db"),
      schema_name:      DEFAULT_SCHEMA.to_string(),
      schema_path:      None,
      bootstrap_schema: true,
      busy_timeout_ms:  5_000,
      aliases:          Vec::new(),
      header:           HeaderPolicy::default(),
    }
  }
}

/// One configured alias. Kept as a list entry rather than a map key so the
/// alias keeps its case.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TableAlias {
  pub alias: String,
  pub table: String,
}

impl ServerConfig {
  /// The standard registry for `schema_name` plus the configured aliases.
  pub fn registry(&self) -> bms_core::Result<TableRegistry> {
    self
      .aliases
      .iter()
      .try_fold(TableRegistry::standard(&self.schema_name), |registry, a| {
        registry.with_alias(&a.alias, &a.table)
      })
  }

  pub fn store_options(&self) -> bms_core::Result<StoreOptions> {
    Ok(StoreOptions {
      schema:       self.schema_name.clone(),
      schema_path:  self.schema_path.clone(),
      bootstrap:    self.bootstrap_schema,
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
      registry:     self.registry()?,
    })
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: RecordStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the SOAP endpoint.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecordStore + Clone + 'static,
{
  Router::new()
    .route("/ws",     post(ws_handler::<S>))
    .route("/ws/",    post(ws_handler::<S>))
    .route("/health", get(health_handler))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

pub(crate) fn soap_response(status: StatusCode, body: Vec<u8>) -> Response {
  (status, [(header::CONTENT_TYPE, SOAP_CONTENT_TYPE)], body).into_response()
}

async fn collect_body(req: Request) -> Result<Bytes, Error> {
  axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
    .await
    .map_err(|_| Error::PayloadTooLarge)
}

async fn read_request(req: Request) -> Result<GenericRequest, Error> {
  let body = collect_body(req).await?;
  xml::decode_request(&body)
}

// ─── Route handlers ──────────────────────────────────────────────────────────

async fn health_handler() -> &'static str { "ok" }

async fn ws_handler<S>(State(state): State<AppState<S>>, req: Request) -> Response
where
  S: RecordStore + Clone + 'static,
{
  let span = info_span!("soap", request_id = %Uuid::new_v4());
  handle_soap(state, req).instrument(span).await
}

async fn handle_soap<S>(state: AppState<S>, req: Request) -> Response
where
  S: RecordStore + Clone + 'static,
{
  let started = Instant::now();
  let peer = req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| *addr);
  let client = audit::client_address(req.headers(), peer);

  let request = match read_request(req).await {
    Ok(request) => request,
    Err(e) => {
      warn!(error = %e, %client, "undecodable request");
      let message = e.to_string();
      AuditEntry::fault(&client, e.status().as_u16(), &message, started.elapsed()).emit();
      return e.into_response();
    }
  };

  let response = dispatch(state.store.as_ref(), &state.config.header, &request).await;
  AuditEntry::new(&request, &response, &client, started.elapsed()).emit();

  match xml::encode_response(&response) {
    Ok(body) => soap_response(StatusCode::OK, body),
    Err(e) => e.into_response(),
  }
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{body::Body, http::Request};
  use bms_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig::default()),
    }
  }

  fn envelope(indicator: &str, id: Option<&str>, payload: &str) -> String {
    let id = id.map(|id| format!("<uhi:id>{id}</uhi:id>")).unwrap_or_default();
    format!(
      r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
                  xmlns:uhi="http://teradata.com/uhi">
  <soapenv:Body>
    <uhi:GenericRequest>
      <uhi:GGheader>
        <uhi:correlationId>1</uhi:correlationId>
        <uhi:originatingChannel>16</uhi:originatingChannel>
        <uhi:channelRequestId>1</uhi:channelRequestId>
        <uhi:originatingUserType>1</uhi:originatingUserType>
        <uhi:originatingUserIdentifier>2970430001808</uhi:originatingUserIdentifier>
        <uhi:serviceSlug>BMS-LOOKUP-01</uhi:serviceSlug>
        <uhi:serviceEntityId>1</uhi:serviceEntityId>
      </uhi:GGheader>
      {id}
      <uhi:indicator>{indicator}</uhi:indicator>
      <uhi:jsonPayload><![CDATA[{payload}]]></uhi:jsonPayload>
    </uhi:GenericRequest>
  </soapenv:Body>
</soapenv:Envelope>"#
    )
  }

  async fn oneshot_raw(
    state:  AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    body:   impl Into<Body>,
  ) -> Response {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, SOAP_CONTENT_TYPE)
      .body(body.into())
      .unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
  }

  fn response_code(xml: &str) -> &str {
    let start = xml.find("<ns2:responseCode>").unwrap() + "<ns2:responseCode>".len();
    let end = start + xml[start..].find('<').unwrap();
    &xml[start..end]
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_returns_ok() {
    let resp = oneshot_raw(make_state().await, "GET", "/health", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
  }

  // ── /ws ─────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn insert_then_lookup_over_soap() {
    let state   = make_state().await;
    let payload = r#"{"listName":"Area","list":[{"id":"1","name":"Cairo & Giza"}]}"#;
    let resp    = oneshot_raw(state.clone(), "POST", "/ws", envelope("i", None, payload)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/xml"), "Content-Type: {ct}");
    let xml = body_text(resp).await;
    assert_eq!(response_code(&xml), "200", "{xml}");

    let resp = oneshot_raw(state, "POST", "/ws/", envelope("L", Some("1"), r#"{"listName":"Area"}"#)).await;
    let xml  = body_text(resp).await;
    assert_eq!(response_code(&xml), "200", "{xml}");
    assert!(xml.contains("Lookup completed successfully"));
    assert!(xml.contains("Cairo &amp; Giza"), "{xml}");
  }

  #[tokio::test]
  async fn domain_failures_keep_http_200() {
    let state = make_state().await;
    let resp  = oneshot_raw(state.clone(), "POST", "/ws", envelope("l", Some("9"), r#"{"listName":"Area"}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let xml = body_text(resp).await;
    assert_eq!(response_code(&xml), "404");
    assert!(!xml.contains("ns2:data"));

    let resp = oneshot_raw(state, "POST", "/ws", envelope("delete", None, "{}")).await;
    assert_eq!(response_code(&body_text(resp).await), "302");
  }

  #[tokio::test]
  async fn missing_header_is_reported_in_body() {
    let body = r#"<Envelope><Body><GenericRequest><indicator>l</indicator></GenericRequest></Body></Envelope>"#;
    let resp = oneshot_raw(make_state().await, "POST", "/ws", body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let xml = body_text(resp).await;
    assert_eq!(response_code(&xml), "301");
    assert!(xml.contains("Missing GGHeader"));
  }

  #[tokio::test]
  async fn malformed_xml_returns_400_fault() {
    let resp = oneshot_raw(make_state().await, "POST", "/ws", "<Envelope><Body>").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let xml = body_text(resp).await;
    assert!(xml.contains("<faultcode>SOAP-ENV:Client</faultcode>"), "{xml}");
  }

  #[tokio::test]
  async fn oversized_body_returns_413() {
    let body = vec![b' '; MAX_BODY_BYTES + 1];
    let resp = oneshot_raw(make_state().await, "POST", "/ws", body).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }

  #[tokio::test]
  async fn get_on_ws_is_not_allowed() {
    let resp = oneshot_raw(make_state().await, "GET", "/ws", "").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
  }

  // ── Configuration ───────────────────────────────────────────────────────────

  #[test]
  fn config_layers_toml_over_defaults() {
    let toml = r#"
      port = 9090
      schema_name = "UHI"
      busy_timeout_ms = 250

      [[aliases]]
      alias = "Files"
      table = "UHI.files"

      [header]
      channels = ["7"]
    "#;
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(cfg.port, 9090);
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.header.channels, ["7"]);
    assert_eq!(cfg.header.user_types, ["1", "2"]);

    let options = cfg.store_options().unwrap();
    assert_eq!(options.busy_timeout, Duration::from_millis(250));
    assert_eq!(options.registry.get("Files"), Some("UHI.files"));
    assert_eq!(options.registry.get("Area"), Some("UHI.bms_Area_lkp"));
  }

  #[test]
  fn config_rejects_unsafe_aliases() {
    let cfg = ServerConfig {
      aliases: vec![TableAlias {
        alias: "Bad".to_string(),
        table: "UHI.t; DROP".to_string(),
      }],
      ..ServerConfig::default()
    };
    assert!(cfg.registry().is_err());
  }
}
