//! Per-request audit events.
//!
//! Exactly one event is emitted per request under the `bms_soap::audit`
//! target, whatever the outcome. Route it to its own sink with an
//! `EnvFilter` directive such as `bms_soap::audit=info`.

use std::{borrow::Cow, net::SocketAddr, time::Duration};

use axum::http::HeaderMap;
use bms_core::{
  envelope::{Indicator, Request},
  response::Response,
};
use tracing::info;

/// Longest payload or data text kept in an audit event, in characters.
pub const MAX_AUDIT_TEXT: usize = 1000;

const UNKNOWN: &str = "-";

/// Shorten `text` to [`MAX_AUDIT_TEXT`] characters, marking the cut.
pub fn truncate(text: &str) -> Cow<'_, str> {
  match text.char_indices().nth(MAX_AUDIT_TEXT) {
    Some((cut, _)) => Cow::Owned(format!("{}... [TRUNCATED]", &text[..cut])),
    None => Cow::Borrowed(text),
  }
}

/// The caller's address: the first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the socket peer.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
  let header = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
  };
  if let Some(forwarded) = header("x-forwarded-for")
    && let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty())
  {
    return first.to_owned();
  }
  if let Some(real) = header("x-real-ip") {
    return real.to_owned();
  }
  peer.map_or_else(|| "unknown".to_owned(), |p| p.ip().to_string())
}

/// The fields of one audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry<'a> {
  pub correlation_id: &'a str,
  pub operation:      &'a str,
  pub table:          String,
  pub user:           &'a str,
  pub client:         &'a str,
  pub elapsed_ms:     u128,
  pub code:           u16,
  pub message:        &'a str,
  pub payload:        Cow<'a, str>,
  pub data:           Cow<'a, str>,
}

impl<'a> AuditEntry<'a> {
  /// An entry for a decoded request and the response sent for it.
  pub fn new(
    request: &'a Request,
    response: &'a Response,
    client: &'a str,
    elapsed: Duration,
  ) -> Self {
    let header = request.header.as_ref();
    let operation = request
      .indicator
      .as_deref()
      .and_then(|i| i.parse::<Indicator>().ok())
      .map_or("UNKNOWN", Indicator::operation);
    Self {
      correlation_id: request.correlation_id().unwrap_or(UNKNOWN),
      operation,
      table: request.list_name().unwrap_or_else(|| UNKNOWN.to_owned()),
      user: header
        .and_then(|h| h.originating_user_identifier.as_deref())
        .unwrap_or(UNKNOWN),
      client,
      elapsed_ms: elapsed.as_millis(),
      code: response.response_code.as_u16(),
      message: &response.response_message,
      payload: truncate(request.json_payload.as_deref().unwrap_or_default()),
      data: truncate(response.data.as_deref().unwrap_or_default()),
    }
  }

  /// An entry for a request that never decoded.
  pub fn fault(client: &'a str, status: u16, message: &'a str, elapsed: Duration) -> Self {
    Self {
      correlation_id: UNKNOWN,
      operation: "UNKNOWN",
      table: UNKNOWN.to_owned(),
      user: UNKNOWN,
      client,
      elapsed_ms: elapsed.as_millis(),
      code: status,
      message,
      payload: Cow::Borrowed(""),
      data: Cow::Borrowed(""),
    }
  }

  pub fn emit(&self) {
    info!(
      target: "bms_soap::audit",
      correlation_id = self.correlation_id,
      operation = self.operation,
      table = %self.table,
      user = self.user,
      client = self.client,
      elapsed_ms = self.elapsed_ms as u64,
      code = self.code,
      message = self.message,
      payload = %self.payload,
      data = %self.data,
      "audit"
    );
  }
}
