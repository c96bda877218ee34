//! Response codes and the response model returned for every request.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The fixed response-code vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ResponseCode {
  Success,
  PartialSuccess,
  MissingField,
  InvalidValue,
  BadRequest,
  NotFound,
  Duplicate,
  MissingAttribute,
  InternalError,
}

impl ResponseCode {
  pub fn as_u16(self) -> u16 {
    match self {
      Self::Success => 200,
      Self::PartialSuccess => 207,
      Self::MissingField => 301,
      Self::InvalidValue => 302,
      Self::BadRequest => 400,
      Self::NotFound => 404,
      Self::Duplicate => 409,
      Self::MissingAttribute => 410,
      Self::InternalError => 500,
    }
  }

  pub fn from_u16(code: u16) -> Option<Self> {
    Some(match code {
      200 => Self::Success,
      207 => Self::PartialSuccess,
      301 => Self::MissingField,
      302 => Self::InvalidValue,
      400 => Self::BadRequest,
      404 => Self::NotFound,
      409 => Self::Duplicate,
      410 => Self::MissingAttribute,
      500 => Self::InternalError,
      _ => return None,
    })
  }

  pub fn is_success(self) -> bool {
    matches!(self, Self::Success | Self::PartialSuccess)
  }
}

impl fmt::Display for ResponseCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_u16())
  }
}

impl From<ResponseCode> for u16 {
  fn from(code: ResponseCode) -> Self { code.as_u16() }
}

impl TryFrom<u16> for ResponseCode {
  type Error = String;

  fn try_from(code: u16) -> Result<Self, Self::Error> {
    Self::from_u16(code).ok_or_else(|| format!("unknown response code {code}"))
  }
}

impl From<&Error> for ResponseCode {
  fn from(err: &Error) -> Self {
    match err {
      Error::InvalidTable(_) | Error::InvalidPayload(_) => Self::BadRequest,
      Error::Serialization(_) => Self::BadRequest,
      Error::MissingField(_) => Self::MissingField,
      Error::NotFound(_) => Self::NotFound,
      Error::DuplicateId { .. } => Self::Duplicate,
      Error::MissingAttribute(_) => Self::MissingAttribute,
      Error::Backend(_) => Self::InternalError,
    }
  }
}

// ─── Rejection ───────────────────────────────────────────────────────────────

/// A validation failure detected before any store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
  pub code:    ResponseCode,
  pub message: String,
}

impl Rejection {
  pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
    Self { code, message: message.into() }
  }

  pub fn missing(message: impl Into<String>) -> Self {
    Self::new(ResponseCode::MissingField, message)
  }

  pub fn invalid(message: impl Into<String>) -> Self {
    Self::new(ResponseCode::InvalidValue, message)
  }

  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::new(ResponseCode::BadRequest, message)
  }
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.code, self.message)
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// The body of a `GenericResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
  pub response_code:    ResponseCode,
  pub response_message: String,
  /// JSON text, present only for lookups that found rows.
  pub data:             Option<String>,
  pub timestamp:        DateTime<Utc>,
}

impl Response {
  pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
    Self {
      response_code:    code,
      response_message: message.into(),
      data:             None,
      timestamp:        Utc::now(),
    }
  }

  pub fn success(message: impl Into<String>) -> Self {
    Self::new(ResponseCode::Success, message)
  }

  pub fn with_data(mut self, data: impl Into<String>) -> Self {
    self.data = Some(data.into());
    self
  }

  /// Map a domain error to its response. Backend failures never expose
  /// their underlying message, which may carry SQL text.
  pub fn from_error(err: &Error) -> Self {
    let code = ResponseCode::from(err);
    let message = match err {
      Error::InvalidTable(name) => format!("Invalid table name: {name}"),
      Error::InvalidPayload(msg) => msg.clone(),
      Error::Serialization(e) => format!("Invalid jsonPayload: {e}"),
      Error::MissingField(field) => format!("Missing {field}"),
      Error::NotFound(what) => what.clone(),
      Error::DuplicateId { .. } => "id is duplicate".to_owned(),
      Error::MissingAttribute(_) => err.to_string(),
      Error::Backend(_) => "Internal server error".to_owned(),
    };
    Self::new(code, message)
  }

  pub fn timestamp_text(&self) -> String {
    self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
  }
}

impl From<Rejection> for Response {
  fn from(r: Rejection) -> Self { Self::new(r.code, r.message) }
}
