//! Transport errors and their SOAP Fault rendering.
//!
//! Anything that prevents a `GenericRequest` from being decoded ends up here.
//! Domain failures never do; they become a `GenericResponse` with a response
//! code instead.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{soap_response, xml};

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed SOAP envelope: {0}")]
  Xml(String),
  #[error("request body too large")]
  PayloadTooLarge,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::Xml(_) => StatusCode::BAD_REQUEST,
      Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
    }
  }
}

impl From<quick_xml::Error> for Error {
  fn from(e: quick_xml::Error) -> Self { Error::Xml(e.to_string()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    match xml::encode_fault(xml::FAULT_CLIENT, &self.to_string()) {
      Ok(body) => soap_response(status, body),
      Err(_) => (status, self.to_string()).into_response(),
    }
  }
}
