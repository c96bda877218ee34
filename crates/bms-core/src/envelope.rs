//! The request envelope: header, indicator, and JSON payload, plus the
//! validation applied before any dispatch.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result, response::Rejection};

/// XML namespace of `GenericRequest` / `GenericResponse`.
pub const NAMESPACE: &str = "http://teradata.com/uhi";

pub const MAX_ID_LENGTH: usize = 50;
pub const MAX_PAYLOAD_LENGTH: usize = 9_000_000;

// ─── Header ──────────────────────────────────────────────────────────────────

/// The `GGheader` element. Every field is required; absence is reported by
/// [`HeaderPolicy::validate`], not at decode time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
  pub correlation_id:              Option<String>,
  pub originating_channel:         Option<String>,
  pub channel_request_id:          Option<String>,
  pub originating_user_type:       Option<String>,
  pub originating_user_identifier: Option<String>,
  pub service_slug:                Option<String>,
  pub service_entity_id:           Option<String>,
}

impl Header {
  /// Element names in validation order.
  pub const FIELDS: [&'static str; 7] = [
    "correlationId",
    "originatingChannel",
    "channelRequestId",
    "originatingUserType",
    "originatingUserIdentifier",
    "serviceSlug",
    "serviceEntityId",
  ];

  pub fn get(&self, field: &str) -> Option<&str> {
    let value = match field {
      "correlationId" => &self.correlation_id,
      "originatingChannel" => &self.originating_channel,
      "channelRequestId" => &self.channel_request_id,
      "originatingUserType" => &self.originating_user_type,
      "originatingUserIdentifier" => &self.originating_user_identifier,
      "serviceSlug" => &self.service_slug,
      "serviceEntityId" => &self.service_entity_id,
      _ => return None,
    };
    value.as_deref()
  }

  /// Set a field by element name. Returns `false` for unknown names.
  pub fn set(&mut self, field: &str, value: String) -> bool {
    let slot = match field {
      "correlationId" => &mut self.correlation_id,
      "originatingChannel" => &mut self.originating_channel,
      "channelRequestId" => &mut self.channel_request_id,
      "originatingUserType" => &mut self.originating_user_type,
      "originatingUserIdentifier" => &mut self.originating_user_identifier,
      "serviceSlug" => &mut self.service_slug,
      "serviceEntityId" => &mut self.service_entity_id,
      _ => return false,
    };
    *slot = Some(value);
    true
  }
}

/// Per-field allow-lists for the header. An empty list accepts any
/// non-blank value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderPolicy {
  pub correlation_ids:      Vec<String>,
  pub channels:             Vec<String>,
  pub channel_request_ids:  Vec<String>,
  pub user_types:           Vec<String>,
  pub user_identifiers:     Vec<String>,
  pub service_slugs:        Vec<String>,
  pub service_entity_ids:   Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|s| s.to_string()).collect()
}

impl Default for HeaderPolicy {
  fn default() -> Self {
    Self {
      correlation_ids:     strings(&["1", "2", "3"]),
      channels:            strings(&["16", "10"]),
      channel_request_ids: strings(&["1", "2", "3"]),
      user_types:          strings(&["1", "2"]),
      user_identifiers:    strings(&["2970430001808"]),
      service_slugs:       strings(&["BMS-LOOKUP-01", "BMS-LOOKUP-02", "BMS-LOOKUP-03"]),
      service_entity_ids:  strings(&["1", "2"]),
    }
  }
}

impl HeaderPolicy {
  /// Accept any non-blank header.
  pub fn permissive() -> Self {
    Self {
      correlation_ids:     Vec::new(),
      channels:            Vec::new(),
      channel_request_ids: Vec::new(),
      user_types:          Vec::new(),
      user_identifiers:    Vec::new(),
      service_slugs:       Vec::new(),
      service_entity_ids:  Vec::new(),
    }
  }

  fn allowed(&self, field: &str) -> &[String] {
    match field {
      "correlationId" => &self.correlation_ids,
      "originatingChannel" => &self.channels,
      "channelRequestId" => &self.channel_request_ids,
      "originatingUserType" => &self.user_types,
      "originatingUserIdentifier" => &self.user_identifiers,
      "serviceSlug" => &self.service_slugs,
      "serviceEntityId" => &self.service_entity_ids,
      _ => &[],
    }
  }

  /// Check each field in [`Header::FIELDS`] order; the first failure wins.
  pub fn validate(&self, header: &Header) -> Result<(), Rejection> {
    for field in Header::FIELDS {
      let value = header.get(field).filter(|v| !v.trim().is_empty());
      let Some(value) = value else {
        return Err(Rejection::missing(format!("Missing {field}")));
      };
      let allowed = self.allowed(field);
      if !allowed.is_empty() && !allowed.iter().any(|a| a == value) {
        return Err(Rejection::invalid(format!("Invalid {field}: {value}")));
      }
    }
    Ok(())
  }
}

// ─── Indicator ───────────────────────────────────────────────────────────────

/// The operation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
  Insert,
  Update,
  Lookup,
  Hof,
  Nomination,
  InsertBeneficiary,
  UpdateBeneficiary,
  SplitBeneficiary,
}

impl Indicator {
  pub const ALL: [Indicator; 8] = [
    Self::Insert,
    Self::Update,
    Self::Lookup,
    Self::Hof,
    Self::Nomination,
    Self::InsertBeneficiary,
    Self::UpdateBeneficiary,
    Self::SplitBeneficiary,
  ];

  /// The canonical wire spelling.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Insert => "i",
      Self::Update => "u",
      Self::Lookup => "l",
      Self::Hof => "hof",
      Self::Nomination => "nomination",
      Self::InsertBeneficiary => "INSERT_BENEFICIARY",
      Self::UpdateBeneficiary => "UPDATE_BENEFICIARY",
      Self::SplitBeneficiary => "SPLIT_BENEFICIARY",
    }
  }

  /// Operation name used in audit events and messages.
  pub fn operation(self) -> &'static str {
    match self {
      Self::Insert => "INSERT",
      Self::Update => "UPDATE",
      Self::Lookup => "LOOKUP",
      Self::Hof => "HOF",
      Self::Nomination => "NOMINATION",
      Self::InsertBeneficiary => "INSERT_BENEFICIARY",
      Self::UpdateBeneficiary => "UPDATE_BENEFICIARY",
      Self::SplitBeneficiary => "SPLIT_BENEFICIARY",
    }
  }

  pub fn requires_payload(self) -> bool { !matches!(self, Self::Lookup) }

  /// Indicators whose `listName` is validated before dispatch.
  pub fn validates_table_early(self) -> bool {
    matches!(self, Self::Update | Self::Lookup)
  }
}

impl fmt::Display for Indicator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Indicator {
  type Err = Rejection;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("split") {
      return Ok(Self::SplitBeneficiary);
    }
    Self::ALL
      .into_iter()
      .find(|i| i.as_str().eq_ignore_ascii_case(trimmed))
      .ok_or_else(|| {
        let allowed: Vec<_> = Self::ALL.iter().map(|i| i.as_str()).collect();
        Rejection::invalid(format!(
          "Invalid indicator: {s}. Allowed values: {}",
          allowed.join(", ")
        ))
      })
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// A decoded `GenericRequest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
  pub header:       Option<Header>,
  pub id:           Option<String>,
  pub indicator:    Option<String>,
  pub json_payload: Option<String>,
}

impl Request {
  /// The envelope id, trimmed, if non-blank.
  pub fn id(&self) -> Option<&str> {
    self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }

  /// The raw payload text, if non-blank.
  pub fn payload_text(&self) -> Option<&str> {
    self.json_payload.as_deref().filter(|s| !s.trim().is_empty())
  }

  /// Parse the payload as JSON. `Ok(None)` when there is no payload.
  pub fn payload(&self) -> Result<Option<Value>> {
    match self.payload_text() {
      Some(text) => Ok(Some(serde_json::from_str(text)?)),
      None => Ok(None),
    }
  }

  /// The payload's `listName`, if the payload is an object carrying one.
  pub fn list_name(&self) -> Option<String> {
    let payload = self.payload().ok().flatten()?;
    payload
      .get("listName")
      .and_then(Value::as_str)
      .map(str::to_owned)
  }

  pub fn correlation_id(&self) -> Option<&str> {
    self.header.as_ref().and_then(|h| h.correlation_id.as_deref())
  }

  /// Header, indicator, and size checks. Returns the parsed indicator.
  pub fn validate(&self, policy: &HeaderPolicy) -> Result<Indicator, Rejection> {
    let Some(header) = &self.header else {
      return Err(Rejection::missing("Missing GGHeader"));
    };
    policy.validate(header)?;

    let indicator = self
      .indicator
      .as_deref()
      .filter(|s| !s.trim().is_empty())
      .ok_or_else(|| Rejection::missing("Missing indicator"))?
      .parse::<Indicator>()?;

    if indicator.requires_payload() && self.payload_text().is_none() {
      return Err(Rejection::missing(format!(
        "Missing jsonPayload for {} operation",
        indicator.operation()
      )));
    }

    if self.id().is_some_and(|id| id.chars().count() > MAX_ID_LENGTH) {
      return Err(Rejection::invalid(format!(
        "ID too long (max {MAX_ID_LENGTH} characters)"
      )));
    }

    if self
      .payload_text()
      .is_some_and(|p| p.chars().count() > MAX_PAYLOAD_LENGTH)
    {
      return Err(Rejection::invalid(format!(
        "jsonPayload too long (max {MAX_PAYLOAD_LENGTH} characters)"
      )));
    }

    Ok(indicator)
  }
}

/// Fetch a nested JSON value by object keys, failing with the given message.
pub fn descend<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value> {
  let mut current = value;
  for key in path {
    current = current
      .get(key)
      .filter(|v| !v.is_null())
      .ok_or_else(|| Error::InvalidPayload(format!("Missing {key} in jsonPayload")))?;
  }
  Ok(current)
}
