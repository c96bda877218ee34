//! Beneficiary families: enrollment bundles, nomination, and split plans.
//!
//! These types carry validated input to the multi-step store operations.
//! Parsing from the request payload happens here so that every payload shape
//! is checked before the store is touched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  envelope::descend,
  record::{Record, value_text},
};

pub const HEAD_OF_FAMILY: &str = "Head of Family";
pub const INACTIVE: &str = "inactive";

pub const CONTACTS: &str = "contacts";
pub const EMPLOYMENTS: &str = "employments";
pub const BENEFICIARY_ID: &str = "beneficiaryId";

pub const BENEFICIARY_REQUIRED: &[&str] = &[
  "id",
  "firstName",
  "lastName",
  "fullName",
  "dob",
  "gender",
  "mobile",
  "nationality",
  "nationalId",
  "email",
];

pub const EMPLOYMENT_REQUIRED: &[&str] = &[
  "id",
  "beneficiaryId",
  "netIncome",
  "jobDescription",
  "job",
  "employerGovernerate",
  "companySocialInsuranceId",
];

// ─── Bundle ──────────────────────────────────────────────────────────────────

/// One beneficiary with its child contact and employment records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeneficiaryBundle {
  pub beneficiary: Record,
  pub contacts:    Vec<Record>,
  pub employments: Vec<Record>,
}

impl BeneficiaryBundle {
  /// Split a member object into the beneficiary body and its children.
  pub fn from_record(member: Record) -> Result<Self> {
    let contacts = member.children(CONTACTS)?;
    let employments = member.children(EMPLOYMENTS)?;
    let beneficiary = member.without(&[CONTACTS, EMPLOYMENTS]);
    Ok(Self { beneficiary, contacts, employments })
  }

  pub fn from_value(value: Value) -> Result<Self> {
    Self::from_record(Record::from_value(value)?)
  }

  pub fn id(&self) -> Option<String> { self.beneficiary.id() }

  /// Force every contact's `beneficiaryId` to the parent id, dropping any
  /// differently-cased variant of the key.
  pub fn bind_contacts(&mut self, parent: &str) {
    for contact in &mut self.contacts {
      contact.remove(BENEFICIARY_ID);
      contact.insert(BENEFICIARY_ID, parent);
    }
  }

  /// Give every child without a `beneficiaryId` the parent id.
  pub fn default_child_parent(&mut self, parent: &str) {
    for child in self.contacts.iter_mut().chain(self.employments.iter_mut()) {
      if child.is_blank(BENEFICIARY_ID) {
        child.remove(BENEFICIARY_ID);
        child.insert(BENEFICIARY_ID, parent);
      }
    }
  }

  /// Prepare a member for HOF enrollment: check the beneficiary body, bind
  /// children to it, then check each employment.
  pub fn prepare_enrollment(&mut self) -> Result<String> {
    if let Some(missing) = self.beneficiary.first_blank(BENEFICIARY_REQUIRED.iter().copied()) {
      return Err(Error::MissingAttribute(missing.to_owned()));
    }
    let id = self
      .id()
      .ok_or_else(|| Error::MissingAttribute("id".to_owned()))?;
    self.bind_contacts(&id);
    self.default_child_parent(&id);
    for employment in &self.employments {
      if let Some(missing) = employment.first_blank(EMPLOYMENT_REQUIRED.iter().copied()) {
        return Err(Error::MissingAttribute(missing.to_owned()));
      }
    }
    Ok(id)
  }
}

fn bundles(list: &Value, name: &str) -> Result<Vec<BeneficiaryBundle>> {
  let items = list
    .as_array()
    .ok_or_else(|| Error::InvalidPayload(format!("Missing or invalid {name} array")))?;
  items.iter().cloned().map(BeneficiaryBundle::from_value).collect()
}

/// Members of `{hofEnrollmentData:{hofData:[…]}}`. Every member must carry
/// an id.
pub fn hof_members(payload: &Value) -> Result<Vec<BeneficiaryBundle>> {
  let data = descend(payload, &["hofEnrollmentData", "hofData"])?;
  let members = bundles(data, "hofData")?;
  if members.is_empty() {
    return Err(Error::InvalidPayload("Empty hofData array".to_owned()));
  }
  if members.iter().any(|m| m.id().is_none()) {
    return Err(Error::InvalidPayload("Missing id in hofData member".to_owned()));
  }
  Ok(members)
}

/// Beneficiaries of `{enrollmentData:{beneficiaryData:[…]}}`.
pub fn enrollment_beneficiaries(payload: &Value) -> Result<Vec<BeneficiaryBundle>> {
  bundles(descend(payload, &["enrollmentData", "beneficiaryData"])?, "beneficiaryData")
}

/// Beneficiaries of `{updateData:{beneficiaryData:[…]}}`. Every beneficiary
/// must carry an id.
pub fn update_beneficiaries(payload: &Value) -> Result<Vec<BeneficiaryBundle>> {
  let list = bundles(descend(payload, &["updateData", "beneficiaryData"])?, "beneficiaryData")?;
  if list.iter().any(|b| b.id().is_none()) {
    return Err(Error::MissingField("id in beneficiaryData".to_owned()));
  }
  Ok(list)
}

// ─── Nomination ──────────────────────────────────────────────────────────────

/// Replace the head of `old_family_id` with `new_head_id`, moving the
/// dependents to `new_family_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nomination {
  pub old_family_id: String,
  pub new_family_id: String,
  pub new_head_id:   String,
}

impl Nomination {
  pub fn new(
    old_family_id: impl Into<String>,
    new_family_id: impl Into<String>,
    new_head_id: impl Into<String>,
  ) -> Result<Self> {
    let nomination = Self {
      old_family_id: old_family_id.into().trim().to_owned(),
      new_family_id: new_family_id.into().trim().to_owned(),
      new_head_id:   new_head_id.into().trim().to_owned(),
    };
    if nomination.old_family_id.is_empty() || nomination.new_family_id.is_empty() {
      return Err(Error::InvalidPayload(
        "Missing old_familyId or new_familyId in payload".to_owned(),
      ));
    }
    if nomination.new_head_id.is_empty() {
      return Err(Error::InvalidPayload("Missing id in hofData".to_owned()));
    }
    Ok(nomination)
  }

  /// Parse `{nominationData:{nominationInfo:{old_familyId,new_familyId},
  /// hofData:[{id}]}}`.
  pub fn from_payload(payload: &Value) -> Result<Self> {
    let info = descend(payload, &["nominationData", "nominationInfo"])?;
    let text = |v: &Value, key: &str| v.get(key).and_then(value_text).unwrap_or_default();
    let head = descend(payload, &["nominationData", "hofData"])?;
    let head = match head {
      Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
      other => other.clone(),
    };
    Self::new(text(info, "old_familyId"), text(info, "new_familyId"), text(&head, "id"))
  }
}

/// Rows affected by each nomination step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationOutcome {
  pub deactivated: usize,
  pub moved:       usize,
  pub promoted:    usize,
}

// ─── Split ───────────────────────────────────────────────────────────────────

/// Move the listed beneficiaries to `new_family_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
  pub old_family_id: Option<String>,
  pub new_family_id: String,
  pub split_date:    Option<String>,
  pub members:       Vec<BeneficiaryBundle>,
}

impl SplitPlan {
  /// Parse `{splitData:{splitInfo:{old_familyId,new_familyId,splitDate},
  /// beneficiaryData:[…]}}`.
  pub fn from_payload(payload: &Value) -> Result<Self> {
    let info = descend(payload, &["splitData", "splitInfo"])?;
    let field = |key: &str| {
      info
        .get(key)
        .and_then(value_text)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
    };
    let new_family_id = field("new_familyId")
      .ok_or_else(|| Error::InvalidPayload("Missing new_familyId in splitInfo".to_owned()))?;
    let members = bundles(descend(payload, &["splitData", "beneficiaryData"])?, "beneficiaryData")?;
    if members.iter().any(|m| m.id().is_none()) {
      return Err(Error::MissingField("id in beneficiaryData".to_owned()));
    }
    Ok(Self {
      old_family_id: field("old_familyId"),
      new_family_id,
      split_date: field("splitDate"),
      members,
    })
  }
}
