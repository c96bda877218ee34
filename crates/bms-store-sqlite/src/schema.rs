//! SQL schema for the BMS warehouse tables.
//!
//! The warehouse schema lives in an attached database named after it, so the
//! physical names produced by the alias registry work unchanged. DDL is
//! idempotent thanks to `CREATE TABLE IF NOT EXISTS`.

use bms_core::table::LOOKUP_ALIASES;

use crate::query::quote_ident;

/// Connection-level settings applied before anything else.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

const BENEFICIARY_COLUMNS: &str = "
    id                    TEXT PRIMARY KEY,
    firstName             TEXT,
    lastName              TEXT,
    fullName              TEXT,
    dob                   TEXT,
    gender                TEXT,
    mobile                TEXT,
    nationality           TEXT,
    nationalId            TEXT,
    email                 TEXT,
    familyId              TEXT,
    familyRelation        TEXT,
    activationStatus      TEXT,
    previousBeneficiaryId TEXT,
    deactivationReason    TEXT,
    medicalConditions     TEXT,
    dateOfDeath           TEXT,
    husbandNationalId     TEXT,
    passportNumber        TEXT,
    passportExpiryDate    TEXT,
    socialInsuranceNumber TEXT,
    createdAt             TEXT DEFAULT CURRENT_TIMESTAMP,
    updatedAt             TEXT
";

const CONTACT_COLUMNS: &str = "
    id                      TEXT PRIMARY KEY,
    beneficiaryId           TEXT,
    mobileNumber            TEXT,
    \"LandlineNumber(Work)\" TEXT,
    email                   TEXT,
    address                 TEXT
";

const EMPLOYMENT_COLUMNS: &str = "
    id                       TEXT PRIMARY KEY,
    beneficiaryId            TEXT,
    netIncome                REAL,
    jobDescription           TEXT,
    job                      TEXT,
    employerGovernerate      TEXT,
    companySocialInsuranceId TEXT,
    employerName             TEXT
";

/// DDL for the standard lookup and beneficiary tables under `schema`.
pub fn warehouse_ddl(schema: &str) -> String {
  let schema = quote_ident(schema);
  let mut ddl = String::new();

  for alias in LOOKUP_ALIASES {
    let table = quote_ident(&format!("bms_{alias}_lkp"));
    ddl.push_str(&format!(
      "CREATE TABLE IF NOT EXISTS {schema}.{table} (\n    id   TEXT PRIMARY KEY,\n    name TEXT\n);\n"
    ));
  }

  for (table, columns) in [
    ("beneficiary", BENEFICIARY_COLUMNS),
    ("contact", CONTACT_COLUMNS),
    ("employment", EMPLOYMENT_COLUMNS),
  ] {
    ddl.push_str(&format!(
      "CREATE TABLE IF NOT EXISTS {schema}.{table} ({columns});\n"
    ));
  }

  ddl.push_str(&format!(
    "CREATE INDEX IF NOT EXISTS {schema}.beneficiary_family_idx ON beneficiary(familyId);\n\
     CREATE INDEX IF NOT EXISTS {schema}.contact_beneficiary_idx ON contact(beneficiaryId);\n\
     CREATE INDEX IF NOT EXISTS {schema}.employment_beneficiary_idx ON employment(beneficiaryId);\n"
  ));
  ddl
}
