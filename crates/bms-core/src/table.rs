//! Alias registry and table-name validation.
//!
//! Every statement the gateway builds interpolates a table name, so the name
//! must come from a fixed allow-list. [`TableRegistry`] holds the mapping from
//! short aliases (`"Area"`, `"beneficiary"`) to schema-qualified physical
//! names; [`TableValidator`] resolves a caller-supplied name against it and
//! applies format checks on the result.
//!
//! The registry is an immutable value. Adding or removing an alias produces a
//! new registry; a running validator never changes underneath its callers.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::LazyLock,
};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Schema that holds the warehouse tables unless configured otherwise.
pub const DEFAULT_SCHEMA: &str = "GDEV1T_UHI_DATA";

/// Lookup tables, stored as `<schema>.bms_<alias>_lkp`.
pub const LOOKUP_ALIASES: &[&str] = &[
  "Area",
  "Country",
  "City",
  "MossCategory",
  "DiseaseList",
  "MossIndicator",
  "SocialStatus",
  "CollectionEntities",
  "Language",
  "Nationality",
  "SickCategory",
  "DeactivationReasons",
  "Governorate",
  "Education",
  "MossSubCategory",
  "Provider",
  "Gender",
  "MilitaryService",
  "Telecom",
  "Relation",
  "Cluster",
];

pub const BENEFICIARY: &str = "beneficiary";
pub const CONTACT: &str = "contact";
pub const EMPLOYMENT: &str = "employment";

/// Beneficiary tables, stored as `<schema>.<alias>`.
pub const BENEFICIARY_ALIASES: &[&str] = &[BENEFICIARY, CONTACT, EMPLOYMENT];

/// Matched as uppercase substrings, not as tokens.
const SQL_KEYWORDS: &[&str] = &[
  "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER",
  "TRUNCATE", "EXEC", "EXECUTE", "UNION", "JOIN", "WHERE", "FROM", "INTO",
  "VALUES", "SET", "AND", "OR", "NOT", "LIKE", "IN", "BETWEEN", "ORDER",
  "GROUP", "HAVING", "DISTINCT", "TOP", "LIMIT", "OFFSET", "CASE", "WHEN",
  "THEN", "ELSE", "END", "IF", "EXISTS", "ALL", "ANY", "SOME", "NULL", "TRUE",
  "FALSE",
];

const DANGEROUS_CHARS: &str = "';\"\\-/*(){}[]|&^%$#@!~`+=<>?";

static TABLE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)?$").expect("static pattern")
});

// ─── Registry ────────────────────────────────────────────────────────────────

/// Alias → physical table name. The allow-list of physical names is the
/// registry's value set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRegistry {
  aliases: BTreeMap<String, String>,
}

impl TableRegistry {
  pub fn empty() -> Self { Self::default() }

  /// The standard lookup and beneficiary tables under `schema`.
  pub fn standard(schema: &str) -> Self {
    let lookups = LOOKUP_ALIASES
      .iter()
      .map(|a| (a.to_string(), format!("{schema}.bms_{a}_lkp")));
    let beneficiary = BENEFICIARY_ALIASES
      .iter()
      .map(|a| (a.to_string(), format!("{schema}.{a}")));
    Self { aliases: lookups.chain(beneficiary).collect() }
  }

  /// Return a registry that additionally maps `alias` to `physical`.
  ///
  /// The physical name must pass the format pattern and must not contain
  /// dangerous characters; the keyword heuristic is applied only at
  /// validation time.
  pub fn with_alias(&self, alias: &str, physical: &str) -> Result<Self> {
    let alias = alias.trim();
    let physical = physical.trim();
    if alias.is_empty()
      || !TABLE_NAME_PATTERN.is_match(physical)
      || contains_dangerous_chars(physical)
    {
      return Err(Error::InvalidTable(physical.to_owned()));
    }
    let mut next = self.clone();
    next.aliases.insert(alias.to_owned(), physical.to_owned());
    info!(alias, physical, "table alias added");
    Ok(next)
  }

  /// Return a registry without `alias`. Unknown aliases leave it unchanged.
  pub fn without_alias(&self, alias: &str) -> Self {
    let mut next = self.clone();
    if next.aliases.remove(alias.trim()).is_some() {
      info!(alias, "table alias removed");
    }
    next
  }

  pub fn get(&self, alias: &str) -> Option<&str> {
    self.aliases.get(alias).map(String::as_str)
  }

  pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
    self.aliases.iter().map(|(a, p)| (a.as_str(), p.as_str()))
  }

  pub fn physical_names(&self) -> BTreeSet<&str> {
    self.aliases.values().map(String::as_str).collect()
  }

  pub fn is_allowed(&self, physical: &str) -> bool {
    self.aliases.values().any(|p| p == physical)
  }
}

// ─── Validator ───────────────────────────────────────────────────────────────

/// Resolves and validates table names against a [`TableRegistry`].
#[derive(Debug, Clone)]
pub struct TableValidator {
  registry: TableRegistry,
}

impl TableValidator {
  pub fn new(registry: TableRegistry) -> Self { Self { registry } }

  pub fn registry(&self) -> &TableRegistry { &self.registry }

  /// Resolve an alias, or accept an already-qualified allow-listed name.
  pub fn resolve(&self, name: &str) -> Option<String> {
    let trimmed = name.trim();
    if let Some(physical) = self.registry.get(trimmed) {
      return Some(physical.to_owned());
    }
    if self.registry.is_allowed(trimmed) {
      return Some(trimmed.to_owned());
    }
    None
  }

  /// `true` if `name` resolves and the resolved name passes every check.
  pub fn is_valid(&self, name: &str) -> bool { self.check(name).is_ok() }

  /// Resolve `name` and validate the result, returning the physical name.
  pub fn check(&self, name: &str) -> Result<String> {
    let Some(resolved) = self.resolve(name).filter(|r| !r.trim().is_empty())
    else {
      warn!(table = name, "table name is empty or unknown");
      return Err(Error::InvalidTable(name.to_owned()));
    };

    if !TABLE_NAME_PATTERN.is_match(&resolved) {
      warn!(table = %resolved, "table name does not match the allowed pattern");
      return Err(Error::InvalidTable(name.to_owned()));
    }

    if contains_sql_keyword(&resolved) {
      warn!(table = %resolved, "table name contains SQL reserved keywords");
      return Err(Error::InvalidTable(name.to_owned()));
    }

    if contains_dangerous_chars(&resolved) {
      warn!(table = %resolved, "table name contains dangerous characters");
      return Err(Error::InvalidTable(name.to_owned()));
    }

    debug!(table = %resolved, "valid table name");
    Ok(resolved)
  }

  pub fn allowed_tables(&self) -> BTreeSet<&str> { self.registry.physical_names() }
}

impl Default for TableValidator {
  fn default() -> Self { Self::new(TableRegistry::standard(DEFAULT_SCHEMA)) }
}

/// Strip every character outside `[A-Za-z0-9_.]`, then one leading and one
/// trailing dot.
pub fn sanitize(name: &str) -> String {
  let kept: String = name
    .trim()
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
    .collect();
  let kept = kept.strip_prefix('.').unwrap_or(&kept);
  kept.strip_suffix('.').unwrap_or(kept).to_owned()
}

/// Any keyword appearing anywhere in the name counts, so `bms_Gender_lkp`
/// is rejected for `END`.
fn contains_sql_keyword(name: &str) -> bool {
  let upper = name.to_uppercase();
  SQL_KEYWORDS.iter().any(|k| upper.contains(k))
}

fn contains_dangerous_chars(name: &str) -> bool {
  name.chars().any(|c| DANGEROUS_CHARS.contains(c))
}
