// Source/target system models
//
// `SystemRecord` is the connection profile exactly as entered on a form. `SourceSystemEntry` is the
// canonical persisted shape of a source system, and `SourceSystemsRegistry` accumulates entries for
// the lifetime of a wizard session.

use crate::utils::logging::mask_sensitive;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// =========================
// Login mechanism
// =========================

/// Authentication mechanism of a database connection.
///
/// Anything other than `ldap` / `regular` is carried verbatim (including the empty string) so the
/// server sees exactly what the user picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Logmech {
    Ldap,
    Regular,
    Other(String),
}

impl Logmech {
    pub fn as_str(&self) -> &str {
        match self {
            Logmech::Ldap => "ldap",
            Logmech::Regular => "regular",
            Logmech::Other(s) => s.as_str(),
        }
    }
}

impl Default for Logmech {
    fn default() -> Self {
        Logmech::Other(String::new())
    }
}

impl From<&str> for Logmech {
    fn from(value: &str) -> Self {
        match value {
            "ldap" => Logmech::Ldap,
            "regular" => Logmech::Regular,
            other => Logmech::Other(other.to_string()),
        }
    }
}

impl From<String> for Logmech {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ldap" => Logmech::Ldap,
            "regular" => Logmech::Regular,
            _ => Logmech::Other(value),
        }
    }
}

impl From<Logmech> for String {
    fn from(value: Logmech) -> Self {
        match value {
            Logmech::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Logmech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================
// System type
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemType {
    Source,
    Target,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Source => "source",
            SystemType::Target => "target",
        }
    }
}

// =========================
// System record (as entered)
// =========================

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRecord {
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub logmech: Logmech,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_coa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_region: Option<String>,
    /// Any other form fields, passed to the server untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl SystemRecord {
    /// Log-safe one-line description (password never included, username partially masked).
    pub fn redacted_summary(&self) -> String {
        format!(
            "system_name={}, host={}, username={}, logmech={}",
            self.system_name,
            self.host,
            mask_sensitive(&self.username),
            self.logmech
        )
    }
}

impl fmt::Debug for SystemRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRecord")
            .field("system_name", &self.system_name)
            .field("host", &self.host)
            .field("username", &mask_sensitive(&self.username))
            .field("password", &"***")
            .field("logmech", &self.logmech)
            .field("site_id", &self.site_id)
            .field("environment", &self.environment)
            .field("db_coa", &self.db_coa)
            .field("db_region", &self.db_region)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =========================
// Formatted source system (persisted shape)
// =========================

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSystemEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub siteid: Option<String>,
    pub active: String,
    pub host: String,
    pub username: String,
    pub password: String,
    pub logmech: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl fmt::Debug for SourceSystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSystemEntry")
            .field("siteid", &self.siteid)
            .field("active", &self.active)
            .field("host", &self.host)
            .field("username", &mask_sensitive(&self.username))
            .field("password", &"***")
            .field("logmech", &self.logmech)
            .field("use", &self.environment)
            .finish()
    }
}

/// A single source system keyed by its name. Serialises as `{ "<name>": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedSourceSystem {
    pub name: String,
    pub entry: SourceSystemEntry,
}

impl Serialize for FormattedSourceSystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.entry)?;
        map.end()
    }
}

// =========================
// Source systems registry
// =========================

/// Every source system accepted during the session, keyed by system name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSystemsRegistry {
    systems: BTreeMap<String, SourceSystemEntry>,
}

impl SourceSystemsRegistry {
    /// Insert or overwrite; returns the entry previously stored under the same name.
    pub fn insert(&mut self, system: FormattedSourceSystem) -> Option<SourceSystemEntry> {
        self.systems.insert(system.name, system.entry)
    }

    pub fn get(&self, name: &str) -> Option<&SourceSystemEntry> {
        self.systems.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
