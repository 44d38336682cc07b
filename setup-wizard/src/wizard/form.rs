// Form collection
//
// Reads every field of a form into a name -> value map. Nothing here validates; an empty or
// half-filled form is handed to the caller as-is and only the server's connection test judges it.

use crate::models::system::{Logmech, SystemRecord, SystemType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one of the wizard's forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormId {
    Folder,
    Source(usize),
    Target,
}

impl FormId {
    /// The system type a form describes; the folder form describes none.
    pub fn system_type(&self) -> Option<SystemType> {
        match self {
            FormId::Folder => None,
            FormId::Source(_) => Some(SystemType::Source),
            FormId::Target => Some(SystemType::Target),
        }
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormId::Folder => f.write_str("folder"),
            FormId::Source(i) => write!(f, "source_system_{}", i + 1),
            FormId::Target => f.write_str("target_system"),
        }
    }
}

/// Field name -> current value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for FormValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.0 {
            if k == "password" {
                map.entry(k, &"***");
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for FormValues {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

/// Anything that can list its fields with their current values.
pub trait FormSource {
    fn field_values(&self) -> Vec<(String, String)>;
}

impl FormSource for FormValues {
    fn field_values(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Read every field of `form`. Later duplicates of a field name win.
pub fn collect<F: FormSource + ?Sized>(form: &F) -> FormValues {
    form.field_values().into_iter().collect()
}

impl SystemRecord {
    /// Build a record from raw form values. Never fails: missing fields become empty and unknown
    /// fields are kept in `extra`.
    pub fn from_form(values: &FormValues) -> Self {
        let mut record = SystemRecord::default();
        for (name, value) in values.iter() {
            match name {
                "system_name" => record.system_name = value.to_string(),
                "host" => record.host = value.to_string(),
                "username" => record.username = value.to_string(),
                "password" => record.password = value.to_string(),
                "logmech" => record.logmech = Logmech::from(value),
                "site_id" => record.site_id = Some(value.to_string()),
                "environment" => record.environment = Some(value.to_string()),
                "db_coa" => record.db_coa = Some(value.to_string()),
                "db_region" => record.db_region = Some(value.to_string()),
                other => {
                    record.extra.insert(other.to_string(), value.to_string());
                }
            }
        }
        record
    }
}
