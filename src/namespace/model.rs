//! Namespace configuration types and request shapes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::namespace::error::NamespaceError;

pub const MIN_DAILY_QUOTA: u64 = 1_000;
pub const MAX_DAILY_QUOTA: u64 = 10_000_000;
pub const MIN_RETENTION_DAYS: u32 = 1;
pub const MAX_RETENTION_DAYS: u32 = 365;

static NAMESPACE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("namespace name pattern is valid")
});

/// Check a namespace name: 3-50 chars, lowercase alphanumeric and dashes,
/// starting and ending with an alphanumeric.
pub fn is_valid_namespace_name(name: &str) -> bool {
    NAMESPACE_NAME.is_match(name)
}

/// A tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub owners: BTreeSet<String>,
    pub viewers: BTreeSet<String>,
    pub daily_event_quota: u64,
    pub storage_retention_days: u32,
    pub tags: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NamespaceConfig {
    pub fn is_owner(&self, identity: &str) -> bool {
        self.owners.contains(identity)
    }

    pub fn is_member(&self, identity: &str) -> bool {
        self.owners.contains(identity) || self.viewers.contains(identity)
    }
}

/// Body of `POST /namespaces`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNamespace {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owners: Vec<String>,
    #[serde(default, alias = "daily_quota")]
    pub daily_event_quota: Option<u64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceUpdate {
    pub display_name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub owners: Option<BTreeSet<String>>,
    pub viewers: Option<BTreeSet<String>>,
    pub daily_event_quota: Option<u64>,
    pub storage_retention_days: Option<u32>,
    pub tags: Option<BTreeMap<String, String>>,
}

impl NamespaceUpdate {
    /// Build an update from a free-form JSON object.
    ///
    /// Unknown keys are ignored. `daily_quota` and `retention_days` are
    /// accepted as aliases. A known key holding the wrong type rejects the
    /// whole update.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self, NamespaceError> {
        let mut update = Self::default();

        for (key, value) in fields {
            match key.as_str() {
                "display_name" => update.display_name = Some(parse_field(key, value)?),
                "description" => update.description = Some(parse_field(key, value)?),
                "owners" => update.owners = Some(parse_field(key, value)?),
                "viewers" => update.viewers = Some(parse_field(key, value)?),
                "daily_event_quota" | "daily_quota" => {
                    update.daily_event_quota = Some(parse_field(key, value)?)
                }
                "storage_retention_days" | "retention_days" => {
                    update.storage_retention_days = Some(parse_field(key, value)?)
                }
                "tags" => update.tags = Some(parse_field(key, value)?),
                _ => {}
            }
        }

        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `config`, validating the new values first.
    pub(crate) fn apply(self, config: &mut NamespaceConfig) -> Result<(), NamespaceError> {
        if let Some(owners) = &self.owners {
            if owners.is_empty() {
                return Err(NamespaceError::EmptyOwners);
            }
        }
        if let Some(quota) = self.daily_event_quota {
            check_quota(quota)?;
        }
        if let Some(days) = self.storage_retention_days {
            check_retention(days)?;
        }

        if let Some(v) = self.display_name {
            config.display_name = v;
        }
        if let Some(v) = self.description {
            config.description = v;
        }
        if let Some(v) = self.owners {
            config.owners = v;
        }
        if let Some(v) = self.viewers {
            config.viewers = v;
        }
        if let Some(v) = self.daily_event_quota {
            config.daily_event_quota = v;
        }
        if let Some(v) = self.storage_retention_days {
            config.storage_retention_days = v;
        }
        if let Some(v) = self.tags {
            config.tags = v;
        }
        Ok(())
    }
}

fn parse_field<T: serde::de::DeserializeOwned>(
    key: &str,
    value: &Value,
) -> Result<T, NamespaceError> {
    T::deserialize(value).map_err(|e| NamespaceError::InvalidUpdate {
        field: key.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn check_quota(quota: u64) -> Result<(), NamespaceError> {
    if (MIN_DAILY_QUOTA..=MAX_DAILY_QUOTA).contains(&quota) {
        Ok(())
    } else {
        Err(NamespaceError::QuotaOutOfRange(quota))
    }
}

pub(crate) fn check_retention(days: u32) -> Result<(), NamespaceError> {
    if (MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(NamespaceError::RetentionOutOfRange(days))
    }
}
