//! Namespace registry: the single source of truth for tenant access decisions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::{HubConfig, NamespaceSettings, QuotaMode};
use crate::namespace::error::NamespaceError;
use crate::namespace::model::{
    check_quota, check_retention, is_valid_namespace_name, CreateNamespace, NamespaceConfig,
    NamespaceUpdate,
};
use crate::namespace::quota::DailyUsage;

/// Concurrent directory of namespaces.
///
/// Values are stored as `Arc<NamespaceConfig>` and replaced wholesale on
/// update, so a reader holding a config never observes a half-applied change.
#[derive(Debug)]
pub struct NamespaceRegistry {
    namespaces: DashMap<String, Arc<NamespaceConfig>>,
    settings: NamespaceSettings,
    auth_enabled: bool,
    usage: DailyUsage,
}

impl NamespaceRegistry {
    /// Create a registry seeded with the configured default namespace.
    pub fn new(settings: NamespaceSettings, auth_enabled: bool) -> Self {
        let registry = Self {
            namespaces: DashMap::new(),
            settings,
            auth_enabled,
            usage: DailyUsage::new(),
        };
        registry.seed_default();
        registry
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.namespaces.clone(), config.auth.api_key_validation)
    }

    pub fn settings(&self) -> &NamespaceSettings {
        &self.settings
    }

    fn seed_default(&self) {
        let name = self.settings.default_namespace.clone();
        let request = CreateNamespace {
            name: name.clone(),
            display_name: "Demo Pipeline".to_string(),
            description: Some("Default namespace for demonstration purposes".to_string()),
            owners: vec!["demo@data-lineage-hub.com".to_string()],
            daily_event_quota: None,
            tags: BTreeMap::from([
                ("type".to_string(), "demo".to_string()),
                ("environment".to_string(), "development".to_string()),
            ]),
        };

        match self.create(request) {
            Ok(_) => {
                if let Some(mut entry) = self.namespaces.get_mut(&name) {
                    let mut seeded = NamespaceConfig::clone(entry.value());
                    seeded
                        .viewers
                        .insert("public@data-lineage-hub.com".to_string());
                    *entry = Arc::new(seeded);
                }
                tracing::info!(namespace = %name, "Initialized default namespace");
            }
            Err(e) => tracing::warn!(namespace = %name, error = %e, "Default namespace not seeded"),
        }
    }

    /// Create a namespace. Fails on an invalid name, empty owners, out of
    /// range quota, or a name that is already taken.
    pub fn create(&self, request: CreateNamespace) -> Result<Arc<NamespaceConfig>, NamespaceError> {
        if !is_valid_namespace_name(&request.name) {
            return Err(NamespaceError::InvalidName(request.name));
        }
        if request.owners.is_empty() {
            return Err(NamespaceError::EmptyOwners);
        }
        let quota = request
            .daily_event_quota
            .unwrap_or(self.settings.default_daily_quota);
        check_quota(quota)?;
        check_retention(self.settings.default_retention_days)?;

        let now = Utc::now();
        let config = Arc::new(NamespaceConfig {
            name: request.name.clone(),
            display_name: request.display_name,
            description: request.description,
            owners: request.owners.into_iter().collect(),
            viewers: BTreeSet::new(),
            daily_event_quota: quota,
            storage_retention_days: self.settings.default_retention_days,
            tags: request.tags,
            created_at: now,
            updated_at: now,
        });

        match self.namespaces.entry(request.name) {
            Entry::Occupied(existing) => Err(NamespaceError::AlreadyExists(existing.key().clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&config));
                tracing::info!(
                    namespace = %config.name,
                    display_name = %config.display_name,
                    owners = ?config.owners,
                    "Created namespace"
                );
                Ok(config)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<NamespaceConfig>> {
        self.namespaces.get(name).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// List namespaces visible to `identity`, sorted by name.
    ///
    /// Without permission enforcement (or without an identity) everything is
    /// listed. With it, membership filters the result unless cross-namespace
    /// discovery is on, which disables filtering entirely.
    pub fn list(&self, identity: Option<&str>) -> Vec<Arc<NamespaceConfig>> {
        let filter = match identity {
            Some(id) if self.settings.require_permissions => Some(id),
            _ => None,
        };

        let mut visible: Vec<_> = self
            .namespaces
            .iter()
            .filter(|r| match filter {
                None => true,
                Some(id) => r.value().is_member(id) || self.settings.cross_namespace_discovery,
            })
            .map(|r| Arc::clone(r.value()))
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        visible
    }

    /// Apply a partial update. Returns `Ok(None)` if the namespace is unknown.
    pub fn update(
        &self,
        name: &str,
        update: NamespaceUpdate,
    ) -> Result<Option<Arc<NamespaceConfig>>, NamespaceError> {
        let Some(mut entry) = self.namespaces.get_mut(name) else {
            return Ok(None);
        };

        let mut next = NamespaceConfig::clone(entry.value());
        update.apply(&mut next)?;
        next.updated_at = Utc::now();
        *entry = Arc::new(next);

        tracing::info!(namespace = %name, "Updated namespace");
        Ok(Some(Arc::clone(entry.value())))
    }

    /// Decide whether `identity` may use `name`.
    ///
    /// Checks run in a fixed order: isolation disabled allows everything; an
    /// unknown namespace is allowed iff auto-creation is on; disabled auth (or
    /// an anonymous caller) is allowed; otherwise membership decides.
    pub fn validate_access(&self, name: &str, identity: Option<&str>, require_owner: bool) -> bool {
        if !self.settings.isolation_enabled {
            return true;
        }

        let Some(config) = self.get(name) else {
            return self.settings.auto_create;
        };

        let Some(identity) = identity.filter(|_| self.auth_enabled) else {
            return true;
        };

        if require_owner {
            config.is_owner(identity)
        } else {
            config.is_member(identity)
        }
    }

    /// Create `name` with defaults if it does not exist yet. Never errors:
    /// failures are logged and reported as `false`.
    pub fn auto_create_if_needed(&self, name: &str) -> bool {
        if self.contains(name) {
            return true;
        }
        if !self.settings.auto_create {
            return false;
        }

        let request = CreateNamespace {
            name: name.to_string(),
            display_name: format!("Auto-created: {}", name),
            description: Some(format!("Automatically created namespace for {}", name)),
            owners: vec![format!("admin@{}.com", name)],
            daily_event_quota: None,
            tags: BTreeMap::from([
                ("auto_created".to_string(), "true".to_string()),
                ("environment".to_string(), "development".to_string()),
            ]),
        };

        match self.create(request) {
            Ok(_) => true,
            // Lost a race with a concurrent creator; the namespace exists now.
            Err(NamespaceError::AlreadyExists(_)) => true,
            Err(e) => {
                tracing::error!(namespace = %name, error = %e, "Failed to auto-create namespace");
                false
            }
        }
    }

    /// Check whether `requested` more events fit the namespace's quota.
    ///
    /// The per-request ceiling always applies. Daily mode additionally
    /// compares today's accepted count against `daily_event_quota`.
    pub fn check_quota(&self, name: &str, requested: u64) -> bool {
        let Some(config) = self.get(name) else {
            return false;
        };

        if requested > self.settings.batch_ceiling {
            return false;
        }

        match self.settings.quota_mode {
            QuotaMode::BatchCeiling => true,
            QuotaMode::Daily => {
                let used = self.usage.used(name, Utc::now().date_naive());
                used.saturating_add(requested) <= config.daily_event_quota
            }
        }
    }

    /// Like [`Self::check_quota`], but in daily mode the requested count is
    /// also reserved against today's counter in the same step, so
    /// concurrent requests cannot overrun the quota together.
    pub fn reserve_quota(&self, name: &str, requested: u64) -> bool {
        let Some(config) = self.get(name) else {
            return false;
        };

        if requested > self.settings.batch_ceiling {
            return false;
        }

        match self.settings.quota_mode {
            QuotaMode::BatchCeiling => true,
            QuotaMode::Daily => {
                let reserved = self.usage.try_reserve(
                    name,
                    Utc::now().date_naive(),
                    requested,
                    config.daily_event_quota,
                );
                if reserved {
                    tracing::debug!(namespace = %name, requested, "Reserved namespace quota");
                }
                reserved
            }
        }
    }

    /// Return reserved events that were not accepted (daily mode only).
    pub fn release_quota(&self, name: &str, unused: u64) {
        if self.settings.quota_mode == QuotaMode::Daily && unused > 0 {
            self.usage.release(name, Utc::now().date_naive(), unused);
            tracing::debug!(namespace = %name, unused, "Released unused namespace quota");
        }
    }
}
