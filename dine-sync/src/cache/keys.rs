//! Cache key and TTL presets
//!
//! All cached projections are tenant-scoped. Keys are logical; the manager
//! adds the configured prefix when touching storage.

use std::time::Duration;

/// Named TTL presets
pub struct CacheTtl;

impl CacheTtl {
    pub const MENU: Duration = Duration::from_secs(30 * 60);
    pub const CATEGORIES: Duration = Duration::from_secs(60 * 60);
    pub const TABLES: Duration = Duration::from_secs(5 * 60);
    pub const RESTAURANT: Duration = Duration::from_secs(15 * 60);
    pub const SETTINGS: Duration = Duration::from_secs(10 * 60);
}

/// Kind of tenant projection held in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Menu,
    Categories,
    Tables,
    Restaurant,
    Settings,
}

impl CacheKind {
    pub const ALL: [CacheKind; 5] = [
        CacheKind::Menu,
        CacheKind::Categories,
        CacheKind::Tables,
        CacheKind::Restaurant,
        CacheKind::Settings,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Menu => "menu",
            CacheKind::Categories => "categories",
            CacheKind::Tables => "tables",
            CacheKind::Restaurant => "restaurant",
            CacheKind::Settings => "settings",
        }
    }

    /// Default TTL for this projection
    pub const fn ttl(&self) -> Duration {
        match self {
            CacheKind::Menu => CacheTtl::MENU,
            CacheKind::Categories => CacheTtl::CATEGORIES,
            CacheKind::Tables => CacheTtl::TABLES,
            CacheKind::Restaurant => CacheTtl::RESTAURANT,
            CacheKind::Settings => CacheTtl::SETTINGS,
        }
    }

    /// Logical key for `tenant_id`
    pub fn key(&self, tenant_id: &str) -> String {
        format!("{}_{}", self.as_str(), tenant_id)
    }
}

/// Per-tenant key helpers
pub struct CacheKey;

impl CacheKey {
    pub fn menu(tenant_id: &str) -> String {
        CacheKind::Menu.key(tenant_id)
    }

    pub fn categories(tenant_id: &str) -> String {
        CacheKind::Categories.key(tenant_id)
    }

    pub fn tables(tenant_id: &str) -> String {
        CacheKind::Tables.key(tenant_id)
    }

    pub fn restaurant(tenant_id: &str) -> String {
        CacheKind::Restaurant.key(tenant_id)
    }

    pub fn settings(tenant_id: &str) -> String {
        CacheKind::Settings.key(tenant_id)
    }

    /// Every projection key of one tenant
    pub fn all_for_tenant(tenant_id: &str) -> Vec<String> {
        CacheKind::ALL.iter().map(|k| k.key(tenant_id)).collect()
    }
}
