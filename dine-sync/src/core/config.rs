use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::live::WatcherOptions;
use crate::orders::DEFAULT_PAGE_SIZE;

/// 同步核心配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DINE_CACHE_DIR | ./data | 缓存文件目录 |
/// | DINE_CACHE_PREFIX | dine_cache_ | 缓存键前缀 |
/// | DINE_CACHE_VERSION | 1.0.0 | 缓存版本 (变更后旧条目失效) |
/// | DINE_CACHE_DEFAULT_TTL_SECS | 300 | 默认 TTL(秒) |
/// | DINE_PAGE_SIZE | 20 | 订单分页大小 |
/// | DINE_URGENT_THRESHOLD_SECS | 300 | 呼叫服务员紧急阈值(秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录 (未设置则只输出到终端) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// DINE_CACHE_DIR=/tmp/dine DINE_PAGE_SIZE=50 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 缓存文件目录
    pub cache_dir: PathBuf,
    pub cache_prefix: String,
    pub cache_version: String,
    pub cache_default_ttl_secs: u64,
    /// 订单分页大小
    pub page_size: usize,
    pub urgent_threshold_secs: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl SyncConfig {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            cache_dir: std::env::var("DINE_CACHE_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
            cache_prefix: std::env::var("DINE_CACHE_PREFIX")
                .unwrap_or_else(|_| "dine_cache_".into()),
            cache_version: std::env::var("DINE_CACHE_VERSION").unwrap_or_else(|_| "1.0.0".into()),
            cache_default_ttl_secs: std::env::var("DINE_CACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            page_size: std::env::var("DINE_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            urgent_threshold_secs: std::env::var("DINE_URGENT_THRESHOLD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 缓存管理器配置
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            prefix: self.cache_prefix.clone(),
            version: self.cache_version.clone(),
            default_ttl: Duration::from_secs(self.cache_default_ttl_secs),
            storage_path: Some(self.cache_dir.clone()),
        }
    }

    /// Watcher 默认选项 (系统时钟, 无提醒)
    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions::default()
            .with_urgent_threshold(Duration::from_secs(self.urgent_threshold_secs))
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_configs() {
        let config = SyncConfig {
            cache_dir: PathBuf::from("/tmp/dine"),
            cache_prefix: "p_".into(),
            cache_version: "2".into(),
            cache_default_ttl_secs: 60,
            page_size: 10,
            urgent_threshold_secs: 120,
            log_level: "debug".into(),
            log_dir: None,
            environment: "production".into(),
        };
        let cache = config.cache_config();
        assert_eq!(cache.prefix, "p_");
        assert_eq!(cache.default_ttl, Duration::from_secs(60));
        assert_eq!(cache.storage_path.as_deref(), Some(std::path::Path::new("/tmp/dine")));
        assert_eq!(config.watcher_options().urgent_threshold, Duration::from_secs(120));
        assert!(config.is_production());
    }
}
