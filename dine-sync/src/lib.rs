//! Dine Sync - 多租户扫码点餐的订单/通知同步核心
//!
//! # 架构概述
//!
//! - **重试执行器** (`retry`): 分类指数退避, ±25% 抖动
//! - **本地缓存** (`cache`): TTL + 版本标记, redb 持久化, 内存回退
//! - **后端边界** (`backend`): 文档存储 trait, 变更订阅, 错误类型化
//! - **实时订阅** (`live`): 订阅适配器, 呼叫服务员/订单通知 watcher, 提醒
//! - **订单** (`orders`): 游标分页读取, 校验后的写操作
//!
//! # 模块结构
//!
//! ```text
//! dine-sync/src/
//! ├── core/          # 配置
//! ├── backend/       # DocumentStore + MemoryStore
//! ├── retry/         # 重试执行器
//! ├── cache/         # 本地缓存
//! ├── live/          # 订阅适配器 + watcher + 提醒
//! ├── orders/        # 分页 + 订单操作
//! └── utils/         # 时钟, 日志
//! ```
//!
//! 写操作直接修改后端; 随后到达的变更事件 (而不是写操作的返回值)
//! 才是权威状态。

pub mod backend;
pub mod cache;
pub mod core;
pub mod live;
pub mod orders;
pub mod retry;
pub mod utils;

// Re-export 公共类型
pub use backend::{
    BackendError, BackendErrorKind, BackendResult, ChangeSet, DocumentStore, MemoryStore,
    OrderFilter, Subscription, WaiterCallFilter,
};
pub use cache::{CacheConfig, CacheKey, CacheManager, CacheTtl};
pub use core::SyncConfig;
pub use live::{Alerts, AudioGate, OrderNotifier, WaiterCallWatcher, WatcherOptions};
pub use orders::{OrderActions, PaginatedOrders, PaginatedOrdersOptions};
pub use retry::{RetryConfig, RetryOutcome, with_retry, with_retry_batch, with_retry_or_throw};
pub use utils::{AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 加载 .env 并初始化日志
pub fn setup_environment() -> SyncConfig {
    let _ = dotenv::dotenv();
    let config = SyncConfig::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    config
}
