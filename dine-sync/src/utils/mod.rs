//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`Clock`] - 可替换的时间源 (TTL / 紧急判定)
//! - 日志初始化

pub mod clock;
pub mod logger;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, system_clock};

// Re-export error types from shared
pub use shared::error::{AppError, AppResult, ErrorCategory, ErrorCode};
