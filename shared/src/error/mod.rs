//! Unified error system for the Dine platform
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Tenant errors
//! - 4xxx: Order errors
//! - 7xxx: Table / waiter call errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::NetworkError);
//! assert_eq!(err.user_message(), "Network error, please check your connection");
//!
//! let err = AppError::with_message(ErrorCode::OrderInvalidItem, "Missing item name")
//!     .with_detail("field", "name");
//! assert!(err.details.is_some());
//! ```

mod category;
mod codes;
mod friendly;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult};
