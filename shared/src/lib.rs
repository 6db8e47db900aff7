//! Shared types for the Dine platform
//!
//! Common types used by the sync core and every client surface: order and
//! waiter call documents, their status state machines, money validation
//! and the unified error system.

pub mod error;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{NewOrder, Order, OrderItem, OrderPatch, WaiterCall, WaiterCallPatch};
pub use order::{OrderStatus, WaiterCallStatus};
