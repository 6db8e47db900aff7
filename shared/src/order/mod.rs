//! Order lifecycle
//!
//! - Status state machines for orders and waiter calls
//! - Money helpers and pre-submission validation

pub mod money;
pub mod status;

// Re-exports
pub use money::{TOTAL_TOLERANCE, validate_new_order};
pub use status::{OrderStatus, WaiterCallStatus};
