//! Data models
//!
//! Documents owned by the backend store. Clients only hold reconstructible
//! projections of these. All IDs are opaque document ids (`String`), all
//! timestamps Unix millis (`i64`).

pub mod order;
pub mod waiter_call;

// Re-exports
pub use order::*;
pub use waiter_call::*;
