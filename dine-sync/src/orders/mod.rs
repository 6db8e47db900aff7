//! Order reads and writes
//!
//! - [`PaginatedOrders`] - cursor paging over a tenant's order history
//! - [`OrderActions`] - validated, retried writes

pub mod actions;
pub mod paginated;

pub use actions::OrderActions;
pub use paginated::{DEFAULT_PAGE_SIZE, PaginatedOrders, PaginatedOrdersOptions};
