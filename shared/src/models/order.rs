//! Order Model

use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    /// Price per unit in currency unit
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Order entity (document in the backend store)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    /// Owning tenant (restaurant account)
    pub tenant_id: String,
    /// Optional sub-scope inside the tenant (branch / venue)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_scope: Option<String>,
    pub table_number: u32,
    pub items: Vec<OrderItem>,
    /// Total in currency unit, equal to Σ(unit_price × quantity)
    pub total: f64,
    pub status: OrderStatus,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis, set when the order reaches a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl Order {
    /// Build the stored document from a validated guest submission
    pub fn from_new(id: impl Into<String>, new: NewOrder, created_at: i64) -> Self {
        Self {
            id: id.into(),
            tenant_id: new.tenant_id,
            sub_scope: new.sub_scope,
            table_number: new.table_number,
            items: new.items,
            total: new.total,
            status: OrderStatus::Pending,
            created_at,
            resolved_at: None,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, patch: &OrderPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(resolved_at) = patch.resolved_at {
            self.resolved_at = Some(resolved_at);
        }
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Guest order submission (before id assignment)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_scope: Option<String>,
    pub table_number: u32,
    pub items: Vec<OrderItem>,
    pub total: f64,
}

/// Partial order update
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl OrderPatch {
    /// Status change, stamping `resolved_at` when the target is terminal
    pub fn status(status: OrderStatus, now: i64) -> Self {
        Self {
            status: Some(status),
            resolved_at: status.is_terminal().then_some(now),
        }
    }
}
