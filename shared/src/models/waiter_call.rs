//! Waiter Call Model

use serde::{Deserialize, Serialize};

use crate::order::WaiterCallStatus;

/// A pending call becomes urgent once it has waited longer than this (5 min)
pub const URGENT_THRESHOLD_MS: i64 = 5 * 60 * 1000;

/// Guest "call a waiter" request (document in the backend store)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiterCall {
    pub id: String,
    pub tenant_id: String,
    pub table_number: u32,
    pub status: WaiterCallStatus,
    /// Unix millis
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl WaiterCall {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        table_number: u32,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            table_number,
            status: WaiterCallStatus::Pending,
            created_at,
            resolved_at: None,
        }
    }

    /// Milliseconds this call has been waiting at `now`
    pub fn waiting_ms(&self, now: i64) -> i64 {
        (now - self.created_at).max(0)
    }

    /// Derived, never stored: pending and waiting longer than `threshold_ms`
    pub fn is_urgent_with(&self, now: i64, threshold_ms: i64) -> bool {
        self.status.is_pending() && self.waiting_ms(now) > threshold_ms
    }

    pub fn is_urgent(&self, now: i64) -> bool {
        self.is_urgent_with(now, URGENT_THRESHOLD_MS)
    }

    pub fn apply(&mut self, patch: &WaiterCallPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(resolved_at) = patch.resolved_at {
            self.resolved_at = Some(resolved_at);
        }
    }
}

/// Partial waiter call update
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiterCallPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WaiterCallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl WaiterCallPatch {
    pub fn resolve(now: i64) -> Self {
        Self {
            status: Some(WaiterCallStatus::Resolved),
            resolved_at: Some(now),
        }
    }
}
