//! Order and waiter call status state machines

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult, ErrorCode};

/// Order status
///
/// Happy path: `pending → accepted → preparing → ready → served → paid`.
/// `cancelled` / `auto_cancelled` are terminal and reachable from any
/// non-terminal status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    Preparing,
    Ready,
    Served,
    Paid,
    Cancelled,
    AutoCancelled,
}

impl OrderStatus {
    /// All statuses in happy-path order, cancellations last
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::AutoCancelled,
    ];

    /// Position along the happy path (cancellations share the last rank)
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
            Self::Preparing => 2,
            Self::Ready => 3,
            Self::Served => 4,
            Self::Paid => 5,
            Self::Cancelled | Self::AutoCancelled => 6,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::AutoCancelled)
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::AutoCancelled)
    }

    /// Whether `next` may follow `self`
    ///
    /// Forward moves (including skips) and cancellation are allowed from any
    /// non-terminal status. Re-applying the current status is accepted as a
    /// no-op. Backward moves and moves out of a terminal status are rejected.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.is_cancelled() || next.rank() > self.rank()
    }

    /// Validate a transition, returning the matching order error on refusal
    pub fn check_transition(&self, order_id: &str, next: OrderStatus) -> AppResult<()> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        let code = match self {
            Self::Paid => ErrorCode::OrderAlreadyPaid,
            Self::Cancelled | Self::AutoCancelled => ErrorCode::OrderAlreadyCancelled,
            _ => ErrorCode::OrderInvalidTransition,
        };
        Err(AppError::order(
            code,
            order_id,
            format!("cannot move order from {} to {}", self, next),
        ))
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Served => "served",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::AutoCancelled => "auto_cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waiter call status (`pending` → `resolved`, exactly once)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaiterCallStatus {
    #[default]
    Pending,
    Resolved,
}

impl WaiterCallStatus {
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_forward() {
        let path = &OrderStatus::ALL[..6];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(pair[0]), "{} -> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_skips_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        for status in &OrderStatus::ALL[..5] {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
            assert!(status.can_transition_to(OrderStatus::AutoCancelled));
        }
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_terminal_is_final() {
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::AutoCancelled.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Paid));

        let err = OrderStatus::Paid
            .check_transition("o-1", OrderStatus::Served)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderAlreadyPaid);

        let err = OrderStatus::Cancelled
            .check_transition("o-1", OrderStatus::Ready)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderAlreadyCancelled);

        let err = OrderStatus::Ready
            .check_transition("o-1", OrderStatus::Accepted)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderInvalidTransition);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::AutoCancelled).unwrap(),
            "\"auto_cancelled\""
        );
        let status: WaiterCallStatus = serde_json::from_str("\"resolved\"").unwrap();
        assert_eq!(status, WaiterCallStatus::Resolved);
    }
}
