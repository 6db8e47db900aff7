//! User-facing message mapping for error codes
//!
//! Guests and staff never see raw backend errors. Each code maps to a short,
//! non-technical sentence; the full error is logged separately.

use super::codes::ErrorCode;

impl ErrorCode {
    /// Short, non-technical message suitable for a toast or inline hint
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Success => "Done",

            Self::NetworkError | Self::ServiceUnavailable => {
                "Network error, please check your connection"
            }
            Self::TimeoutError => "The request took too long, please try again",
            Self::IndexBuilding => "Optimization in progress, please try again in a few minutes",
            Self::QuotaExceeded | Self::Aborted => {
                "The service is busy, please try again shortly"
            }

            Self::NotAuthenticated => "Please sign in again",
            Self::PermissionDenied => "You don't have permission to do that",

            Self::NotFound
            | Self::OrderNotFound
            | Self::WaiterCallNotFound
            | Self::TenantNotFound => "This item no longer exists",

            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::OrderEmpty
            | Self::OrderInvalidItem
            | Self::OrderTotalMismatch => "Please check the order details and try again",

            Self::OrderInvalidTransition
            | Self::OrderAlreadyPaid
            | Self::OrderAlreadyCancelled => "This order can no longer be changed",

            _ => "Something went wrong, please try again",
        }
    }

    /// Whether the condition resolves on its own (worth telling the user to wait)
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::TimeoutError
                | Self::ServiceUnavailable
                | Self::IndexBuilding
                | Self::QuotaExceeded
                | Self::Aborted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_building_has_distinct_message() {
        assert_ne!(
            ErrorCode::IndexBuilding.user_message(),
            ErrorCode::InternalError.user_message()
        );
        assert!(ErrorCode::IndexBuilding.user_message().contains("Optimization"));
        assert!(ErrorCode::IndexBuilding.is_temporary());
    }

    #[test]
    fn test_network_message() {
        assert_eq!(
            ErrorCode::NetworkError.user_message(),
            "Network error, please check your connection"
        );
        assert!(!ErrorCode::PermissionDenied.is_temporary());
    }
}
