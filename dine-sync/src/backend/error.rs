//! Backend error taxonomy
//!
//! Raw backend failures arrive as a code string plus a free-form message.
//! They are translated into [`BackendErrorKind`] exactly once, here, so retry
//! logic and user-facing mapping never look at message text.

use std::fmt;

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Typed error kind at the document-store boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    // ── permanent ──
    PermissionDenied,
    Unauthenticated,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Unimplemented,
    DataLoss,

    // ── transient ──
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    Aborted,
    Cancelled,
    Internal,
    Unknown,
    /// Transport-level failure detected from the raw error (connection reset, offline)
    Network,
    /// Client-side timeout detected from the raw error
    Timeout,

    /// Anything the edge could not classify
    Unclassified,
}

impl BackendErrorKind {
    /// Translate a raw backend code (`"unavailable"`, `"firestore/not-found"`, ...)
    pub fn from_code(code: &str) -> Self {
        let code = code.rsplit('/').next().unwrap_or(code).trim();
        match code.to_ascii_lowercase().replace('_', "-").as_str() {
            "permission-denied" => Self::PermissionDenied,
            "unauthenticated" => Self::Unauthenticated,
            "invalid-argument" => Self::InvalidArgument,
            "not-found" => Self::NotFound,
            "already-exists" => Self::AlreadyExists,
            "failed-precondition" => Self::FailedPrecondition,
            "unimplemented" => Self::Unimplemented,
            "data-loss" => Self::DataLoss,
            "unavailable" => Self::Unavailable,
            "deadline-exceeded" => Self::DeadlineExceeded,
            "resource-exhausted" => Self::ResourceExhausted,
            "aborted" => Self::Aborted,
            "cancelled" | "canceled" => Self::Cancelled,
            "internal" => Self::Internal,
            "unknown" => Self::Unknown,
            _ => Self::Unclassified,
        }
    }

    /// Classify a message-only failure (no code) by its network/timeout shape
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else if lower.contains("network")
            || lower.contains("fetch failed")
            || lower.contains("connection reset")
            || lower.contains("connection refused")
            || lower.contains("offline")
        {
            Self::Network
        } else {
            Self::Unclassified
        }
    }

    /// Transient failures worth retrying with backoff
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::DeadlineExceeded
                | Self::ResourceExhausted
                | Self::Aborted
                | Self::Cancelled
                | Self::Internal
                | Self::Unknown
                | Self::Network
                | Self::Timeout
        )
    }

    /// Failures that must surface immediately
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::Unauthenticated
                | Self::InvalidArgument
                | Self::NotFound
                | Self::AlreadyExists
                | Self::FailedPrecondition
                | Self::Unimplemented
                | Self::DataLoss
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::FailedPrecondition => "failed-precondition",
            Self::Unimplemented => "unimplemented",
            Self::DataLoss => "data-loss",
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::ResourceExhausted => "resource-exhausted",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Unclassified => "unclassified",
        }
    }

    /// Matching platform error code
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::PermissionDenied => ErrorCode::PermissionDenied,
            Self::Unauthenticated => ErrorCode::NotAuthenticated,
            Self::InvalidArgument => ErrorCode::InvalidRequest,
            Self::NotFound => ErrorCode::NotFound,
            Self::AlreadyExists => ErrorCode::AlreadyExists,
            // 索引构建期间的 precondition 失败，属于可自愈的临时状态
            Self::FailedPrecondition => ErrorCode::IndexBuilding,
            Self::Unimplemented => ErrorCode::Unimplemented,
            Self::DataLoss => ErrorCode::DataLoss,
            Self::Unavailable => ErrorCode::ServiceUnavailable,
            Self::DeadlineExceeded | Self::Timeout => ErrorCode::TimeoutError,
            Self::ResourceExhausted => ErrorCode::QuotaExceeded,
            Self::Aborted => ErrorCode::Aborted,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Internal => ErrorCode::InternalError,
            Self::Network => ErrorCode::NetworkError,
            Self::Unknown | Self::Unclassified => ErrorCode::Unknown,
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every [`DocumentStore`](super::DocumentStore) call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Translate a raw `(code, message)` pair from the backend SDK
    ///
    /// A recognised code wins; otherwise the message is checked for
    /// network/timeout shapes; anything else stays unclassified.
    pub fn from_raw(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match code.map(BackendErrorKind::from_code) {
            Some(kind) if kind != BackendErrorKind::Unclassified => kind,
            _ => BackendErrorKind::from_message(&message),
        };
        Self { kind, message }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, format!("{} not found", what.into()))
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::with_message(err.kind.error_code(), err.message)
            .with_detail("backend_kind", err.kind.as_str())
    }
}
