//! Error types for the storage dock
//!
//! Provides structured error types for driver dispatch, provisioning,
//! SAN zoning, discovery and persistence. Composite operations inspect
//! errors through [`Error::kind`] rather than matching concrete variants.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the dock
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported access protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    // =========================================================================
    // Backend Session Errors
    // =========================================================================
    #[error("Backend object not found: {kind}/{name}")]
    ObjectNotFound { kind: String, name: String },

    #[error("LUN id {id} is already in use")]
    IdInUse { id: i64 },

    #[error("Initiator {initiator} is already associated to another host {host_id}")]
    InitiatorConflict { initiator: String, host_id: String },

    #[error("Backend error {code}: {description}")]
    Backend { code: i64, description: String },

    #[error("Backend unavailable: {backend}")]
    BackendUnavailable { backend: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {duration:?} waiting for {operation}")]
    Timeout { operation: String, duration: Duration },

    #[error("Method {method} has not been implemented yet")]
    NotImplemented { method: String },

    // =========================================================================
    // Allocation Errors
    // =========================================================================
    #[error("Cannot find available LUN id between [{min}-{max}]")]
    NoLunIdAvailable { min: i64, max: i64 },

    // =========================================================================
    // Discovery Errors
    // =========================================================================
    #[error("There is no pool can be found")]
    NoPoolsDiscovered,

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an error, independent of where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad request or domain-rule violation, rejected before any backend call
    Validation,
    /// The addressed object does not exist (tolerated in teardown paths)
    NotFound,
    /// Identifier or ownership collision
    Conflict,
    /// Transport hiccup or polling timeout
    Transient,
    /// Operation not supported by this backend
    Unimplemented,
    /// Bounded resource exhausted; needs operator action
    Exhausted,
    /// Backend rejected the call
    Backend,
    /// Anything else
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Unimplemented => write!(f, "unimplemented"),
            ErrorKind::Exhausted => write!(f, "exhausted"),
            ErrorKind::Backend => write!(f, "backend"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Action to take on error for request-level retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Shorthand for a backend-side "object does not exist" error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::ObjectNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Shorthand for a permanently unsupported driver method
    pub fn not_implemented(method: impl Into<String>) -> Self {
        Error::NotImplemented {
            method: method.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::UnsupportedProtocol { .. } | Error::InvalidMetadata(_) => {
                ErrorKind::Validation
            }
            Error::ObjectNotFound { .. } | Error::ResourceNotFound { .. } => ErrorKind::NotFound,
            Error::IdInUse { .. }
            | Error::InitiatorConflict { .. }
            | Error::ResourceExists { .. } => ErrorKind::Conflict,
            Error::Timeout { .. } | Error::BackendUnavailable { .. } | Error::Http(_) => {
                ErrorKind::Transient
            }
            Error::NotImplemented { .. } => ErrorKind::Unimplemented,
            Error::NoLunIdAvailable { .. } => ErrorKind::Exhausted,
            Error::Backend { .. } => ErrorKind::Backend,
            Error::Internal(_)
            | Error::Configuration(_)
            | Error::NoPoolsDiscovered
            | Error::JsonParse(_)
            | Error::YamlParse(_)
            | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// True when the addressed object is already gone
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// True when a requested LUN id collides with an existing one
    pub fn is_id_in_use(&self) -> bool {
        matches!(self, Error::IdInUse { .. })
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self.kind() {
            ErrorKind::Transient => ErrorAction::RequeueWithBackoff,
            ErrorKind::Backend => ErrorAction::RequeueAfter(Duration::from_secs(30)),
            ErrorKind::Internal if matches!(self, Error::NoPoolsDiscovered) => {
                ErrorAction::RequeueAfter(Duration::from_secs(60))
            }
            ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::Conflict
            | ErrorKind::Unimplemented
            | ErrorKind::Exhausted => ErrorAction::NoRequeue,
            ErrorKind::Internal => match self {
                Error::Configuration(_) | Error::JsonParse(_) | Error::YamlParse(_) => {
                    ErrorAction::NoRequeue
                }
                _ => ErrorAction::RequeueWithBackoff,
            },
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Result type alias for the dock
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::not_found("host", "h1").kind(), ErrorKind::NotFound);
        assert_eq!(Error::IdInUse { id: 7 }.kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::not_implemented("CreateVolumeGroup").kind(),
            ErrorKind::Unimplemented
        );
        assert_eq!(
            Error::NoLunIdAvailable { min: 1, max: 2 }.kind(),
            ErrorKind::Exhausted
        );
        assert_eq!(
            Error::Validation("hypermetro".into()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_error_actions() {
        let err = Error::Timeout {
            operation: "lun ready".into(),
            duration: Duration::from_secs(600),
        };
        assert_eq!(err.action(), ErrorAction::RequeueWithBackoff);
        assert!(err.is_transient());

        let err = Error::Configuration("bad config".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        assert_eq!(
            Error::NoPoolsDiscovered.action(),
            ErrorAction::RequeueAfter(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_error_retryable() {
        let permanent = Error::not_implemented("TerminateSnapshotConnection");
        assert!(!permanent.is_retryable());

        let exhausted = Error::NoLunIdAvailable { min: 100, max: 102 };
        assert!(!exhausted.is_retryable());
        assert_eq!(
            exhausted.to_string(),
            "Cannot find available LUN id between [100-102]"
        );

        let transient = Error::BackendUnavailable {
            backend: "oceanstor".into(),
        };
        assert!(transient.is_retryable());
    }
}
