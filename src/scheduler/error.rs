//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone)]
pub enum SchedulerError {
    /// No schedule or event under the given key
    NotFound {
        entity: &'static str,
        key: String,
    },

    /// A different schedule or event already owns the name
    AlreadyExists {
        entity: &'static str,
        name: String,
    },

    /// The schedule's recurrence fields could not be parsed
    InvalidRecurrence {
        schedule: String,
        reason: String,
    },

    /// An event referenced a schedule name the registry does not know
    UnknownSchedule {
        event: String,
        schedule: String,
    },

    /// The metadata service could not be reached or answered badly
    MetadataUnavailable {
        operation: String,
        reason: String,
    },

    /// An outbound callout failed
    DispatchFailed {
        event: String,
        reason: String,
    },

    /// HTTP method outside the allowed set
    InvalidMethod {
        method: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, key } => {
                write!(f, "No {} found for '{}'", entity, key)
            }
            Self::AlreadyExists { entity, name } => {
                write!(f, "A {} named '{}' already exists", entity, name)
            }
            Self::InvalidRecurrence { schedule, reason } => {
                write!(f, "Invalid recurrence for schedule '{}': {}", schedule, reason)
            }
            Self::UnknownSchedule { event, schedule } => {
                write!(
                    f,
                    "Event '{}' references unknown schedule '{}'",
                    event, schedule
                )
            }
            Self::MetadataUnavailable { operation, reason } => {
                write!(f, "Metadata service unavailable during '{}': {}", operation, reason)
            }
            Self::DispatchFailed { event, reason } => {
                write!(f, "Dispatch of event '{}' failed: {}", event, reason)
            }
            Self::InvalidMethod { method } => {
                write!(f, "Invalid HTTP method '{}'", method)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a not-found error for a schedule key
    pub fn schedule_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "schedule",
            key: key.into(),
        }
    }

    /// Create a not-found error for an event key
    pub fn event_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "schedule event",
            key: key.into(),
        }
    }

    /// Create an already-exists error for a schedule name
    pub fn schedule_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: "schedule",
            name: name.into(),
        }
    }

    /// Create an already-exists error for an event name
    pub fn event_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: "schedule event",
            name: name.into(),
        }
    }

    /// Create an invalid-recurrence error
    pub fn invalid_recurrence(schedule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecurrence {
            schedule: schedule.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown-schedule error
    pub fn unknown_schedule(event: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self::UnknownSchedule {
            event: event.into(),
            schedule: schedule.into(),
        }
    }

    /// Create a metadata-unavailable error
    pub fn metadata_unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a dispatch-failed error
    pub fn dispatch_failed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DispatchFailed {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-method error
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Stable kind label, reported to API callers alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::InvalidRecurrence { .. } => "InvalidRecurrence",
            Self::UnknownSchedule { .. } => "UnknownSchedule",
            Self::MetadataUnavailable { .. } => "MetadataUnavailable",
            Self::DispatchFailed { .. } => "DispatchFailed",
            Self::InvalidMethod { .. } => "InvalidMethod",
        }
    }

    /// Errors the caller made, as opposed to scheduler-side failures
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidRecurrence { .. }
                | Self::UnknownSchedule { .. }
        )
    }

    /// Check if the error is recoverable (the operation can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable { .. } | Self::DispatchFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = SchedulerError::schedule_not_found("abc123");
        assert!(err.to_string().contains("schedule"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_invalid_recurrence_display() {
        let err = SchedulerError::invalid_recurrence("midnight", "bad duration 'XT5S'");
        assert!(err.to_string().contains("midnight"));
        assert!(err.to_string().contains("XT5S"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(SchedulerError::schedule_not_found("x").kind(), "NotFound");
        assert_eq!(SchedulerError::event_exists("e").kind(), "AlreadyExists");
        assert_eq!(
            SchedulerError::invalid_recurrence("s", "bad").kind(),
            "InvalidRecurrence"
        );
        assert_eq!(SchedulerError::invalid_method("ZAP").kind(), "InvalidMethod");
    }

    #[test]
    fn test_is_client_error() {
        assert!(SchedulerError::schedule_not_found("x").is_client_error());
        assert!(SchedulerError::unknown_schedule("e", "s").is_client_error());
        assert!(!SchedulerError::dispatch_failed("e", "io").is_client_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(SchedulerError::metadata_unavailable("pull", "timeout").is_recoverable());
        assert!(!SchedulerError::invalid_method("ZAP").is_recoverable());
    }
}
