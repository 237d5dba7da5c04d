use crate::error::{ErrorKind, SyncError};

/// Retry behavior for a classified error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// The operation is re-queued and retried by the next pending pass.
    Timed,
    /// The operation should only be retried after manual intervention.
    Manual,
    /// The operation should not be retried.
    NoRetry,
}

/// Policy describing how a [`SyncError`] should be handled once it is logged.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns an optional operator-facing solution message.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Builds an [`ErrorHandlingPolicy`] from a [`SyncError`].
pub fn build_error_handling_policy(error: &SyncError) -> ErrorHandlingPolicy {
    match error.kind() {
        // Transient connectivity and latency failures recover on their own.
        ErrorKind::SourceConnectionFailed
        | ErrorKind::SourceTimeout
        | ErrorKind::TargetConnectionFailed
        | ErrorKind::TargetTimeout
        | ErrorKind::TargetColumnPending
        | ErrorKind::IoError => ErrorHandlingPolicy::new(RetryDirective::Timed, None),

        ErrorKind::SourceRecordMissing => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("The record no longer exists in the source. Nothing is left to synchronize."),
        ),
        ErrorKind::IncompatibleColumnType => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some(
                "Existing values cannot be cast to the inferred type. \
                 Clean up the column data or keep the current type.",
            ),
        ),
        ErrorKind::ConstraintViolation => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Fix the source record so that it satisfies the target table constraints."),
        ),
        ErrorKind::TargetSchemaError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Verify that the target table and its columns exist and are accessible."),
        ),
        ErrorKind::AuthenticationError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Verify the source API key and the target database credentials."),
        ),
        ErrorKind::ConfigError => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Correct the sync configuration and restart the syncer."),
        ),

        _ => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some(
                "There is no single prescribed solution for this error. \
                 Inspect the sync log entry and retry once the cause is resolved.",
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(kind: ErrorKind) -> SyncError {
        SyncError::from((kind, "test error"))
    }

    #[test]
    fn classifies_timeouts_as_timed_retry() {
        let policy = build_error_handling_policy(&err(ErrorKind::TargetTimeout));
        assert_eq!(policy.retry_directive(), RetryDirective::Timed);
        assert_eq!(policy.solution(), None);

        let policy = build_error_handling_policy(&err(ErrorKind::SourceTimeout));
        assert_eq!(policy.retry_directive(), RetryDirective::Timed);
    }

    #[test]
    fn classifies_pending_column_as_timed_retry() {
        let policy = build_error_handling_policy(&err(ErrorKind::TargetColumnPending));
        assert_eq!(policy.retry_directive(), RetryDirective::Timed);
    }

    #[test]
    fn classifies_cast_failure_as_manual_retry() {
        let policy = build_error_handling_policy(&err(ErrorKind::IncompatibleColumnType));
        assert_eq!(policy.retry_directive(), RetryDirective::Manual);
        assert!(policy.solution().is_some());
    }

    #[test]
    fn missing_source_record_is_never_retried() {
        let policy = build_error_handling_policy(&err(ErrorKind::SourceRecordMissing));
        assert_eq!(policy.retry_directive(), RetryDirective::NoRetry);
    }

    #[test]
    fn classifies_unknown_kind_as_manual_retry() {
        let policy = build_error_handling_policy(&err(ErrorKind::InvalidState));
        assert_eq!(policy.retry_directive(), RetryDirective::Manual);
        assert!(policy.solution().is_some());
    }
}
