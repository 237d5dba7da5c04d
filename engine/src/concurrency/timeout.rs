use std::future::Future;
use std::time::Duration;

use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;

/// Side of the sync a collaborator call talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSide {
    Source,
    Target,
}

/// Runs `future` with a deadline of `duration`.
///
/// An elapsed deadline becomes a [`ErrorKind::SourceTimeout`] or [`ErrorKind::TargetTimeout`]
/// error naming `operation`, so the caller can log it like any other failed call.
pub async fn with_timeout<T, F>(
    side: CallSide,
    operation: &'static str,
    duration: Duration,
    future: F,
) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            let detail = format!("{operation} did not complete within {}ms", duration.as_millis());
            Err(match side {
                CallSide::Source => {
                    sync_error!(ErrorKind::SourceTimeout, "Source call timed out", detail = detail)
                }
                CallSide::Target => {
                    sync_error!(ErrorKind::TargetTimeout, "Target call timed out", detail = detail)
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_call_is_classified_by_side() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };

        let err = with_timeout(CallSide::Target, "insert_row", Duration::from_millis(50), slow)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TargetTimeout);
        assert_eq!(err.detail(), Some("insert_row did not complete within 50ms"));
    }

    #[tokio::test]
    async fn completed_call_passes_through() {
        let result = with_timeout(CallSide::Source, "list_records", Duration::from_secs(1), async {
            Ok(7)
        })
        .await;

        assert_eq!(result, Ok(7));
    }
}
