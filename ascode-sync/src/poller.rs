//! Polls a repository operation until it completes, fails, times out or is
//! cancelled.
//!
//! The first status check happens one interval after the call, then once per
//! interval. A slow status check delays the next one rather than bunching
//! ticks. The deadline and the cancellation token are also raced against an
//! in-flight status check, so neither waits for a slow service.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use ascode_core::{Operation, OperationStatus};

use crate::analyzer::RepositoryAnalyzer;
use crate::config::PollerConfig;
use crate::error::SyncError;

/// Floor applied to the configured interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Refresh `operation` until the service reports it done.
///
/// Returns `Ok(())` on [`OperationStatus::Done`]; the operation then holds
/// the retrieved files. Errors are distinguishable with
/// [`SyncError::is_cancelled`], [`SyncError::is_timeout`] and
/// [`SyncError::is_operation_failure`]; a failed status check is returned
/// as-is without retrying.
pub async fn poll_repository_operation<A>(
    analyzer: &A,
    operation: &mut Operation,
    config: &PollerConfig,
    cancel: &CancellationToken,
) -> Result<(), SyncError>
where
    A: RepositoryAnalyzer + ?Sized,
{
    // `interval_at` panics on a zero period.
    let period = config.interval.max(MIN_POLL_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = time::sleep(config.timeout);
    tokio::pin!(deadline);

    let timeout = || SyncError::OperationTimeout {
        after: config.timeout,
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("repository analysis cancelled");
                return Err(SyncError::Cancelled);
            }
            _ = &mut deadline => {
                warn!(timeout = ?config.timeout, "repository analysis timed out");
                return Err(timeout());
            }
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            _ = &mut deadline => return Err(timeout()),
            fetched = analyzer.fetch_status(operation) => fetched,
        };
        fetched.map_err(SyncError::Remote)?;

        match operation.status {
            OperationStatus::Done => {
                debug!(files = operation.load_files.results.len(), "repository operation done");
                return Ok(());
            }
            OperationStatus::Error => {
                let redacted = operation.redacted().to_string();
                error!(operation = %redacted, "repository operation in error");
                return Err(SyncError::OperationFailed {
                    message: operation.error.clone(),
                    operation: redacted,
                });
            }
            status => debug!(%status, "repository operation in progress"),
        }
    }
}
