//! Expiry Purge Task
//!
//! Lookups ignore expired entries but leave them in memory. For long-lived
//! async memoizers with many distinct arguments, this task evicts them
//! periodically.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::AsyncMemoized;

/// Spawns a task that periodically removes expired entries from `memo`.
///
/// The task sleeps for `interval_secs` between runs and never ends on its
/// own; abort the returned handle to stop it.
///
/// # Example
/// ```ignore
/// let memo = Arc::new(cached_async(fetch, MemoOptions::default())?);
/// let purge_handle = spawn_purge_task(memo.clone(), 60);
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task<F, T, E>(
    memo: Arc<AsyncMemoized<F, T, E>>,
    interval_secs: u64,
) -> JoinHandle<()>
where
    F: Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + 'static,
{
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry purge task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = memo.purge_expired().await;

            if removed > 0 {
                info!("Expiry purge: removed {} expired entries", removed);
            } else {
                debug!("Expiry purge: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MemoOptions;
    use crate::key::CallArgs;

    fn memo_with_clock(
        clock: &ManualClock,
    ) -> Arc<
        AsyncMemoized<
            impl Fn(CallArgs) -> std::future::Ready<Result<usize, String>> + Send + Sync + 'static,
            usize,
            String,
        >,
    > {
        Arc::new(
            AsyncMemoized::new(
                |args: CallArgs| std::future::ready(Ok(args.len())),
                MemoOptions::new(10.0).unwrap(),
            )
            .unwrap()
            .with_clock(Arc::new(clock.clone())),
        )
    }

    #[tokio::test]
    async fn test_purge_task_removes_expired_entries() {
        let clock = ManualClock::new(0.0);
        let memo = memo_with_clock(&clock);

        memo.call(CallArgs::new().arg(1)).await.unwrap();
        clock.set(11.0);

        let handle = spawn_purge_task(memo.clone(), 1);

        // Wait for at least one purge run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(memo.is_empty().await, "Expired entry should have been purged");
        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_fresh_entries() {
        let clock = ManualClock::new(0.0);
        let memo = memo_with_clock(&clock);

        memo.call(CallArgs::new().arg(1)).await.unwrap();
        clock.set(5.0);

        let handle = spawn_purge_task(memo.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(memo.len().await, 1, "Fresh entry should not be removed");
        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_can_be_aborted() {
        let clock = ManualClock::new(0.0);
        let handle = spawn_purge_task(memo_with_clock(&clock), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
