//! TTL Memo demo
//!
//! Wraps a slow async lookup, fires concurrent and repeated calls at it and
//! prints the resulting cache statistics as JSON.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_memo::{cached_async, spawn_purge_task, CallArgs, MemoOptions, REFRESH_PARAM};

/// Entry point for the demo.
///
/// # Steps
/// 1. Initialize tracing subscriber for logging
/// 2. Load memo options from environment variables
/// 3. Wrap a slow lookup and start the expiry purge task
/// 4. Issue concurrent, repeated and refreshing calls
/// 5. Print statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_memo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = MemoOptions::from_env().context("Failed to load memo options")?;
    info!("Memo options loaded: maxage={}s", options.maxage);

    let lookups = Arc::new(AtomicU64::new(0));
    let counter = lookups.clone();
    let memo = Arc::new(cached_async(
        move |args: CallArgs| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let n = counter.fetch_add(1, Ordering::SeqCst);
                match args.get(0) {
                    Some(name) => Ok(format!("{:?} -> lookup #{}", name, n)),
                    None => Err("lookup needs a name".to_string()),
                }
            }
        },
        options,
    )?);

    let purge_handle = spawn_purge_task(memo.clone(), 60);

    // Concurrent misses on one key share a single lookup
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let memo = memo.clone();
            tokio::spawn(async move { memo.call(CallArgs::new().arg("solver")).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.context("Demo task panicked")?;
        info!("Concurrent call returned {:?}", result);
    }

    let repeated = memo.call(CallArgs::new().arg("solver")).await;
    info!("Repeated call returned {:?}", repeated);

    let refreshed = memo
        .call(CallArgs::new().arg("solver").kwarg(REFRESH_PARAM, true))
        .await;
    info!("Refreshed call returned {:?}", refreshed);

    let failed = memo.call(CallArgs::new()).await;
    info!("Call without a name returned {:?}", failed);

    purge_handle.abort();

    info!(
        "Underlying lookups performed: {}",
        lookups.load(Ordering::SeqCst)
    );
    let stats = memo.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
