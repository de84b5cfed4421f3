//! Rebuilds the DAG whenever a new cache snapshot is published.
//!
//! Builds run on the blocking pool so that large snapshots do not stall the
//! runtime. Only the newest snapshot matters: a build whose snapshot was
//! replaced while it ran is discarded rather than published.

use crate::{builder::Build, cache::Cache, metrics::BuildMetrics};
use std::{sync::Arc, time::Instant};
use tokio::sync::watch;

/// Runs until the snapshot sender is dropped.
pub async fn run<F>(
    build: F,
    mut snapshots: watch::Receiver<Arc<Cache>>,
    builds: watch::Sender<Option<Arc<Build>>>,
    metrics: BuildMetrics,
) where
    F: Fn(&Cache) -> Build + Send + Sync + 'static,
{
    let build = Arc::new(build);
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        let started = Instant::now();
        let result = tokio::task::spawn_blocking({
            let build = build.clone();
            move || build(&snapshot)
        })
        .await;

        match result {
            Err(error) => {
                tracing::error!(%error, "DAG build failed");
                metrics.failed();
            }
            Ok(_) if snapshots.has_changed().unwrap_or(false) => {
                tracing::debug!("Discarding build of a stale snapshot");
                metrics.discarded();
                continue;
            }
            Ok(built) => {
                metrics.observe(&built, started.elapsed());
                builds.send_replace(Some(Arc::new(built)));
            }
        }

        if snapshots.changed().await.is_err() {
            tracing::debug!("Snapshot publisher dropped");
            return;
        }
    }
}
