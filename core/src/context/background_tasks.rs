use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::session_core::SessionCore;
use crate::snapshot::load_snapshot;

/// Periodic roster cleanup and state persistence.
pub struct BackgroundTasks {
    cancel: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub(crate) fn spawn(core: Arc<SessionCore>) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);
        let settings = &core.settings;
        let snapshot_path = settings
            .snapshot_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let cleanup_every = Duration::from_secs(settings.snapshot_poll_secs.max(1));
        let persist_every = Duration::from_secs(settings.persist_interval_secs.max(1));

        let tasks = vec![
            tokio::spawn(cleanup_loop(
                Arc::clone(&core),
                snapshot_path,
                cleanup_every,
                cancel_rx.clone(),
            )),
            tokio::spawn(persist_loop(core, persist_every, cancel_rx)),
        ];
        Self { cancel, tasks }
    }

    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }
    }
}

/// Reconcile against the snapshot feed when one is configured, otherwise
/// evict inactive characters on the same cadence.
async fn cleanup_loop(
    core: Arc<SessionCore>,
    snapshot_path: Option<PathBuf>,
    every: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!(snapshot = ?snapshot_path, "Roster cleanup loop started");

    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }
        let core = Arc::clone(&core);
        let path = snapshot_path.clone();
        let result = tokio::task::spawn_blocking(move || match path {
            Some(path) => core.reconcile_snapshot(&load_snapshot(&path)),
            None => core.sweep(),
        })
        .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Roster cleanup failed");
        }
    }
}

async fn persist_loop(core: Arc<SessionCore>, every: Duration, mut cancel: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately and there is nothing to write yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }
        let core = Arc::clone(&core);
        if let Err(e) = tokio::task::spawn_blocking(move || core.persist()).await {
            tracing::error!(error = %e, "Persist task failed");
        }
    }
}
