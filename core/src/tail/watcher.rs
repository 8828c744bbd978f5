use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::reader::{LogTail, TailBatch};

/// Receives the batches read by a watch task, on a blocking worker thread.
/// Batches for one file arrive in read order.
pub trait LineSink: Send + Sync + 'static {
    fn on_batch(&self, path: &Path, batch: TailBatch);
}

/// A running watch task for one file.
pub struct WatchHandle {
    tail: Arc<LogTail>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn path(&self) -> &Path {
        self.tail.path()
    }

    pub fn tail(&self) -> &Arc<LogTail> {
        &self.tail
    }

    /// Stop the timer and notifications. A read already in flight finishes first.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(path = %self.tail.path().display(), error = %e, "Watch task failed");
            }
        }
    }
}

/// Spawn the polling loop for `tail`. The interval timer drives reads;
/// filesystem notifications, when enabled, only add extra reads.
pub fn spawn_watch(
    tail: Arc<LogTail>,
    sink: Arc<dyn LineSink>,
    interval: Duration,
    use_notifications: bool,
) -> WatchHandle {
    let (cancel, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(run_watch(
        Arc::clone(&tail),
        sink,
        interval,
        use_notifications,
        cancel_rx,
    ));
    tracing::info!(path = %tail.path().display(), ?interval, "Watching log");
    WatchHandle { tail, cancel, task }
}

async fn run_watch(
    tail: Arc<LogTail>,
    sink: Arc<dyn LineSink>,
    interval: Duration,
    use_notifications: bool,
    mut cancel: watch::Receiver<bool>,
) {
    let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
    // Dropping the watcher unregisters it, so it lives for the whole loop.
    let _watcher = if use_notifications {
        start_notifier(tail.path(), notify_tx)
    } else {
        None
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {}
            Some(()) = notify_rx.recv() => {
                while notify_rx.try_recv().is_ok() {}
            }
        }
        if *cancel.borrow() {
            break;
        }
        run_cycle(&tail, &sink).await;
    }
    tracing::info!(path = %tail.path().display(), "Stopped watching log");
}

async fn run_cycle(tail: &Arc<LogTail>, sink: &Arc<dyn LineSink>) {
    let tail = Arc::clone(tail);
    let sink = Arc::clone(sink);
    let result = tokio::task::spawn_blocking(move || {
        tail.poll_with(|batch| sink.on_batch(tail.path(), batch));
    })
    .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "Tail cycle panicked");
    }
}

/// Watch the parent directory; the file itself may be deleted and recreated.
fn start_notifier(path: &Path, tx: mpsc::Sender<()>) -> Option<RecommendedWatcher> {
    let target: PathBuf = path.to_path_buf();
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty())?;

    let handler = move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let relevant = matches!(
                event.kind,
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
            ) && (event.paths.is_empty() || event.paths.iter().any(|p| p == &target));
            if relevant {
                let _ = tx.try_send(());
            }
        }
    };

    let mut watcher = match RecommendedWatcher::new(handler, Config::default()) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "File notifications unavailable, polling only");
            return None;
        }
    };
    if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
        tracing::warn!(path = %parent.display(), error = %e, "Failed to watch log directory, polling only");
        return None;
    }
    Some(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl LineSink for Collect {
        fn on_batch(&self, _path: &Path, batch: TailBatch) {
            self.0.lock().unwrap().extend(batch.lines);
        }
    }

    #[tokio::test]
    async fn test_timer_delivers_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakfu.log");
        std::fs::write(&path, b"").unwrap();

        let sink = Arc::new(Collect::default());
        let handle = spawn_watch(
            Arc::new(LogTail::new(&path)),
            sink.clone(),
            Duration::from_millis(20),
            false,
        );

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"hello\nworld\n").unwrap();
        drop(f);

        for _ in 0..100 {
            if sink.0.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.stop().await;
        assert_eq!(*sink.0.lock().unwrap(), vec!["hello", "world"]);
    }
}
