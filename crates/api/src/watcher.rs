//! Runbook file watcher.
//!
//! A polling task that notices mtime changes on the runbook file and
//! broadcasts them to `/api/watch` subscribers. This is strictly a
//! display concern: nothing here ever touches the executable registry,
//! so a changed file cannot widen what is runnable.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One file-change notification.
#[derive(Debug, Clone, Serialize)]
pub struct RunbookChange {
    pub path: String,
    pub changed_at: DateTime<Utc>,
}

/// Spawns the polling task and returns the broadcast handle subscribers
/// attach to. The task runs for the life of the process.
pub fn spawn(runbook_path: PathBuf) -> broadcast::Sender<RunbookChange> {
    let (tx, _) = broadcast::channel(16);
    let sender = tx.clone();

    tokio::spawn(async move {
        let mut last_modified = modified_time(&runbook_path);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let current = modified_time(&runbook_path);
            if current != last_modified {
                last_modified = current;
                tracing::info!(path = %runbook_path.display(), "runbook file changed");
                // No subscribers is fine.
                let _ = sender.send(RunbookChange {
                    path: runbook_path.display().to_string(),
                    changed_at: Utc::now(),
                });
            }
        }
    });

    tx
}

fn modified_time(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcasts_on_mtime_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runbook.mdx");
        std::fs::write(&path, "v1").expect("write");

        let tx = spawn(path.clone());
        let mut rx = tx.subscribe();

        // Wait past the first poll so the baseline mtime is recorded,
        // then touch the file with a clearly newer mtime.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        std::fs::write(&path, "v2").expect("rewrite");
        let newer = SystemTime::now() + Duration::from_secs(5);
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("open");
        file.set_modified(newer).expect("set mtime");

        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("change within poll window")
            .expect("broadcast alive");
        assert!(change.path.ends_with("runbook.mdx"));
    }
}
