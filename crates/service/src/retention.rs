//! Optional clean-up of old uploads and transcriptions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Deletes regular files in `dir` last modified more than `max_age` before `now`.
/// Returns how many were removed. Only a failure to list `dir` is an error; a file
/// that cannot be inspected or removed is logged and skipped.
pub fn sweep_dir(dir: &Path, max_age: Duration, now: SystemTime) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!(dir = %dir.display(), %err, "unreadable directory entry");
                continue;
            }
        };
        match expire(&path, max_age, now) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(err) => warn!(path = %path.display(), %err, "could not expire file"),
        }
    }
    Ok(removed)
}

/// Removes `path` if it is a regular file older than `max_age`. A file that
/// disappears mid-sweep counts as not removed.
fn expire(path: &Path, max_age: Duration, now: SystemTime) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if !metadata.is_file() {
        return Ok(false);
    }
    let age = metadata
        .modified()
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .unwrap_or_default();
    if age <= max_age {
        return Ok(false);
    }
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), ?age, "expired");
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn sweep_interval(max_age: Duration) -> Duration {
    max_age.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1))
}

/// Sweeps `dirs` on a fixed interval for the life of the runtime.
pub fn spawn_sweeper(dirs: Vec<PathBuf>, max_age: Duration) -> JoinHandle<()> {
    let period = sweep_interval(max_age);
    info!(?max_age, ?period, "retention sweeper started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let dirs = dirs.clone();
            let swept = tokio::task::spawn_blocking(move || {
                let now = SystemTime::now();
                dirs.iter()
                    .map(|dir| (dir.clone(), sweep_dir(dir, max_age, now)))
                    .collect::<Vec<_>>()
            })
            .await;
            match swept {
                Ok(results) => {
                    for (dir, result) in results {
                        match result {
                            Ok(0) => {}
                            Ok(count) => info!(dir = %dir.display(), count, "removed expired files"),
                            Err(err) => warn!(dir = %dir.display(), %err, "retention sweep failed"),
                        }
                    }
                }
                Err(err) => warn!(%err, "retention task panicked"),
            }
        }
    })
}
