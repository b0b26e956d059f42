//! Retention sweeping of generated clips.
//!
//! The sweep never fails as a whole: an absent output directory is an
//! empty result and per-file problems are logged and skipped, so one
//! locked or vanished file cannot block cleanup of the rest.

use std::io::ErrorKind;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{RetentionConfig, StorageConfig};

/// What one sweep removed.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    pub deleted: Vec<String>,
    pub bytes_freed: u64,
    pub failed: u64,
}

impl SweepResult {
    pub fn count(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed == 0
    }
}

/// Statistics over the stored clips.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClipStats {
    pub count: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Delete clips whose mtime is older than `max_age_hours`.
///
/// Only files with the clip extension are considered; stray list files
/// and foreign files are left alone. Returns what was deleted for
/// observability.
pub async fn sweep_old_clips(storage: &StorageConfig, max_age_hours: u64) -> SweepResult {
    let mut result = SweepResult::default();

    let mut entries = match tokio::fs::read_dir(&storage.output_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("clip directory does not exist, nothing to sweep");
            return result;
        }
        Err(e) => {
            warn!(
                "failed to list clip directory {}: {}",
                storage.output_dir.display(),
                e
            );
            return result;
        }
    };

    let suffix = format!(".{}", storage.clip_ext);
    let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
    let now = SystemTime::now();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("failed to read clip directory entry: {}", e);
                break;
            }
        };
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.ends_with(&suffix) {
            continue;
        }

        // the file may be deleted by a concurrent sweep or request
        // between listing and stat; that is not a failure
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("skipping {} (vanished mid-sweep?): {}", name, e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!("deleted clip {} ({} bytes)", name, metadata.len());
                result.bytes_freed += metadata.len();
                result.deleted.push(name.to_string());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("failed to delete clip {}: {}", name, e);
                result.failed += 1;
            }
        }
    }

    if !result.is_empty() {
        info!(
            "sweep removed {} clips ({:.2} MB freed, {} failures)",
            result.count(),
            result.bytes_freed as f64 / 1024.0 / 1024.0,
            result.failed
        );
    }

    result
}

/// Count and size the stored clips.
pub async fn clip_stats(storage: &StorageConfig) -> ClipStats {
    let mut stats = ClipStats::default();

    let mut entries = match tokio::fs::read_dir(&storage.output_dir).await {
        Ok(entries) => entries,
        Err(_) => return stats,
    };

    let suffix = format!(".{}", storage.clip_ext);
    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.ends_with(&suffix) {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        stats.count += 1;
        stats.total_bytes += metadata.len();
        if let Ok(modified) = metadata.modified() {
            let modified: DateTime<Utc> = modified.into();
            stats.oldest = Some(stats.oldest.map_or(modified, |t| t.min(modified)));
            stats.newest = Some(stats.newest.map_or(modified, |t| t.max(modified)));
        }
    }

    stats
}

/// Start the periodic background sweep.
pub fn start_background_sweeper(storage: StorageConfig, retention: RetentionConfig) {
    if retention.retention_hours == 0 {
        info!("background clip sweeper disabled: retention is 0 (keep all clips)");
        return;
    }

    info!(
        "starting background clip sweeper (retention: {}h, every {}s)",
        retention.retention_hours, retention.sweep_interval_secs
    );

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(retention.sweep_interval_secs));
        loop {
            interval.tick().await;
            let result = sweep_old_clips(&storage, retention.retention_hours).await;
            if result.is_empty() {
                debug!("scheduled sweep found nothing to delete");
            } else if result.failed > 0 {
                error!(
                    "scheduled sweep: {} deleted, {} failed",
                    result.count(),
                    result.failed
                );
            }
        }
    });
}
