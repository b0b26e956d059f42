use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use streamclip_server::config::StorageConfig;
use streamclip_server::{clip_stats, sweep_old_clips};

fn test_storage(output_dir: &Path) -> StorageConfig {
    StorageConfig {
        video_dir: output_dir.join("channels"),
        output_dir: output_dir.to_path_buf(),
        segment_ext: "ts".to_string(),
        clip_ext: "mp4".to_string(),
        ffmpeg_path: "ffmpeg".into(),
        remux_timeout_secs: 60,
        max_concat_segments: 20,
    }
}

fn write_aged(dir: &Path, name: &str, age: Duration) {
    let path = dir.join(name);
    std::fs::write(&path, b"clip-bytes").unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_times(FileTimes::new().set_modified(SystemTime::now() - age))
        .unwrap();
}

#[tokio::test]
async fn test_sweep_deletes_only_expired_clips() {
    let dir = TempDir::new().unwrap();
    write_aged(dir.path(), "a24-20250905_234106_234406.mp4", Duration::from_secs(2 * 3600));
    write_aged(dir.path(), "a24-20250906_101500_101630.mp4", Duration::from_secs(30 * 60));
    // a crash-orphaned list file is not this sweep's concern
    write_aged(dir.path(), "list_0000.txt", Duration::from_secs(48 * 3600));

    let result = sweep_old_clips(&test_storage(dir.path()), 1).await;

    assert_eq!(result.count(), 1);
    assert_eq!(result.deleted, vec!["a24-20250905_234106_234406.mp4"]);
    assert_eq!(result.failed, 0);
    assert!(!dir.path().join("a24-20250905_234106_234406.mp4").exists());
    assert!(dir.path().join("a24-20250906_101500_101630.mp4").exists());
    assert!(dir.path().join("list_0000.txt").exists());
}

#[tokio::test]
async fn test_sweep_missing_directory_is_empty_result() {
    let dir = TempDir::new().unwrap();
    let storage = test_storage(&dir.path().join("does-not-exist"));

    let result = sweep_old_clips(&storage, 1).await;

    assert!(result.is_empty());
    assert_eq!(result.count(), 0);
}

#[tokio::test]
async fn test_sweep_keeps_fresh_clips() {
    let dir = TempDir::new().unwrap();
    write_aged(dir.path(), "a24-20250905_234106_234406.mp4", Duration::from_secs(60));

    let result = sweep_old_clips(&test_storage(dir.path()), 1).await;

    assert_eq!(result.count(), 0);
    assert!(dir.path().join("a24-20250905_234106_234406.mp4").exists());
}

#[tokio::test]
async fn test_clip_stats_counts_only_clips() {
    let dir = TempDir::new().unwrap();
    write_aged(dir.path(), "a24-20250905_234106_234406.mp4", Duration::from_secs(3600));
    write_aged(dir.path(), "a24-20250906_101500_101630.mp4", Duration::from_secs(60));
    write_aged(dir.path(), "list_0000.txt", Duration::from_secs(60));

    let stats = clip_stats(&test_storage(dir.path())).await;

    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_bytes, 20);
    let oldest = stats.oldest.unwrap();
    let newest = stats.newest.unwrap();
    assert!(oldest < newest);
}

#[tokio::test]
async fn test_clip_stats_empty_directory() {
    let dir = TempDir::new().unwrap();
    let stats = clip_stats(&test_storage(&dir.path().join("missing"))).await;
    assert_eq!(stats.count, 0);
    assert_eq!(stats.total_bytes, 0);
    assert!(stats.oldest.is_none());
}
