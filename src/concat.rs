//! Concatenation engine.
//!
//! Stitches an ordered run of segment files into one artifact with a
//! lossless stream copy. The external tool needs an intermediate list
//! file; that list is a scoped resource, removed on every exit path.
//! All inputs are validated before the tool is spawned so a doomed
//! request leaves no partial temp state behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::segment_name_parts;
use crate::config::StorageConfig;
use crate::error::{ClipError, ClipResult};
use crate::validation::validate_file_name;

/// A generated output clip. Write-once: never mutated after creation,
/// owned by the retention sweeper from then on.
#[derive(Debug, Clone)]
pub struct ClipArtifact {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Concatenate `segments` of `channel` into one clip artifact.
///
/// Validation order matters: empty input, name sanity and on-disk
/// existence are all checked before any temp state exists or the
/// external tool is invoked. The tool performs a stream copy only.
pub async fn concatenate(
    storage: &StorageConfig,
    channel: &str,
    segments: &[String],
) -> ClipResult<ClipArtifact> {
    if segments.is_empty() {
        return Err(ClipError::EmptyInput);
    }

    let channel_dir = storage.video_dir.join(channel);
    let mut inputs = Vec::with_capacity(segments.len());
    for name in segments {
        validate_file_name(name)?;
        let path = channel_dir.join(name);
        // canonicalize doubles as the existence check and gives the
        // absolute paths the concat list syntax requires
        let resolved = match tokio::fs::canonicalize(&path).await {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ClipError::SegmentNotFound(name.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        inputs.push(resolved);
    }

    tokio::fs::create_dir_all(&storage.output_dir).await?;

    let clip_id = Uuid::new_v4();
    let file_name = clip_file_name(storage, channel, segments, clip_id);
    let output_path = storage.output_dir.join(&file_name);

    let list = ConcatList::write(&storage.output_dir, clip_id, &inputs).await?;

    let mut command = Command::new(&storage.ffmpeg_path);
    command
        .arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg(list.path())
        .arg("-c")
        .arg("copy")
        .arg("-y")
        .arg(&output_path);
    run_remux_tool(command, storage.remux_timeout_secs, &output_path).await?;
    drop(list);

    let metadata = tokio::fs::metadata(&output_path).await?;
    info!(
        "concatenated {} segments of {} into {} ({} bytes)",
        segments.len(),
        channel,
        file_name,
        metadata.len()
    );

    Ok(ClipArtifact {
        file_name,
        path: output_path,
        size_bytes: metadata.len(),
        modified: metadata.modified()?.into(),
    })
}

/// Remux one segment into the clip container for browser playback.
///
/// The result is cached in the output directory and reused until the
/// source segment's mtime is newer than the cached copy.
pub async fn remux_segment(
    storage: &StorageConfig,
    channel: &str,
    segment_name: &str,
) -> ClipResult<PathBuf> {
    validate_file_name(segment_name)?;
    let source = storage.video_dir.join(channel).join(segment_name);
    let source = match tokio::fs::canonicalize(&source).await {
        Ok(source) => source,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ClipError::SegmentNotFound(segment_name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    tokio::fs::create_dir_all(&storage.output_dir).await?;

    let stem = segment_name
        .strip_suffix(&format!(".{}", storage.segment_ext))
        .unwrap_or(segment_name);
    let target = storage
        .output_dir
        .join(format!("temp_{}.{}", stem, storage.clip_ext));

    if let (Ok(src_meta), Ok(dst_meta)) = (
        tokio::fs::metadata(&source).await,
        tokio::fs::metadata(&target).await,
    ) {
        if let (Ok(src_modified), Ok(dst_modified)) = (src_meta.modified(), dst_meta.modified()) {
            if dst_modified >= src_modified {
                debug!("reusing cached remux {}", target.display());
                return Ok(target);
            }
        }
    }

    let mut command = Command::new(&storage.ffmpeg_path);
    command
        .arg("-i")
        .arg(&source)
        .arg("-c")
        .arg("copy")
        .arg("-f")
        .arg(&storage.clip_ext)
        .arg("-y")
        .arg(&target);
    run_remux_tool(command, storage.remux_timeout_secs, &target).await?;

    Ok(target)
}

/// Descriptive artifact name from the first segment's start components
/// and the last segment's end time, with a random-id fallback when the
/// segment names cannot be parsed.
fn clip_file_name(
    storage: &StorageConfig,
    channel: &str,
    segments: &[String],
    clip_id: Uuid,
) -> String {
    let first = segments.first().and_then(|n| segment_name_parts(n, &storage.segment_ext));
    let last = segments.last().and_then(|n| segment_name_parts(n, &storage.segment_ext));
    match (first, last) {
        (Some((_, start_date, start_time, _, _)), Some((_, _, _, _, end_time))) => format!(
            "{}-{}_{}_{}.{}",
            channel, start_date, start_time, end_time, storage.clip_ext
        ),
        _ => format!("clip_{}.{}", clip_id, storage.clip_ext),
    }
}

/// Run the external remux tool with a bounded wait.
///
/// Non-zero exit surfaces the tool's stderr verbatim; on timeout the
/// process is killed. A partial output file is removed on both failure
/// paths.
async fn run_remux_tool(
    mut command: Command,
    timeout_secs: u64,
    output_path: &Path,
) -> ClipResult<()> {
    command.stdout(Stdio::null()).stderr(Stdio::piped());
    debug!("remux command: {:?}", command);

    let mut child = command.spawn()?;
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut diagnostics = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut diagnostics).await;
        }
        diagnostics
    });

    let status = match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            let _ = child.kill().await;
            remove_partial(output_path).await;
            return Err(ClipError::RemuxTimeout(timeout_secs));
        }
    };

    let diagnostics = stderr_task.await.unwrap_or_default();
    if !status.success() {
        remove_partial(output_path).await;
        return Err(ClipError::ConcatenationFailed(
            diagnostics.trim().to_string(),
        ));
    }

    Ok(())
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("failed to remove partial output {}: {}", path.display(), e);
        }
    }
}

/// The intermediate concat list. Removal is tied to drop so the file
/// goes away on every exit path, success or failure.
struct ConcatList {
    path: PathBuf,
}

impl ConcatList {
    async fn write(output_dir: &Path, clip_id: Uuid, inputs: &[PathBuf]) -> ClipResult<Self> {
        let path = output_dir.join(format!("list_{}.txt", clip_id));
        let mut body = String::new();
        for input in inputs {
            body.push_str(&format!("file '{}'\n", input.display()));
        }
        tokio::fs::write(&path, body).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConcatList {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("failed to remove concat list {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StorageConfig {
        StorageConfig {
            video_dir: PathBuf::from("channels"),
            output_dir: PathBuf::from("clips"),
            segment_ext: "ts".to_string(),
            clip_ext: "mp4".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            remux_timeout_secs: 60,
            max_concat_segments: 20,
        }
    }

    #[test]
    fn test_clip_name_from_first_and_last_segment() {
        let segments = vec![
            "a24_20250905_234106_20250905_234236.ts".to_string(),
            "a24_20250905_234236_20250905_234406.ts".to_string(),
        ];
        let name = clip_file_name(&storage(), "a24", &segments, Uuid::nil());
        assert_eq!(name, "a24-20250905_234106_234406.mp4");
    }

    #[test]
    fn test_clip_name_falls_back_to_random_id() {
        let segments = vec!["not-a-segment.ts".to_string()];
        let name = clip_file_name(&storage(), "a24", &segments, Uuid::nil());
        assert_eq!(
            name,
            format!("clip_{}.mp4", Uuid::nil())
        );
    }
}
