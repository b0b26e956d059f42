//! Per-channel segment catalog.
//!
//! Segment boundaries come from filename metadata, not file contents:
//! `{channel}_{YYYYMMDD}_{HHMMSS}_{YYYYMMDD}_{HHMMSS}.{ext}`. A catalog
//! is built fresh per request, sorted by parsed start time, and queried
//! with half-open interval containment.

use std::io::ErrorKind;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::error::{ClipError, ClipResult};

/// One recorded chunk of a channel's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Segment {
    /// Half-open containment: the end boundary is exclusive, so two
    /// adjacent segments never both claim the same instant.
    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// The parsed, ordered segments of one channel at query time.
#[derive(Debug, Clone)]
pub struct Catalog {
    channel: String,
    segments: Vec<Segment>,
}

impl Catalog {
    /// List and parse the segment files of `channel`.
    ///
    /// Fails with `ChannelNotFound` only when the channel directory is
    /// absent; unparsable or foreign file names are skipped, never
    /// fatal. Entries are sorted by parsed start time rather than by
    /// raw name, so ordering does not depend on the fixed-width
    /// filename encoding.
    pub async fn build(
        storage: &StorageConfig,
        zone: FixedOffset,
        channel: &str,
    ) -> ClipResult<Self> {
        let dir = storage.video_dir.join(channel);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ClipError::ChannelNotFound(channel.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let suffix = format!(".{}", storage.segment_ext);
        let mut segments = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to read entry in {}: {}", dir.display(), e);
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
            match parse_segment_name(name, &storage.segment_ext, zone) {
                Some(segment) => segments.push(segment),
                None => debug!("skipping unparsable segment name: {}", name),
            }
        }

        segments.sort_by(|a, b| a.start.cmp(&b.start));
        debug!("built catalog for {}: {} segments", channel, segments.len());

        Ok(Self {
            channel: channel.to_string(),
            segments,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Find the segment containing `instant`, with its index.
    ///
    /// Binary search over the sorted starts, then a backward walk over
    /// the containing run so overlapping entries resolve to the same
    /// segment a linear scan would return. `None` means the instant
    /// falls in a blind spot; callers treat it as an empty result, not
    /// an error.
    pub fn locate(&self, instant: DateTime<FixedOffset>) -> Option<(usize, &Segment)> {
        let upper = self.segments.partition_point(|s| s.start <= instant);
        let mut found = None;
        for idx in (0..upper).rev() {
            if self.segments[idx].contains(instant) {
                found = Some(idx);
            } else {
                break;
            }
        }
        found.map(|idx| (idx, &self.segments[idx]))
    }

    /// The contiguous neighborhood of `index`, clamped at both catalog
    /// ends: requesting more neighbors than exist yields fewer results,
    /// never padding and never an error.
    pub fn neighbors(&self, index: usize, radius: usize) -> &[Segment] {
        let lo = index.saturating_sub(radius);
        let hi = (index + radius + 1).min(self.segments.len());
        &self.segments[lo..hi]
    }
}

/// Split a segment file name into its five underscore-delimited
/// components once the extension is stripped. Any other shape is
/// unparsable.
pub fn segment_name_parts<'a>(
    name: &'a str,
    ext: &str,
) -> Option<(&'a str, &'a str, &'a str, &'a str, &'a str)> {
    let stem = name.strip_suffix(&format!(".{}", ext))?;
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        &[channel, start_date, start_time, end_date, end_time] => {
            Some((channel, start_date, start_time, end_date, end_time))
        }
        _ => None,
    }
}

/// Parse one segment file name into a `Segment`, requiring start < end.
pub fn parse_segment_name(name: &str, ext: &str, zone: FixedOffset) -> Option<Segment> {
    let (_, start_date, start_time, end_date, end_time) = segment_name_parts(name, ext)?;
    let start = parse_compact(start_date, start_time, zone)?;
    let end = parse_compact(end_date, end_time, zone)?;
    if start >= end {
        return None;
    }
    Some(Segment {
        name: name.to_string(),
        start,
        end,
    })
}

fn parse_compact(date: &str, time: &str, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H%M%S").ok()?;
    NaiveDateTime::new(date, time).and_local_timezone(zone).single()
}
