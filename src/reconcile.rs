//! Clip window resolution.
//!
//! The accurate path derives a window from the real boundaries of the
//! recorded segment containing the instant. When no segment covers it
//! (channel outage, missing directory) the window falls back to a
//! grid-aligned guess of fixed duration. The two strategies are never
//! mixed within one response; the chosen one is recorded in the window
//! so responses stay debuggable.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::error::{ClipError, ClipResult};

/// Which strategy produced a clip window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    /// Ground truth from the containing segment's `[start, end)`
    SegmentBoundaries,
    /// Degraded-accuracy fallback aligned to an assumed recording grid
    FixedGrid,
}

/// A half-open `[start, end)` time window for one clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub source: WindowSource,
}

/// Derive the exact window of the segment containing `instant`.
///
/// Returns `Ok(None)` both when the channel directory is missing and
/// when no segment covers the instant; callers fall back to the fixed
/// grid in either case. Other IO failures propagate.
pub async fn reconcile(
    storage: &StorageConfig,
    zone: FixedOffset,
    channel: &str,
    instant: DateTime<FixedOffset>,
) -> ClipResult<Option<ClipWindow>> {
    let catalog = match Catalog::build(storage, zone, channel).await {
        Ok(catalog) => catalog,
        Err(ClipError::ChannelNotFound(_)) => {
            debug!("channel directory missing for {}, cannot reconcile", channel);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    Ok(catalog.locate(instant).map(|(_, segment)| ClipWindow {
        start: segment.start,
        end: segment.end,
        source: WindowSource::SegmentBoundaries,
    }))
}

/// Grid-aligned fallback window: the start is the instant's epoch
/// second floored to a multiple of `duration_secs` (not centered on the
/// instant), the end one duration later.
pub fn fixed_grid_window(instant: DateTime<FixedOffset>, duration_secs: i64) -> ClipWindow {
    let epoch = instant.timestamp();
    let rem = epoch.rem_euclid(duration_secs);
    let start = instant
        - Duration::seconds(rem)
        - Duration::nanoseconds(i64::from(instant.timestamp_subsec_nanos()));
    ClipWindow {
        start,
        end: start + Duration::seconds(duration_secs),
        source: WindowSource::FixedGrid,
    }
}

/// Pick exactly one window strategy for this request: segment
/// boundaries when a recorded segment covers the instant, the fixed
/// grid otherwise. The degraded path is a valid outcome, never an
/// error.
pub async fn resolve_window(
    storage: &StorageConfig,
    zone: FixedOffset,
    channel: &str,
    instant: DateTime<FixedOffset>,
    fallback_secs: i64,
) -> ClipResult<ClipWindow> {
    if let Some(window) = reconcile(storage, zone, channel, instant).await? {
        debug!(
            "window for {} at {} from segment boundaries: [{}, {})",
            channel, instant, window.start, window.end
        );
        return Ok(window);
    }

    let window = fixed_grid_window(instant, fallback_secs);
    debug!(
        "no covering segment for {} at {}, using {}s grid window [{}, {})",
        channel, instant, fallback_secs, window.start, window.end
    );
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn test_grid_window_is_aligned_not_centered() {
        let window = fixed_grid_window(at("2025-01-01T00:01:00Z"), 90);
        assert_eq!(window.start, at("2025-01-01T00:00:00Z"));
        assert_eq!(window.end, at("2025-01-01T00:01:30Z"));
        assert_eq!(window.source, WindowSource::FixedGrid);
    }

    #[test]
    fn test_grid_window_on_grid_boundary() {
        let window = fixed_grid_window(at("2025-01-01T00:03:00Z"), 90);
        assert_eq!(window.start, at("2025-01-01T00:03:00Z"));
        assert_eq!(window.end, at("2025-01-01T00:04:30Z"));
    }

    #[test]
    fn test_grid_window_drops_subsecond_part() {
        let window = fixed_grid_window(at("2025-01-01T00:01:00.750Z"), 90);
        assert_eq!(window.start, at("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_grid_window_keeps_offset() {
        let window = fixed_grid_window(at("2025-01-01T00:01:00-03:00"), 90);
        assert_eq!(window.start, at("2025-01-01T00:00:00-03:00"));
        assert_eq!(window.end - window.start, Duration::seconds(90));
    }
}
