//! Error types for clip operations.

use thiserror::Error;

/// Result type for clip operations.
pub type ClipResult<T> = Result<T, ClipError>;

/// Errors that can occur while locating, stitching or serving clips.
///
/// "No segment covers this instant" is deliberately NOT a variant: an
/// uncovered instant is a valid empty outcome and is modeled as `None`
/// by the locator and the reconciler.
#[derive(Error, Debug)]
pub enum ClipError {
    /// Input was empty or not parseable as an extended ISO-8601 timestamp
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// The channel directory does not exist (distinct from "no matching segment")
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// A concatenation request carried no segment names
    #[error("no segments to concatenate")]
    EmptyInput,

    /// A channel or segment name carried path separators or traversal
    /// components
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A referenced segment file is missing on disk
    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    /// The remux tool exited non-zero; carries its diagnostic output
    #[error("concatenation failed: {0}")]
    ConcatenationFailed(String),

    /// The remux tool exceeded the bounded wait and was killed
    #[error("remux tool timed out after {0}s")]
    RemuxTimeout(u64),

    /// Transcript index request failed
    #[error("transcript index error: {0}")]
    Index(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClipError {
    fn from(err: reqwest::Error) -> Self {
        ClipError::Index(err.to_string())
    }
}

impl From<serde_json::Error> for ClipError {
    fn from(err: serde_json::Error) -> Self {
        ClipError::Index(format!("bad index payload: {}", err))
    }
}
