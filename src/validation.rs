//! Input validation for names that end up in filesystem paths.

use crate::error::{ClipError, ClipResult};

/// Reject channel identifiers that could escape the video root.
pub fn validate_channel_name(channel: &str) -> ClipResult<()> {
    if channel.is_empty() || has_traversal(channel) {
        return Err(ClipError::InvalidName(channel.to_string()));
    }
    Ok(())
}

/// Reject file names that could escape their directory.
pub fn validate_file_name(name: &str) -> ClipResult<()> {
    if name.is_empty() || has_traversal(name) {
        return Err(ClipError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn has_traversal(value: &str) -> bool {
    value.contains("..") || value.contains('/') || value.contains('\\')
}
