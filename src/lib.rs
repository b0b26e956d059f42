pub mod catalog;
pub mod cleanup;
pub mod cli;
pub mod concat;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod server;
pub mod time_utils;
pub mod transcripts;
pub mod validation;

pub use catalog::{parse_segment_name, Catalog, Segment};
pub use cleanup::{clip_stats, start_background_sweeper, sweep_old_clips, ClipStats, SweepResult};
pub use concat::{concatenate, remux_segment, ClipArtifact};
pub use config::Config;
pub use error::{ClipError, ClipResult};
pub use reconcile::{fixed_grid_window, reconcile, resolve_window, ClipWindow, WindowSource};
pub use server::{create_router, AppState, Server};
pub use time_utils::{format_timestamp_for_query, parse_timestamp};
pub use transcripts::{transcript_for_clip, ElasticIndex, Transcription, TranscriptIndex};
