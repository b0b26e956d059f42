use std::path::PathBuf;

use chrono::FixedOffset;

use crate::cli::Cli;

/// Configuration for segment and clip storage
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub video_dir: PathBuf,
    pub output_dir: PathBuf,
    pub segment_ext: String,
    pub clip_ext: String,
    pub ffmpeg_path: PathBuf,
    pub remux_timeout_secs: u64,
    pub max_concat_segments: usize,
}

/// Configuration for temporal reasoning
#[derive(Debug, Clone)]
pub struct TimeConfig {
    /// Offset applied to naive timestamps and to filename-encoded times
    pub fixed_offset: FixedOffset,
    pub fallback_clip_secs: i64,
    pub max_clip_secs: i64,
}

/// Configuration for the external transcript index
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub url: String,
    pub index: String,
    pub username: String,
    pub password: String,
    pub accept_invalid_certs: bool,
    pub lookback_hours: i64,
    pub per_channel_hits: usize,
}

/// Configuration for the HTTP surface
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub default_radius: usize,
    pub max_radius: usize,
}

/// Configuration for clip retention
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub retention_hours: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub time: TimeConfig,
    pub index: IndexConfig,
    pub server: ServerConfig,
    pub retention: RetentionConfig,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let fixed_offset: FixedOffset = cli
            .fixed_offset
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid --fixed-offset {:?}: {}", cli.fixed_offset, e))?;

        Ok(Self {
            storage: StorageConfig {
                video_dir: PathBuf::from(&cli.video_dir),
                output_dir: PathBuf::from(&cli.output_dir),
                segment_ext: cli.segment_ext.clone(),
                clip_ext: cli.clip_ext.clone(),
                ffmpeg_path: PathBuf::from(&cli.ffmpeg_path),
                remux_timeout_secs: cli.remux_timeout_secs,
                max_concat_segments: cli.max_concat_segments,
            },
            time: TimeConfig {
                fixed_offset,
                fallback_clip_secs: cli.fallback_clip_secs.max(1),
                max_clip_secs: cli.max_clip_secs.max(1),
            },
            index: IndexConfig {
                url: cli.index_url.clone(),
                index: cli.index_name.clone(),
                username: cli.index_user.clone(),
                password: cli.index_password.clone(),
                accept_invalid_certs: cli.index_insecure_tls,
                lookback_hours: cli.lookback_hours,
                per_channel_hits: cli.per_channel_hits,
            },
            server: ServerConfig {
                port: cli.port,
                default_radius: cli.default_radius.max(1),
                max_radius: cli.max_radius.max(1),
            },
            retention: RetentionConfig {
                retention_hours: cli.retention_hours,
                sweep_interval_secs: cli.sweep_interval_secs.max(60),
            },
        })
    }
}
