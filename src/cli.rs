use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "streamclip")]
pub struct Cli {
    /// Port to run the server on
    #[arg(short = 'p', long, default_value_t = 3030)]
    pub port: u16,

    /// Root directory holding one sub-directory of segment files per channel
    #[arg(long, default_value = "channels")]
    pub video_dir: String,

    /// Directory where generated clips are written
    #[arg(long, default_value = "clips")]
    pub output_dir: String,

    /// Extension of recorded segment files
    #[arg(long, default_value = "ts")]
    pub segment_ext: String,

    /// Extension of generated clip artifacts
    #[arg(long, default_value = "mp4")]
    pub clip_ext: String,

    /// Path to the ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Kill the remux tool if it runs longer than this many seconds
    #[arg(long, default_value_t = 60)]
    pub remux_timeout_secs: u64,

    /// Maximum number of segments accepted per concatenation request
    #[arg(long, default_value_t = 20)]
    pub max_concat_segments: usize,

    /// Fixed UTC offset applied to timestamps that carry no offset,
    /// e.g. "-03:00". Never the host machine's local zone.
    #[arg(long, default_value = "-03:00")]
    pub fixed_offset: String,

    /// Assumed clip duration in seconds when no recorded segment covers
    /// the requested instant (grid-aligned fallback window)
    #[arg(long, default_value_t = 90)]
    pub fallback_clip_secs: i64,

    /// Maximum accepted clip duration in seconds
    #[arg(long, default_value_t = 300)]
    pub max_clip_secs: i64,

    /// Default number of neighboring segments returned on each side
    #[arg(long, default_value_t = 3)]
    pub default_radius: usize,

    /// Maximum number of neighboring segments per side
    #[arg(long, default_value_t = 10)]
    pub max_radius: usize,

    /// Transcript index base URL
    #[arg(long, env = "STREAMCLIP_INDEX_URL", default_value = "https://localhost:9200")]
    pub index_url: String,

    /// Transcript index name
    #[arg(long, default_value = "streaming_tv")]
    pub index_name: String,

    /// Transcript index user
    #[arg(long, env = "STREAMCLIP_INDEX_USER", default_value = "elastic")]
    pub index_user: String,

    /// Transcript index password
    #[arg(long, env = "STREAMCLIP_INDEX_PASSWORD", default_value = "")]
    pub index_password: String,

    /// Accept self-signed TLS certificates from the transcript index
    #[arg(long, default_value_t = false)]
    pub index_insecure_tls: bool,

    /// How far back phrase searches look, in hours
    #[arg(long, default_value_t = 24)]
    pub lookback_hours: i64,

    /// Maximum transcript hits returned per channel on phrase searches
    #[arg(long, default_value_t = 10)]
    pub per_channel_hits: usize,

    /// Delete generated clips older than this many hours (0 disables the sweeper)
    #[arg(long, default_value_t = 2)]
    pub retention_hours: u64,

    /// Seconds between background sweeps of the clip directory
    #[arg(long, default_value_t = 1800)]
    pub sweep_interval_secs: u64,

    /// Enable debug logging for streamclip modules
    #[arg(long)]
    pub debug: bool,
}
