use std::{fs, net::SocketAddr, path::Path, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use streamclip_server::{
    cli::Cli, cleanup::start_background_sweeper, AppState, Config, ElasticIndex, Server,
};

fn setup_logging(log_dir: &Path, cli: &Cli) -> Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("streamclip")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let env_filter = if cli.debug {
        env_filter.add_directive("streamclip_server=debug".parse()?)
    } else {
        env_filter
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    fs::create_dir_all(&config.storage.output_dir)?;
    let log_dir = config.storage.output_dir.join("logs");
    fs::create_dir_all(&log_dir)?;
    let _guard = setup_logging(&log_dir, &cli)?;

    info!(
        "video root: {}, clip output: {}",
        config.storage.video_dir.display(),
        config.storage.output_dir.display()
    );

    let index = ElasticIndex::new(config.index.clone(), config.time.fixed_offset)?;

    start_background_sweeper(config.storage.clone(), config.retention.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = Arc::new(AppState {
        config,
        index: Arc::new(index),
    });

    Server::new(state, addr).start().await?;
    Ok(())
}
