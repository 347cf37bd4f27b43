use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use redis_viewer::core::config::{CliOverrides, load_config, resolve};
use redis_viewer::store::{DataSource, RedisSource};
use redis_viewer::tui;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "redis-viewer", about = "Browse a Redis keyspace from the terminal")]
struct Args {
    /// Config file (YAML, or TOML with a .toml extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Redis address (host:port) in standalone mode
    #[arg(short, long)]
    addr: Option<String>,

    /// Database index
    #[arg(short = 'n', long)]
    db: Option<i64>,

    /// Keys per page
    #[arg(short, long)]
    limit: Option<usize>,

    /// Where to write the log
    #[arg(long, default_value = "redis-viewer.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // The TUI owns the terminal, so logs go to a file.
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Ok(log_file) = File::create(&args.log_file) {
        let _ = WriteLogger::init(level, log_config, log_file);
    }

    info!("redis-viewer starting up");

    let file_config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            eprintln!("redis-viewer: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config = resolve(
        &file_config,
        &CliOverrides {
            addr: args.addr,
            db: args.db,
            limit: args.limit,
        },
    );

    let source: Arc<dyn DataSource> = match RedisSource::connect(&config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Connection failed: {}", e);
            eprintln!("redis-viewer: {e}");
            return ExitCode::FAILURE;
        }
    };

    match tui::run(source, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Terminal error: {}", e);
            eprintln!("redis-viewer: {e}");
            ExitCode::FAILURE
        }
    }
}
