use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use loglens::app::App;
use loglens::config::ViewerConfig;
use loglens::recent::RecentFiles;
use loglens::server::start_server;

#[derive(Parser)]
#[command(name = "loglens")]
#[command(about = "A fast viewer for very large log files")]
struct Args {
    /// File to open on startup; `host:/path` reads over ssh
    file: Option<String>,

    /// TOML file with viewer settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// First port to try for the command server
    #[arg(long)]
    port: Option<u16>,

    /// Lines fetched beyond each edge of the viewport
    #[arg(long)]
    overscan: Option<u64>,

    /// Maximum lines per fetch
    #[arg(long)]
    batch_cap: Option<u64>,

    /// Estimated rows per line
    #[arg(long)]
    line_height: Option<u32>,

    /// Viewport height in rows
    #[arg(long)]
    viewport_height: Option<u32>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn resolve_config(&self) -> loglens::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(overscan) = self.overscan {
            config.overscan = overscan;
        }
        if let Some(batch_cap) = self.batch_cap {
            config.batch_cap = batch_cap;
        }
        if let Some(line_height) = self.line_height {
            config.line_height = line_height;
        }
        if let Some(viewport_height) = self.viewport_height {
            config.viewport_height = viewport_height;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("loglens: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    let recent = match config.recent_files_store() {
        Some(store) => RecentFiles::load(store),
        None => RecentFiles::in_memory(),
    };

    let port = config.port;
    let mut app = App::new(config, recent);

    if let Some(file) = &args.file {
        // Keep serving; another file can be opened over the command port.
        if let Err(e) = app.open(file) {
            error!(path = %file, "failed to open file: {}", e);
        }
    }

    match start_server(port, app.sender()) {
        Ok((_handle, actual_port)) => info!(port = actual_port, "ready"),
        Err(e) => {
            error!("failed to start command server: {}", e);
            return ExitCode::FAILURE;
        }
    }

    app.run();
    ExitCode::SUCCESS
}
