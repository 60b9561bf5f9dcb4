//! snapwatch - HTTP control plane for a supervised screen monitor.
//!
//! Runs in the foreground until SIGINT / SIGTERM. See `snapwatch --help`.

// Use mimalloc for better multi-core performance (especially important for musl builds)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use snapwatch::config::ServiceConfig;
use snapwatch::logging::{LogConfig, LogFormat, init_logging};

const AFTER_HELP: &str = "\
ENVIRONMENT:
  PORT                Listen port (default 3000)
  HOST                Bind address (default 0.0.0.0)
  SNAPWATCH_PYTHON    Interpreter used to run the monitor script
  RUST_LOG            Log filter, e.g. snapwatch=debug

EXAMPLES:
  snapwatch                               Serve on :3000 from snapwatch.toml
  snapwatch --port 8080 --root ./shots    Override port and snapshot root
  curl -X POST localhost:3000/start -d '{\"continuous\": true, \"interval\": 5}'";

#[derive(Parser)]
#[command(name = "snapwatch")]
#[command(version)]
#[command(about = "HTTP control plane for a supervised screen monitor")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Config file (default: ./snapwatch.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides PORT and the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides HOST and the config file)
    #[arg(long)]
    host: Option<String>,

    /// Snapshot root directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Monitor script passed to the interpreter
    #[arg(long)]
    script: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut ServiceConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(root) = self.root {
            config.snapshots.root = root;
        }
        if let Some(script) = self.script {
            config.monitor.script = script;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_logging(&LogConfig::default().format(cli.log_format).level(level));

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    snapwatch::http::serve(config).await
}
