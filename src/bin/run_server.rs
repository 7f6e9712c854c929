use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use funko_db::config::Config;
use funko_db::logging::init_logging;
use funko_db::{server, Result};

/// Serves per-user Funko collections over TCP.
#[derive(Parser, Debug)]
#[command(name = "run_server", version)]
struct Cli {
    /// Address to listen on [env: FUNKO_ADDR] [default: 127.0.0.1:60300]
    #[arg(long)]
    addr: Option<String>,

    /// Directory holding one sub-directory per user [env: FUNKO_DATA_DIR] [default: data]
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let config = Config::from_env().with_overrides(cli.addr, cli.data_dir);

    let listener = TcpListener::bind(&config.addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    server::run(listener, config.data_dir, signal::ctrl_c()).await;

    Ok(())
}
