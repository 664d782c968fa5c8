//! Mockd - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use mockd::loader;
use mockd::server::Server;
use mockd::store::MockStore;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mockd",
    about = "Standalone HTTP mock server - file-loaded and API-registered mock definitions",
    version
)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on (falls back to the PORT environment variable, then 3000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory of JSON mock definitions loaded at startup
    #[arg(short, long, default_value = "mappings")]
    mappings: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Validate the mappings directory and exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(3000)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = Arc::new(MockStore::new());

    // Validate the mappings and exit if requested
    if args.validate {
        if !args.mappings.exists() {
            anyhow::bail!("Mappings directory not found: {:?}", args.mappings);
        }
        let loaded = loader::load_dir(&store, &args.mappings)?;
        println!("Mappings are valid ({} mock definitions loaded)", loaded);
        return Ok(());
    }

    // Load mock definitions from disk
    if args.mappings.exists() {
        info!(path = ?args.mappings, "Loading mock definitions");
        let loaded = loader::load_dir(&store, &args.mappings)?;
        info!(loaded, "Mock definitions loaded");
    } else {
        info!("No mappings directory, starting with an empty store");
    }

    let addr = SocketAddr::new(args.host, args.port());
    let server = Server::bind(addr, store).await?;
    server.run().await
}
