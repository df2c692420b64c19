use anyhow::{Result, bail};
use clap::Parser;
use minisocks::{Socks5Server, auth::UserPass};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "A lightweight SOCKS5 proxy", long_about = None)]
struct Args {
    /// Listener address
    #[arg(short, long, default_value = "127.0.0.1:1080")]
    listen: String,

    /// Local source address for upstream connections
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Username for SOCKS5 proxy
    #[arg(short, long)]
    username: Option<String>,

    /// Password for SOCKS5 proxy
    #[arg(short, long)]
    password: Option<String>,

    /// How often idle relays check for shutdown, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    // Check for auth and grab it if present
    let auth = match (args.username, args.password) {
        (Some(u), Some(p)) => {
            info!("Authentication enabled");
            Some(UserPass {
                username: u,
                password: p,
            })
        }
        (None, None) => None,
        _ => bail!("[ERR] must provide both username and password (or neither)"),
    };

    // Instantiate server
    let mut server = Socks5Server::new(args.listen)
        .with_auth(auth)
        .with_bind_addr(args.bind)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));

    // Run it until interrupted
    info!("Starting SOCKS5 proxy: {}", server.listen_addr);
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for interrupt: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
}
