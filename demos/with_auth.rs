//! SOCKS5 server with username/password authentication example

use minisocks::{Socks5Server, auth::UserPass};
use std::net::{IpAddr, Ipv4Addr};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let auth = UserPass {
        username: "<user>".to_string(),
        password: "<pass>".to_string(),
    };

    // Upstream connections leave from the loopback address
    let mut server = Socks5Server::new("127.0.0.1:1080")
        .with_auth(Some(auth))
        .with_bind_addr(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
