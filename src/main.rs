//! prodigit: a concurrent digit-product query server
//!
//! Serves a newline-delimited text protocol over TCP: each request line
//! is an integer N, each response line is the smallest natural number
//! whose decimal digits multiply to N. A session ends when the client
//! sends `exit` or disconnects.

use prodigit::config::Config;
use prodigit::server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        workers = config.workers,
        grace_period = config.grace_period,
        "Starting prodigit server"
    );
    info!("Service: find the smallest number whose digit product equals N");

    let server = Server::bind(config)?;
    info!(addr = %server.local_addr()?, "Server listening");

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            handle.stop().await;
        }
    });

    server.serve().await;
    Ok(())
}
