//! turnstile: A multi-threaded TCP message server
//!
//! Clients send fixed-size messages which are appended to a shared log
//! file and acknowledged. Connections are served by a fixed pool of
//! worker threads fed from a single queue.
//!
//! Features:
//! - Idle timeout that disconnects silent clients
//! - Per-turn message cap that requeues chatty clients so every
//!   connection gets a share of the workers
//! - Configuration via CLI arguments or TOML file

mod config;
mod connection;
mod message_log;
mod protocol;
mod queue;
mod server;
mod session;
mod worker;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
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
        host = %config.host,
        port = config.port,
        threads = config.threads,
        timeout = config.timeout,
        max_continuous_msgs = config.max_continuous_msgs,
        file = %config.file.display(),
        "Starting turnstile server"
    );

    let server = Server::bind(config)?;
    server.run()?;
    Ok(())
}
