//! Command-line and environment configuration (§6.4).

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "relay-server", about = "Reverse-tunnel relay server")]
pub struct Args {
    /// Address to bind the HTTP/WebSocket listener to.
    #[arg(long, env = "HTTP_NETWORK_RELAY_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP/WebSocket listener to.
    #[arg(long, env = "HTTP_NETWORK_RELAY_SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Path to the JSON credentials file (§6.3).
    #[arg(
        long,
        env = "HTTP_NETWORK_RELAY_CREDENTIALS_FILE",
        default_value = "credentials.json"
    )]
    pub credentials_file: PathBuf,
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
