use clap::Parser;
use shared::{COLS, ROWS};

/// Claim grid server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// Number of grid rows
    #[arg(long, default_value_t = ROWS)]
    pub rows: usize,
    /// Number of grid columns
    #[arg(long, default_value_t = COLS)]
    pub cols: usize,
    /// Messages buffered per connection before further ones are dropped
    #[arg(long, default_value_t = 256)]
    pub outbound_buffer: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rows: ROWS,
            cols: COLS,
            outbound_buffer: 256,
        }
    }
}
