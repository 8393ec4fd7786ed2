use std::io;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
