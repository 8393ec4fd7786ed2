//! WebSocket session between one participant and the server

use crate::identity_store::IdentityStore;
use crate::reconciler::{ClientGrid, LocalIdentity};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{now_millis, ClientMessage, DecodeError, ServerMessage};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    grid: ClientGrid,
    identity_store: Option<IdentityStore>,
    connected: bool,
}

impl Client {
    /// Connects and identifies, replaying a stored id when there is one
    pub async fn connect(
        url: &str,
        rows: usize,
        cols: usize,
        identity_store: Option<IdentityStore>,
    ) -> Result<Self, ClientError> {
        let stored = match identity_store.as_ref().map(IdentityStore::load) {
            Some(Ok(stored)) => stored,
            Some(Err(e)) => {
                warn!("Could not read stored identity: {}", e);
                None
            }
            None => None,
        };

        let identity = match &stored {
            Some(id) => LocalIdentity::provisional(id),
            None => LocalIdentity::generate(),
        };

        let (ws, _) = connect_async(url)
            .await
            .map_err(|source| ClientError::Connect {
                url: url.to_string(),
                source,
            })?;
        info!("Connected to {}", url);

        let mut client = Client {
            ws,
            grid: ClientGrid::new(rows, cols, identity),
            identity_store,
            connected: true,
        };

        client
            .send(&ClientMessage::Hello { user_id: stored })
            .await?;
        Ok(client)
    }

    pub fn grid(&self) -> &ClientGrid {
        &self.grid
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = message.to_json()?;
        self.ws.send(Message::text(text)).await?;
        Ok(())
    }

    /// Claims a cell optimistically and sends the claim
    ///
    /// Returns false without sending if the position is off the grid.
    pub async fn capture(&mut self, row: usize, col: usize) -> Result<bool, ClientError> {
        match self.grid.capture(row, col, now_millis()) {
            Some(message) => {
                self.send(&message).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Waits for the next server message and merges it into the local grid
    ///
    /// Returns `Ok(None)` once the connection has closed. Malformed and
    /// unknown messages are skipped.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(frame) = self.ws.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let message = match ServerMessage::decode(text.as_str()) {
                Ok(message) => message,
                Err(DecodeError::UnknownType(kind)) => {
                    debug!("Unknown message type {:?}", kind);
                    continue;
                }
                Err(e) => {
                    warn!("Malformed message from server: {}", e);
                    continue;
                }
            };

            if let ServerMessage::Hello(confirmation) = &message {
                info!("Identified as {} ({})", confirmation.id, confirmation.color);
                self.remember(&confirmation.id);
            }
            self.grid.apply_server_message(message.clone());
            return Ok(Some(message));
        }

        info!("Disconnected from server");
        self.connected = false;
        Ok(None)
    }

    fn remember(&self, id: &str) {
        if let Some(store) = &self.identity_store {
            if let Err(e) = store.save(id) {
                warn!("Could not persist identity to {}: {}", store.path().display(), e);
            }
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
