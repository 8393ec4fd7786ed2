//! Server network layer handling WebSocket connections and the event loop

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::{Hub, HubEvent};
use crate::registry::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{now_millis, ClientMessage, DecodeError};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Body returned to plain HTTP requests
pub const STATUS_BODY: &str = "Claim grid WebSocket server is running.";

const REQUEST_HEAD_LIMIT: usize = 4096;
const HEAD_PEEK_ATTEMPTS: usize = 50;
const HEAD_PEEK_INTERVAL: Duration = Duration::from_millis(10);

/// Main server coordinating connections and the shared grid
pub struct Server {
    listener: TcpListener,
    hub: Hub,
    outbound_buffer: usize,
    next_connection_id: u64,

    // Connection tasks -> event loop
    event_tx: mpsc::UnboundedSender<HubEvent>,
    event_rx: mpsc::UnboundedReceiver<HubEvent>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let hub = Hub::new(config.rows, config.cols);
        info!(
            "Server listening on {} ({}x{} grid)",
            listener.local_addr()?,
            hub.grid().rows(),
            hub.grid().cols()
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            hub,
            outbound_buffer: config.outbound_buffer.max(1),
            next_connection_id: 1,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections and applies their events until the task is dropped
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                Some(event) = self.event_rx.recv() => {
                    self.hub.handle_event(event, now_millis());
                },
            }
        }
    }

    fn spawn_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        let events = self.event_tx.clone();
        let buffer = self.outbound_buffer;
        tokio::spawn(async move {
            match is_websocket_upgrade(&stream).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Answering plain HTTP request from {}", addr);
                    if let Err(e) = respond_status(stream).await {
                        debug!("Status reply to {} failed: {}", addr, e);
                    }
                    return;
                }
                Err(e) => {
                    debug!("Could not read request from {}: {}", addr, e);
                    return;
                }
            }

            match accept(stream).await {
                Ok(ws) => serve_connection(ws, id, addr, events, buffer).await,
                Err(e) => warn!("Connection from {} rejected: {}", addr, e),
            }
        });
    }
}

/// Peeks at the request head, without consuming it, to tell WebSocket
/// upgrades apart from plain HTTP requests such as health checks.
async fn is_websocket_upgrade(stream: &TcpStream) -> io::Result<bool> {
    let mut buf = [0u8; REQUEST_HEAD_LIMIT];
    let mut seen = 0;

    for _ in 0..HEAD_PEEK_ATTEMPTS {
        seen = stream.peek(&mut buf).await?;
        if seen == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let head = &buf[..seen];
        if seen == buf.len() || head.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        sleep(HEAD_PEEK_INTERVAL).await;
    }

    Ok(has_upgrade_header(&buf[..seen]))
}

fn has_upgrade_header(head: &[u8]) -> bool {
    String::from_utf8_lossy(head).lines().any(|line| {
        line.split_once(':').map_or(false, |(name, value)| {
            name.trim().eq_ignore_ascii_case("upgrade")
                && value.trim().eq_ignore_ascii_case("websocket")
        })
    })
}

async fn respond_status(mut stream: TcpStream) -> io::Result<()> {
    // Drain the request so closing does not reset the connection.
    let mut buf = [0u8; REQUEST_HEAD_LIMIT];
    let _ = stream.read(&mut buf).await?;

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        STATUS_BODY.len(),
        STATUS_BODY
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

async fn accept(stream: TcpStream) -> Result<WebSocketStream<TcpStream>, ServerError> {
    Ok(accept_async(stream).await?)
}

/// Runs one connection: a writer task drains its outbound queue while this
/// task reads frames and forwards decoded messages to the event loop.
///
/// `Connected` is always forwarded before the first message and
/// `Disconnected` after the last, so the hub sees a well-ordered lifetime.
async fn serve_connection(
    ws: WebSocketStream<TcpStream>,
    id: ConnectionId,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<HubEvent>,
    buffer: usize,
) {
    let (mut write, mut read) = ws.split();
    let (sender, mut outbound) = mpsc::channel::<Message>(buffer);

    if events
        .send(HubEvent::Connected { id, addr, sender })
        .is_err()
    {
        return;
    }

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = write.send(frame).await {
                debug!("Write to connection {} failed: {}", id, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientMessage::decode(text.as_str()) {
                    Ok(message) => {
                        if events.send(HubEvent::Message { id, message }).is_err() {
                            break;
                        }
                    }
                    Err(DecodeError::UnknownType(kind)) => {
                        debug!("Unknown message type {:?} from connection {}", kind, id);
                    }
                    Err(e) => {
                        warn!("Received malformed message from connection {}, ignoring: {}", id, e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read from connection {} failed: {}", id, e);
                    break;
                }
            },

            // Writer gone means the transport is gone.
            _ = &mut writer => break,
        }
    }

    let _ = events.send(HubEvent::Disconnected { id });
}
