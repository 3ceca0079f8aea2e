//! Frame transport abstraction.
//!
//! The session actor only needs "open a duplex text channel to this URL".
//! [`WsConnector`] provides it over tokio-tungstenite; tests substitute an
//! in-memory connector.

use crate::error::TransportError;
use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Outgoing half of a connection: accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Incoming half of a connection: yields text frames until the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open duplex text channel.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections for the session actor.
pub trait Connector: Send + Sync + 'static {
    /// Starts connecting to `url`. The future resolves once the channel is
    /// open (or the attempt failed).
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>>;
}

/// WebSocket connector.
///
/// Only text frames are surfaced. Binary frames are ignored and
/// protocol-level ping/pong is answered by tungstenite itself. `wss://`
/// URLs go through rustls with the bundled webpki roots.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (sink, stream) = ws.split();

            let sink = sink
                .sink_map_err(TransportError::from)
                .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));

            let stream = stream.filter_map(|item| {
                future::ready(match item {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Peer sent close frame");
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                })
            });

            Ok(Connection {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory connector with a scriptable server side.

    use super::*;
    use futures::channel::mpsc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Server end of one accepted in-memory connection.
    pub struct ServerConn {
        pub url: String,
        to_client: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
        from_client: mpsc::UnboundedReceiver<String>,
    }

    impl ServerConn {
        pub fn send_json(&self, value: serde_json::Value) {
            if let Some(tx) = &self.to_client {
                let _ = tx.unbounded_send(Ok(value.to_string()));
            }
        }

        pub fn send_error(&self) {
            if let Some(tx) = &self.to_client {
                let _ = tx.unbounded_send(Err(TransportError::Closed));
            }
        }

        /// Next frame written by the client, or `None` once it hung up.
        pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
            let text = self.from_client.next().await?;
            serde_json::from_str(&text).ok()
        }

        /// Closes the server side; the client sees end of stream.
        pub fn close(&mut self) {
            self.to_client = None;
        }
    }

    /// Controls and observes a [`MemoryConnector`].
    pub struct MemoryServer {
        accepted: mpsc::UnboundedReceiver<ServerConn>,
        refuse: Arc<AtomicBool>,
        hang: Arc<AtomicBool>,
        attempts: Arc<Mutex<Vec<String>>>,
    }

    impl MemoryServer {
        pub async fn accept(&mut self) -> Option<ServerConn> {
            self.accepted.next().await
        }

        /// Makes every following connection attempt fail.
        pub fn refuse_connections(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }

        /// Makes every following connection attempt stay pending forever.
        pub fn hang_connections(&self, hang: bool) {
            self.hang.store(hang, Ordering::SeqCst);
        }

        /// URLs of every attempt so far, accepted or not.
        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
        }
    }

    pub struct MemoryConnector {
        accepted: mpsc::UnboundedSender<ServerConn>,
        refuse: Arc<AtomicBool>,
        hang: Arc<AtomicBool>,
        attempts: Arc<Mutex<Vec<String>>>,
    }

    pub fn pair() -> (MemoryConnector, MemoryServer) {
        let (tx, rx) = mpsc::unbounded();
        let refuse = Arc::new(AtomicBool::new(false));
        let hang = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(Mutex::new(Vec::new()));
        (
            MemoryConnector {
                accepted: tx,
                refuse: Arc::clone(&refuse),
                hang: Arc::clone(&hang),
                attempts: Arc::clone(&attempts),
            },
            MemoryServer {
                accepted: rx,
                refuse,
                hang,
                attempts,
            },
        )
    }

    impl Connector for MemoryConnector {
        fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>> {
            if let Ok(mut attempts) = self.attempts.lock() {
                attempts.push(url.to_string());
            }
            if self.hang.load(Ordering::SeqCst) {
                return Box::pin(future::pending());
            }
            if self.refuse.load(Ordering::SeqCst) {
                return Box::pin(future::ready(Err(TransportError::Closed)));
            }

            let (to_client, client_rx) = mpsc::unbounded();
            let (client_tx, from_client) = mpsc::unbounded::<String>();
            let _ = self.accepted.unbounded_send(ServerConn {
                url: url.to_string(),
                to_client: Some(to_client),
                from_client,
            });

            let connection = Connection {
                sink: Box::pin(client_tx.sink_map_err(|_| TransportError::Closed)),
                stream: Box::pin(client_rx),
            };
            Box::pin(future::ready(Ok(connection)))
        }
    }
}
