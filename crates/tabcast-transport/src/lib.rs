//! WebSocket transport — one persistent, ordered, bidirectional connection
//! per session.
//!
//! A single [`Connection::open`] call handles URL building, the TCP and
//! WebSocket handshakes, and the reader task. Outbound sends go through the
//! owned write half; inbound frames are pumped into the owner's event
//! channel in arrival order. Close is idempotent.

use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tabcast_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Concrete WebSocket stream type (avoids repeating the generic everywhere).
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Inbound payload from the consumer, forwarded verbatim to the page
/// surface. Never interpreted here.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Text(String),
    Binary(Bytes),
}

/// Events surfaced by the connection's reader task, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// A message arrived from the consumer.
    Inbound(InboundMessage),
    /// The peer closed the connection or the read side failed.
    Disconnected { reason: Option<String> },
}

/// One session's connection to the consumer endpoint.
pub struct Connection {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl Connection {
    /// Establish a connection to `url` (e.g. `ws://localhost:9222`),
    /// suspending until the socket reaches the open state or fails.
    ///
    /// The open is bounded by `connect_timeout`; inbound frames are
    /// delivered to `events` for the lifetime of the connection.
    pub async fn open(
        url: &str,
        connect_timeout: Duration,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Connection> {
        let connect = tokio_tungstenite::connect_async(url);
        let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| Error::Timeout("transport open"))?
            .map_err(|e| Error::Connect(e.to_string()))?;

        info!("transport open: {}", url);
        let (sink, stream) = ws_stream.split();
        let reader = tokio::spawn(read_loop(stream, events));

        Ok(Connection {
            sink,
            reader,
            closed: false,
        })
    }

    /// Send a UTF-8 text frame (handshake, diagnostics).
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(Error::SendOnClosed);
        }
        self.sink
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    /// Send one encoded chunk as a binary frame.
    pub async fn send_chunk(&mut self, chunk: Bytes) -> Result<()> {
        if self.closed {
            return Err(Error::SendOnClosed);
        }
        self.sink
            .send(Message::Binary(chunk.to_vec()))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    /// Close the connection, releasing the socket. Idempotent: the first
    /// call sends a close frame, later calls are no-ops.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!("close frame not delivered: {}", e);
        }
        if let Err(e) = self.sink.close().await {
            debug!("sink close: {}", e);
        }
        info!("transport closed");
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Pump inbound frames into the owner's event channel until the stream
/// ends. Ordering is preserved; ping/pong frames are handled by the
/// protocol layer and skipped here.
async fn read_loop(mut stream: SplitStream<WsStream>, events: mpsc::Sender<TransportEvent>) {
    while let Some(msg) = stream.next().await {
        let event = match msg {
            Ok(Message::Text(text)) => TransportEvent::Inbound(InboundMessage::Text(text)),
            Ok(Message::Binary(data)) => {
                TransportEvent::Inbound(InboundMessage::Binary(Bytes::from(data)))
            }
            Ok(Message::Close(frame)) => {
                let reason = frame.map(|f| f.reason.to_string());
                let _ = events.send(TransportEvent::Disconnected { reason }).await;
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("transport read error: {}", e);
                let _ = events
                    .send(TransportEvent::Disconnected {
                        reason: Some(e.to_string()),
                    })
                    .await;
                return;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    let _ = events.send(TransportEvent::Disconnected { reason: None }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Accept one WebSocket connection and return its frames until close.
    async fn accept_one(listener: TcpListener) -> Vec<Message> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut frames = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            frames.push(msg);
        }
        frames
    }

    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_send_ordering() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(accept_one(listener));

        let (tx, _rx) = mpsc::channel(8);
        let mut conn = Connection::open(&url, TIMEOUT, tx).await.unwrap();
        conn.send_text("hello from extension").await.unwrap();
        conn.send_chunk(Bytes::from_static(b"\x01\x02")).await.unwrap();
        conn.send_chunk(Bytes::from_static(b"\x03")).await.unwrap();
        conn.close().await;

        let frames = server.await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], Message::Text("hello from extension".into()));
        assert_eq!(frames[1], Message::Binary(vec![1, 2]));
        assert_eq!(frames[2], Message::Binary(vec![3]));
    }

    #[tokio::test]
    async fn test_send_on_closed() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(accept_one(listener));

        let (tx, _rx) = mpsc::channel(8);
        let mut conn = Connection::open(&url, TIMEOUT, tx).await.unwrap();
        conn.close().await;
        assert!(matches!(
            conn.send_text("late").await,
            Err(Error::SendOnClosed)
        ));
        assert!(matches!(
            conn.send_chunk(Bytes::from_static(b"x")).await,
            Err(Error::SendOnClosed)
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_idempotent() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(accept_one(listener));

        let (tx, _rx) = mpsc::channel(8);
        let mut conn = Connection::open(&url, TIMEOUT, tx).await.unwrap();
        conn.close().await;
        conn.close().await;
        conn.close().await;
        assert!(conn.is_closed());

        // The server saw no frame besides the single close.
        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_order_preserved() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text("one".into())).await.unwrap();
            ws.send(Message::Binary(vec![2])).await.unwrap();
            ws.send(Message::Text("three".into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let (tx, mut rx) = mpsc::channel(8);
        let _conn = Connection::open(&url, TIMEOUT, tx).await.unwrap();
        server.await.unwrap();

        let mut inbound = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::Inbound(msg) => inbound.push(msg),
                TransportEvent::Disconnected { .. } => break,
            }
        }
        assert_eq!(
            inbound,
            vec![
                InboundMessage::Text("one".into()),
                InboundMessage::Binary(Bytes::from_static(&[2])),
                InboundMessage::Text("three".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with no listener.
        let (listener, url) = local_listener().await;
        drop(listener);

        let (tx, _rx) = mpsc::channel(8);
        let result = Connection::open(&url, TIMEOUT, tx).await;
        assert!(matches!(result, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        // A TCP listener that never answers the WebSocket handshake.
        let (listener, url) = local_listener().await;

        let (tx, _rx) = mpsc::channel(8);
        let result = Connection::open(&url, Duration::from_millis(100), tx).await;
        assert!(matches!(result, Err(Error::Timeout("transport open"))));
        drop(listener);
    }
}
