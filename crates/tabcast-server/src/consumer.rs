//! Consumer endpoint — accepts relay connections, validates the handshake,
//! drains encoded chunks, and logs relay diagnostics.

use futures_util::StreamExt;
use tabcast_protocol::HANDSHAKE;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 8080;

/// Totals for one relay connection.
#[derive(Debug, Default)]
pub struct RelayStats {
    pub chunks: u64,
    pub bytes: u64,
}

/// Accept relay connections forever, one task per connection.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("consumer listening on 0.0.0.0:{}", port);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("relay connected from {}", peer);
        tokio::spawn(async move {
            match handle_relay(stream).await {
                Ok(stats) => info!(
                    "relay from {} done: {} chunks, {} bytes",
                    peer, stats.chunks, stats.bytes
                ),
                Err(e) => warn!("relay from {} failed: {}", peer, e),
            }
        });
    }
}

/// Drive one relay connection to completion.
///
/// The first frame must be the literal handshake string; anything else is
/// a protocol violation and the connection is dropped. After that, binary
/// frames are encoded chunks and text frames are diagnostics.
pub async fn handle_relay(stream: TcpStream) -> anyhow::Result<RelayStats> {
    let mut ws = accept_async(stream).await?;

    match ws.next().await {
        Some(Ok(Message::Text(text))) if text == HANDSHAKE => {
            debug!("handshake accepted");
        }
        Some(Ok(other)) => {
            anyhow::bail!("protocol violation: expected handshake, got {:?}", other);
        }
        Some(Err(e)) => return Err(e.into()),
        None => anyhow::bail!("connection closed before handshake"),
    }

    let mut stats = RelayStats::default();
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Binary(data) => {
                if data.is_empty() {
                    warn!("empty chunk on the wire");
                    continue;
                }
                stats.chunks += 1;
                stats.bytes += data.len() as u64;
            }
            Message::Text(report) => info!("relay report: {}", report),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;

    type RelaySide = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<TcpStream>,
    >;

    /// Pair a relay-side client with a `handle_relay` future over loopback.
    async fn connected_pair() -> (
        tokio::task::JoinHandle<anyhow::Result<RelayStats>>,
        RelaySide,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            handle_relay(stream).await
        });
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        (server, ws)
    }

    #[tokio::test]
    async fn test_handshake_then_chunks() {
        let (server, mut relay) = connected_pair().await;
        relay
            .send(Message::Text(HANDSHAKE.to_string()))
            .await
            .unwrap();
        relay.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
        relay.send(Message::Binary(vec![4])).await.unwrap();
        relay.close(None).await.unwrap();

        let stats = server.await.unwrap().unwrap();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.bytes, 4);
    }

    #[tokio::test]
    async fn test_rejects_bad_handshake() {
        let (server, mut relay) = connected_pair().await;
        relay
            .send(Message::Text("not the handshake".into()))
            .await
            .unwrap();

        let err = server.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("protocol violation"));
    }

    #[tokio::test]
    async fn test_diagnostics_not_counted_as_chunks() {
        let (server, mut relay) = connected_pair().await;
        relay
            .send(Message::Text(HANDSHAKE.to_string()))
            .await
            .unwrap();
        relay
            .send(Message::Text("encoder error: fault".into()))
            .await
            .unwrap();
        relay.send(Message::Binary(vec![9; 10])).await.unwrap();
        relay.close(None).await.unwrap();

        let stats = server.await.unwrap().unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.bytes, 10);
    }
}
