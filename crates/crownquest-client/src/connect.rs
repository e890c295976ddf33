//! WebSocket plumbing between a [`ClientSession`] and the relay.

use crownquest_protocol::{ClientEvent, Codec, Envelope, JsonCodec, Payload, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::{ClientSession, SyncConfig, SyncError};

/// Opens a WebSocket to `url` and returns a session wired to it.
///
/// Two tasks pump frames: one encodes outgoing requests with increasing
/// sequence numbers, the other decodes server pushes into the session's
/// inbox. Dropping the session closes the socket.
pub async fn connect(url: &str, config: SyncConfig) -> Result<ClientSession, SyncError> {
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| SyncError::Connect(Box::new(e)))?;
    tracing::info!(%url, "connected");
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientEvent>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerEvent>();

    tokio::spawn(async move {
        let codec = JsonCodec;
        let mut seq = 0u64;
        while let Some(event) = out_rx.recv().await {
            seq += 1;
            let text = match codec.encode(&Envelope::client(seq, event)).map(String::from_utf8) {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "encoded frame is not UTF-8");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode request");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                tracing::debug!(error = %e, "send failed, closing writer");
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        let codec = JsonCodec;
        while let Some(frame) = stream.next().await {
            let msg = match frame {
                Ok(msg) if msg.is_text() || msg.is_binary() => msg,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "receive failed");
                    break;
                }
            };
            match codec.decode::<Envelope>(&msg.into_data()) {
                Ok(Envelope { payload: Payload::Server(event), .. }) => {
                    if in_tx.send(event).is_err() {
                        break;
                    }
                }
                Ok(_) => tracing::debug!("ignoring non-server payload"),
                Err(e) => tracing::warn!(error = %e, "undecodable frame"),
            }
        }
        tracing::debug!("server stream ended");
    });

    Ok(ClientSession::new(out_tx, in_rx, config))
}
