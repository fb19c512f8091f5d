use super::{WebSocketChannel, WebSocketConnector};
use crate::error::RpcError;
use crate::network::node::RadixNode;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

const DEFAULT_BUFFER: usize = 256;

/// WebSocket transport over `tokio-tungstenite`. Each connection gets a
/// writer task and a reader task bridging frames to channels.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    buffer: usize,
}

impl TungsteniteConnector {
    pub fn new() -> Self {
        TungsteniteConnector {
            buffer: DEFAULT_BUFFER,
        }
    }

    pub fn with_buffer(buffer: usize) -> Self {
        TungsteniteConnector {
            buffer: buffer.max(1),
        }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSocketConnector for TungsteniteConnector {
    async fn connect(&self, node: &RadixNode) -> Result<WebSocketChannel, RpcError> {
        let url = node.websocket_url();
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RpcError::ConnectionFailed(format!("{url}: {e}")))?;
        debug!(url = %url, "WebSocket opened");
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::channel::<String>(self.buffer);
        let (incoming_tx, incoming) = mpsc::channel::<String>(self.buffer);

        let writer_url = url.clone();
        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!(url = %writer_url, error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
            debug!(url = %writer_url, "WebSocket writer finished");
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!(url = %url, "Dropping non UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(url = %url, error = %e, "WebSocket read failed");
                        break;
                    }
                };
                if incoming_tx.send(text).await.is_err() {
                    break;
                }
            }
            debug!(url = %url, "WebSocket reader finished");
        });

        Ok(WebSocketChannel { outgoing, incoming })
    }
}
