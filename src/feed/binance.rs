use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::decode::{decode_snapshot, decode_stream_message};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::protocol::{FeedEvent, FeedItem, Snapshot};

/// REST snapshot plus WebSocket diff stream for one symbol.
///
/// The snapshot is requested only after the first diff arrives, so the socket
/// is already buffering when the snapshot cursor is fixed. Events are forwarded
/// in arrival order: the snapshot first, then every diff including the one that
/// triggered the fetch. Any transport problem ends the run; there is no
/// reconnect here because a new connection needs a fresh snapshot and engine.
pub struct BinanceDepthFeed {
    snapshot_url: String,
    stream_url: Url,
    stream_name: String,
    client: reqwest::Client,
}

impl BinanceDepthFeed {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let stream_url = Url::parse(&config.stream_url())
            .map_err(|e| Error::Config(format!("invalid stream url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            snapshot_url: config.snapshot_url(),
            stream_url,
            stream_name: config.stream_name(),
            client,
        })
    }

    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let resp = self
            .client
            .get(&self.snapshot_url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("snapshot request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("snapshot body read failed: {e}")))?;
        if !status.is_success() {
            // Prefer the venue's own error message when it sent one.
            return match decode_snapshot(&body) {
                Err(err @ Error::Transport(_)) => Err(err),
                _ => Err(Error::Transport(format!("snapshot request returned {status}"))),
            };
        }
        decode_snapshot(&body)
    }

    /// Streams until the connection fails or the receiver goes away. A failure
    /// is delivered on the channel as the last item.
    pub async fn run(self, tx: mpsc::Sender<FeedItem>) {
        match self.stream(&tx).await {
            Ok(()) => info!("Feed receiver closed; stopping transport"),
            Err(e) => {
                error!("Feed failed: {}", e);
                let _ = tx.send(Err(e)).await;
            }
        }
    }

    async fn stream(&self, tx: &mpsc::Sender<FeedItem>) -> Result<()> {
        info!("Connecting to {}", self.stream_url);
        let (mut ws_stream, _) = connect_async(self.stream_url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("failed to connect: {e}")))?;
        info!("Connected.");

        let subscribe = serde_json::json!({
            "method": "SUBSCRIBE",
            "params": [self.stream_name],
            "id": 1,
        });
        ws_stream
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| Error::Transport(format!("subscribe failed: {e}")))?;

        let mut snapshot_sent = false;
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let Some(event) = decode_stream_message(text.as_bytes())? else {
                        continue;
                    };
                    if !snapshot_sent {
                        let snapshot = self.fetch_snapshot().await?;
                        info!(
                            "Snapshot fetched at lastUpdateId={} (first diff U={})",
                            snapshot.last_update_id, event.first_update_id
                        );
                        if tx.send(Ok(FeedEvent::Snapshot(snapshot))).await.is_err() {
                            return Ok(());
                        }
                        snapshot_sent = true;
                    }
                    if tx.send(Ok(FeedEvent::Diff(event))).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(Message::Ping(ping)) => {
                    if let Err(e) = ws_stream.send(Message::Pong(ping)).await {
                        warn!("Failed to answer ping: {}", e);
                    }
                }
                Ok(Message::Close(frame)) => {
                    return Err(Error::Transport(format!("closed by server: {frame:?}")));
                }
                Ok(_) => {}
                Err(e) => return Err(Error::Transport(format!("websocket error: {e}"))),
            }
        }
        Err(Error::Transport("stream ended".to_string()))
    }
}
