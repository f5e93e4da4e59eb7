//! WebSocket client for a remote voice-activity detector.
//!
//! One request per packet; responses are matched to requests by an opaque
//! id so a slow or chatty server cannot misattribute verdicts.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::{Result, VadError, VadVerdict, VoiceActivityDetector};

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct VadRequest {
    id: String,
    audio_base64: String,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct VadResponse {
    id: String,
    is_speech: bool,
    #[serde(default)]
    confidence: f32,
}

pub struct RemoteVad {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RemoteVad {
    /// Connect to the detector, retrying `attempts` times with `delay`
    /// between tries.
    pub async fn connect(url: &str, attempts: u32, delay: Duration) -> Result<Self> {
        let mut last_err = None;
        for attempt in 1..=attempts.max(1) {
            tracing::info!(url, attempt, "connecting to vad server");
            match connect_async(url).await {
                Ok((ws, _)) => {
                    tracing::info!(url, "vad connected");
                    return Ok(Self { ws });
                }
                Err(e) => {
                    tracing::warn!(url, attempt, error = %e, "vad connection failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(VadError::Connect(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    async fn next_text(&mut self) -> Result<String> {
        loop {
            let msg = tokio::time::timeout(RESPONSE_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| VadError::Timeout)?
                .ok_or(VadError::Closed)??;
            match msg {
                Message::Text(text) => return Ok(text),
                Message::Close(_) => return Err(VadError::Closed),
                // Pings are answered by tungstenite; skip everything else.
                _ => continue,
            }
        }
    }
}

#[async_trait::async_trait]
impl VoiceActivityDetector for RemoteVad {
    async fn predict(&mut self, samples: &[i16], sample_rate: u32) -> Result<VadVerdict> {
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            pcm.extend_from_slice(&s.to_le_bytes());
        }

        let id = Uuid::new_v4().to_string();
        let request = VadRequest {
            id: id.clone(),
            audio_base64: BASE64.encode(&pcm),
            sample_rate,
        };
        self.ws
            .send(Message::Text(serde_json::to_string(&request)?))
            .await?;

        loop {
            let text = self.next_text().await?;
            let response: VadResponse = serde_json::from_str(&text)?;
            if response.id != id {
                tracing::warn!(
                    expected = %id,
                    received = %response.id,
                    "discarding vad verdict for stale request"
                );
                continue;
            }
            return Ok(VadVerdict {
                is_speech: response.is_speech,
                confidence: response.confidence,
            });
        }
    }
}
