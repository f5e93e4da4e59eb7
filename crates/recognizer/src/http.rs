//! HTTP adapter for the remote recognizer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::{RecognizeRequest, RecognizeResponse, Recognizer, RecognizerError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct TranscribeBody {
    audio_base64: String,
    sample_rate: u32,
    prompt: String,
    recog_sent_history: Vec<String>,
    speaker_id: Option<String>,
}

/// Recognizer reached via a single JSON POST per window.
pub struct HttpRecognizer {
    client: reqwest::Client,
    url: String,
    /// Malformed-JSON responses are logged once per session, not per stride.
    logged_malformed: AtomicBool,
}

impl HttpRecognizer {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            logged_malformed: AtomicBool::new(false),
        })
    }

    fn encode_audio(audio: &[f32]) -> String {
        let mut bytes = Vec::with_capacity(audio.len() * 4);
        for &sample in audio {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        BASE64.encode(&bytes)
    }
}

#[async_trait::async_trait]
impl Recognizer for HttpRecognizer {
    async fn transcribe(&self, request: RecognizeRequest<'_>) -> Result<RecognizeResponse> {
        let body = TranscribeBody {
            audio_base64: Self::encode_audio(request.audio),
            sample_rate: request.sample_rate,
            prompt: request.prompt,
            recog_sent_history: request.sent_history,
            speaker_id: request.speaker_id,
        };

        tracing::debug!(
            url = %self.url,
            samples = request.audio.len(),
            prompt_len = body.prompt.len(),
            "sending recognition request"
        );

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecognizerError::Status(status));
        }

        let text = response.text().await?;
        match serde_json::from_str(&text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                if !self.logged_malformed.swap(true, Ordering::Relaxed) {
                    tracing::warn!(error = %e, "recognizer returned malformed json");
                }
                Err(RecognizerError::MalformedResponse(e.to_string()))
            }
        }
    }
}
