//! Remote speech recognizer interface and wire types.
//!
//! The recognizer receives a window of float audio plus conversation context
//! and returns word-timed segments. Times in a response are relative to the
//! start of the submitted audio; the caller adds its own offset.

mod http;

use serde::{Deserialize, Serialize};

pub use http::HttpRecognizer;

#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, RecognizerError>;

/// One recognition request over a window of audio.
pub struct RecognizeRequest<'a> {
    /// Mono float samples in `[-1.0, 1.0]`.
    pub audio: &'a [f32],
    pub sample_rate: u32,
    /// Committed conversation text used as the decoder prefix.
    pub prompt: String,
    /// Recent conversation sentences, oldest first.
    pub sent_history: Vec<String>,
    pub speaker_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizerWord {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizerSegment {
    #[serde(default)]
    pub words: Vec<RecognizerWord>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub no_speech_prob: f32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub segments: Vec<RecognizerSegment>,
}

/// Client for a remote speech recognizer.
///
/// Implementations must not retry indefinitely: on failure the pipeline
/// proceeds with an empty response and the recognition window is
/// re-attempted at the next stride.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    async fn transcribe(&self, request: RecognizeRequest<'_>) -> Result<RecognizeResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_defaults_tolerate_sparse_json() {
        let response: RecognizeResponse =
            serde_json::from_str(r#"{"segments":[{"text":"hi"}]}"#).unwrap();
        assert_eq!(response.segments.len(), 1);
        assert!(response.segments[0].words.is_empty());
        assert_eq!(response.segments[0].no_speech_prob, 0.0);
    }

    #[test]
    fn test_word_times_parse() {
        let response: RecognizeResponse = serde_json::from_str(
            r#"{"segments":[{"words":[{"start":0.0,"end":0.5,"text":"hello"}],"text":"hello","no_speech_prob":0.1}]}"#,
        )
        .unwrap();
        let word = &response.segments[0].words[0];
        assert_eq!(word.text, "hello");
        assert_eq!(word.end, 0.5);
    }
}
