//! Voice-activity predicates for fixed-size audio packets.
//!
//! The pipeline only needs a binary speech/silence decision per packet. Two
//! implementations are provided: a local RMS-energy gate and a client for a
//! remote detector reached over WebSocket.

mod energy;
mod remote;

pub use energy::EnergyVad;
pub use remote::RemoteVad;

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection closed")]
    Closed,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("timed out waiting for verdict")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, VadError>;

/// Outcome of scoring one audio packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadVerdict {
    pub is_speech: bool,
    pub confidence: f32,
}

/// Binary speech detector over fixed-duration packets.
///
/// Implementations may hold network connections, hence `&mut self`.
#[async_trait::async_trait]
pub trait VoiceActivityDetector: Send {
    async fn predict(&mut self, samples: &[i16], sample_rate: u32) -> Result<VadVerdict>;
}
