//! Pipeline configuration and startup validation.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_AUDIO_SEC, SAMPLE_RATE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sample rate must be 16000 Hz, got {0}")]
    UnsupportedSampleRate(u32),
    #[error("vad packet duration must be positive, got {0} ms")]
    InvalidVadPacket(u32),
    #[error("stride must be positive and shorter than 30 s, got {0}")]
    InvalidStride(f64),
    #[error("silence timeout must be positive, got {0}")]
    InvalidSilenceTimeout(f64),
    #[error("pre-speech buffer must be non-negative, got {0}")]
    InvalidPreSpeech(f64),
    #[error("history size must be positive")]
    InvalidHistorySize,
}

/// Tunables for one meeting's pipeline.
///
/// A violated constraint is fatal: [`PipelineConfig::validate`] runs before
/// any audio is accepted and refuses to start the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    /// Duration of one voice-activity packet.
    pub vad_packet_ms: u32,
    /// One processor per speaker instead of a single mixed stream.
    pub per_speaker: bool,
    /// Minimum interval between two recognizer calls during sustained speech.
    pub stride_sec: f64,
    /// Silence needed before a speech segment is considered finished.
    pub silence_timeout_sec: f64,
    /// Left-margin audio prepended at speech start.
    pub pre_speech_sec: f64,
    /// Bound on the shared conversation sentence history.
    pub history_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE as u32,
            vad_packet_ms: 100,
            per_speaker: false,
            stride_sec: 5.0,
            silence_timeout_sec: 1.0,
            pre_speech_sec: 1.0,
            history_size: 30,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate != SAMPLE_RATE as u32 {
            return Err(ConfigError::UnsupportedSampleRate(self.sample_rate));
        }
        if self.vad_packet_ms == 0 {
            return Err(ConfigError::InvalidVadPacket(self.vad_packet_ms));
        }
        if !(self.stride_sec > 0.0 && self.stride_sec < MAX_AUDIO_SEC) {
            return Err(ConfigError::InvalidStride(self.stride_sec));
        }
        if self.silence_timeout_sec <= 0.0 {
            return Err(ConfigError::InvalidSilenceTimeout(self.silence_timeout_sec));
        }
        if self.pre_speech_sec < 0.0 {
            return Err(ConfigError::InvalidPreSpeech(self.pre_speech_sec));
        }
        if self.history_size == 0 {
            return Err(ConfigError::InvalidHistorySize);
        }
        Ok(())
    }

    /// Buffer duration beyond which the audio window is trimmed back to a
    /// committed word boundary.
    pub fn trim_threshold_sec(&self) -> f64 {
        MAX_AUDIO_SEC - self.stride_sec
    }
}
