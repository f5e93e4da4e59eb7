use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use meetscribe_pipeline::PipelineConfig;
use meetscribe_transcript::TranscriptFormat;

/// Application configuration: pipeline tunables plus service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,

    /// Remote recognizer endpoint (JSON POST per window).
    pub recognizer_url: String,
    pub recognizer_timeout_secs: u64,

    /// Remote VAD websocket; the local energy gate is used when unset.
    pub vad_url: Option<String>,
    pub vad_threshold: f32,

    pub output_dir: PathBuf,
    pub output_format: TranscriptFormat,
    pub record_audio: bool,

    /// Deadline for the final flush at shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            recognizer_url: "http://127.0.0.1:9000/transcribe".to_string(),
            recognizer_timeout_secs: 30,
            vad_url: None,
            vad_threshold: 0.004,
            output_dir: PathBuf::from("output"),
            output_format: TranscriptFormat::Text,
            record_audio: false,
            shutdown_grace_secs: 5,
        }
    }
}

impl Config {
    /// Load config from a JSON file, or fall back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }
}
