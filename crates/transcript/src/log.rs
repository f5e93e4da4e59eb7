//! In-memory transcript log with rendering and persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TranscriptSink;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Output format for a saved transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    Text,
    Json,
}

impl Default for TranscriptFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl TranscriptFormat {
    fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub speaker_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub start: f64,
    pub end: f64,
}

/// Summary statistics for a transcript session.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptStats {
    pub total_segments: usize,
    pub unique_speakers: usize,
    pub total_words: usize,
    pub session_duration_secs: f64,
}

/// Ordered log of committed transcript entries for one session.
///
/// Speaker names arrive independently of commits (participant events), so the
/// id-to-name mapping is applied at render time rather than at insert time.
pub struct TranscriptLog {
    format: TranscriptFormat,
    echo: bool,
    entries: Vec<TranscriptEntry>,
    speaker_names: HashMap<String, String>,
    session_id: Option<String>,
    session_start: Option<DateTime<Utc>>,
}

impl TranscriptLog {
    pub fn new(format: TranscriptFormat, echo: bool) -> Self {
        Self {
            format,
            echo,
            entries: Vec::new(),
            speaker_names: HashMap::new(),
            session_id: None,
            session_start: None,
        }
    }

    /// Begin a new session, clearing any prior entries.
    pub fn start_session(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        tracing::info!(session_id = %session_id, "transcript session started");
        self.session_id = Some(session_id);
        self.session_start = Some(Utc::now());
        self.entries.clear();
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn speaker_label(&self, speaker_id: Option<&str>) -> String {
        match speaker_id {
            None => "Unknown".to_string(),
            Some(id) => self
                .speaker_names
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("Speaker {id}")),
        }
    }

    fn render_line(&self, entry: &TranscriptEntry) -> String {
        format!(
            "[{}] {}: {}",
            entry.timestamp.format("%H:%M:%S"),
            self.speaker_label(entry.speaker_id.as_deref()),
            entry.text
        )
    }

    pub fn render_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| self.render_line(e))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_json(&self) -> Result<String, TranscriptError> {
        #[derive(Serialize)]
        struct Document<'a> {
            session_id: Option<&'a String>,
            start_time: Option<&'a DateTime<Utc>>,
            speakers: &'a HashMap<String, String>,
            entries: &'a [TranscriptEntry],
        }

        let doc = Document {
            session_id: self.session_id.as_ref(),
            start_time: self.session_start.as_ref(),
            speakers: &self.speaker_names,
            entries: &self.entries,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Write the transcript into `dir` with a timestamped filename and
    /// return the path.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, TranscriptError> {
        std::fs::create_dir_all(dir.as_ref())?;

        let session = self.session_id.as_deref().unwrap_or("session");
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("transcript_{session}_{stamp}.{}", self.format.extension());
        let path = dir.as_ref().join(filename);

        let contents = match self.format {
            TranscriptFormat::Text => self.render_text(),
            TranscriptFormat::Json => self.render_json()?,
        };
        std::fs::write(&path, contents)?;

        tracing::info!(path = %path.display(), "transcript saved");
        Ok(path)
    }

    pub fn stats(&self) -> TranscriptStats {
        let unique_speakers = self
            .entries
            .iter()
            .filter_map(|e| e.speaker_id.as_deref())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let total_words = self
            .entries
            .iter()
            .map(|e| e.text.split_whitespace().count())
            .sum();
        let session_duration_secs = self
            .session_start
            .map(|s| (Utc::now() - s).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        TranscriptStats {
            total_segments: self.entries.len(),
            unique_speakers,
            total_words,
            session_duration_secs,
        }
    }
}

impl TranscriptSink for TranscriptLog {
    fn add(
        &mut self,
        text: &str,
        speaker_id: Option<&str>,
        timestamp: DateTime<Utc>,
        start: f64,
        end: f64,
    ) {
        let entry = TranscriptEntry {
            text: text.to_string(),
            speaker_id: speaker_id.map(str::to_string),
            timestamp,
            start,
            end,
        };

        if self.echo {
            println!("{}", self.render_line(&entry));
        }

        tracing::debug!(
            speaker = %self.speaker_label(speaker_id),
            start,
            end,
            text = %entry.text,
            "transcript entry added"
        );
        self.entries.push(entry);
    }

    fn set_speaker_name(&mut self, speaker_id: &str, name: &str) {
        tracing::debug!(speaker_id, name, "speaker name updated");
        self.speaker_names
            .insert(speaker_id.to_string(), name.to_string());
    }
}
