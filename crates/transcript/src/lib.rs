use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod log;

pub use log::{TranscriptError, TranscriptFormat, TranscriptLog, TranscriptStats};

/// A recognized word with absolute timing in seconds.
///
/// Words are immutable once committed: the pipeline never retracts or edits
/// a word after it has been handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// A committed word together with the speaker that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedWord {
    pub word: Word,
    pub speaker_id: Option<String>,
}

/// Sink for committed transcription output.
///
/// Implemented by the output layer, allowing the pipeline to remain
/// decoupled from formatting and persistence. Implementations handle their
/// own I/O failures; a commit is never retried.
pub trait TranscriptSink: Send {
    /// Record a committed span of text. `start` and `end` are seconds on the
    /// meeting clock; `timestamp` is the wall-clock instant of the commit.
    fn add(
        &mut self,
        text: &str,
        speaker_id: Option<&str>,
        timestamp: DateTime<Utc>,
        start: f64,
        end: f64,
    );

    /// Update the display name for a speaker id.
    fn set_speaker_name(&mut self, speaker_id: &str, name: &str);
}
