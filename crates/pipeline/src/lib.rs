//! Streaming speech pipeline.
//!
//! Converts a stream of short platform audio frames into voice-activity
//! packets, drives overlapping recognition windows per speaker against a
//! remote recognizer, and turns the re-uttered recognizer outputs into a
//! monotonic sequence of committed words:
//!
//! ingest → [`VadFramer`] → VAD verdict → [`SpeechProcessor`] (per speaker)
//! → recognizer → [`HypothesisBuffer`] → sink
//!
//! A [`SharedContext`] threads committed words from all speakers back into
//! each speaker's recognition requests as prompt and history.

mod config;
mod constants;
mod context;
mod framer;
mod hypothesis;
mod processor;
mod session;

pub use config::{ConfigError, PipelineConfig};
pub use constants::{MAX_AUDIO_SEC, SAMPLE_RATE};
pub use context::SharedContext;
pub use framer::{decode_pcm, AudioPacket, VadFramer};
pub use hypothesis::HypothesisBuffer;
pub use processor::SpeechProcessor;
pub use session::{MeetingEvent, MeetingSession, MIXED_SPEAKER};
