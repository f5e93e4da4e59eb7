//! Meeting orchestration: platform ingest to per-speaker processors.
//!
//! One session per meeting, driven by a single task. Audio frames go
//! through the framer; every emitted packet is VAD-scored and handed to the
//! owning speaker's processor; commits flow to the sink in production
//! order. All speaker state is mutated on this task only.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;

use meetscribe_recognizer::Recognizer;
use meetscribe_recorder::SessionRecorder;
use meetscribe_transcript::{TranscriptSink, Word};
use meetscribe_vad::{VadVerdict, VoiceActivityDetector};

use crate::config::{ConfigError, PipelineConfig};
use crate::context::SharedContext;
use crate::framer::{decode_pcm, AudioPacket, VadFramer};
use crate::processor::SpeechProcessor;

/// Pseudo speaker id keying the single processor in mixed mode.
pub const MIXED_SPEAKER: &str = "__mixed__";

/// Inputs a meeting session consumes, in arrival order.
#[derive(Debug)]
pub enum MeetingEvent {
    Audio {
        /// Little-endian signed 16-bit mono PCM.
        pcm: Vec<u8>,
        speaker_id: Option<String>,
        /// Seconds on the meeting clock.
        timestamp: f64,
    },
    ParticipantJoined {
        speaker_id: String,
        speaker_name: String,
    },
    Ended,
}

/// Wires ingest, framing, VAD, per-speaker recognition, and the sink for
/// one meeting.
pub struct MeetingSession<S: TranscriptSink> {
    config: PipelineConfig,
    framer: VadFramer,
    shared: Arc<Mutex<SharedContext>>,
    processors: HashMap<String, SpeechProcessor>,
    vad: Box<dyn VoiceActivityDetector>,
    recognizer: Arc<dyn Recognizer>,
    sink: S,
    recorder: Option<SessionRecorder>,
}

impl<S: TranscriptSink> MeetingSession<S> {
    /// Validates the configuration; a violation refuses to start.
    pub fn new(
        config: PipelineConfig,
        vad: Box<dyn VoiceActivityDetector>,
        recognizer: Arc<dyn Recognizer>,
        sink: S,
        recorder: Option<SessionRecorder>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let framer = VadFramer::new(config.sample_rate, config.vad_packet_ms, config.per_speaker);
        let shared = Arc::new(Mutex::new(SharedContext::new(config.history_size)));
        Ok(Self {
            config,
            framer,
            shared,
            processors: HashMap::new(),
            vad,
            recognizer,
            sink,
            recorder,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Ingest one platform audio frame.
    pub async fn on_audio(&mut self, pcm: &[u8], speaker_id: Option<&str>, timestamp: f64) {
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.is_recording() {
                let track = speaker_id.unwrap_or("mixed");
                if let Err(e) = recorder.append(track, &decode_pcm(pcm)) {
                    tracing::warn!(speaker_id = track, error = %e, "recording failed");
                }
            }
        }

        let packets = self.framer.push(pcm, timestamp, speaker_id);
        for packet in packets {
            self.process_packet(packet).await;
        }
    }

    /// Forward a participant-name update to the sink.
    pub fn on_participant(&mut self, speaker_id: &str, speaker_name: &str) {
        self.sink.set_speaker_name(speaker_id, speaker_name);
    }

    async fn process_packet(&mut self, packet: AudioPacket) {
        let verdict = match self.vad.predict(&packet.samples, packet.sample_rate).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "vad failed, treating packet as silence");
                VadVerdict {
                    is_speech: false,
                    confidence: 0.0,
                }
            }
        };

        let key = packet
            .speaker_id
            .clone()
            .unwrap_or_else(|| MIXED_SPEAKER.to_string());
        let processor = match self.processors.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!(speaker_id = %entry.key(), "speech processor created");
                entry.insert(SpeechProcessor::new(
                    packet.speaker_id.clone(),
                    &self.config,
                    Arc::clone(&self.recognizer),
                    Arc::clone(&self.shared),
                ))
            }
        };

        let samples: Vec<f32> = packet
            .samples
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect();
        let commits = processor
            .on_vad(verdict.is_speech, &samples, packet.timestamp)
            .await;
        self.forward(commits, packet.speaker_id.as_deref());
    }

    fn forward(&mut self, commits: Vec<Word>, speaker_id: Option<&str>) {
        let now = Utc::now();
        for word in commits {
            self.sink
                .add(&word.text, speaker_id, now, word.start, word.end);
        }
    }

    /// End of meeting: flush every processor, drop framer remainders, and
    /// close the recorder.
    pub async fn finish(&mut self) {
        // Speaker state does not outlive the meeting.
        let mut processors = std::mem::take(&mut self.processors);
        for (key, processor) in processors.iter_mut() {
            let commits = processor.flush().await;
            let speaker_id = (key != MIXED_SPEAKER).then_some(key.as_str());
            self.forward(commits, speaker_id);
        }
        self.framer.flush();

        if let Some(recorder) = self.recorder.as_mut() {
            match recorder.stop() {
                Ok(saved) => {
                    for (speaker, path) in saved {
                        tracing::info!(speaker = %speaker, path = %path.display(), "recording saved");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to close recordings"),
            }
        }
    }

    /// Drive the session from an event channel until `Ended` or the sender
    /// side closes, then finish.
    pub async fn run(&mut self, mut events: mpsc::Receiver<MeetingEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                MeetingEvent::Audio {
                    pcm,
                    speaker_id,
                    timestamp,
                } => {
                    self.on_audio(&pcm, speaker_id.as_deref(), timestamp).await;
                }
                MeetingEvent::ParticipantJoined {
                    speaker_id,
                    speaker_name,
                } => self.on_participant(&speaker_id, &speaker_name),
                MeetingEvent::Ended => break,
            }
        }
        self.finish().await;
    }
}
