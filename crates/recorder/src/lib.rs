//! Per-speaker WAV recording for a meeting session.
//!
//! One 16-bit PCM mono RIFF/WAVE file per speaker, created lazily when a
//! speaker's first audio arrives and finalized when the session stops.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Utc;
use hound::{WavSpec, WavWriter};

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("recorder is not running")]
    NotRecording,
}

pub type Result<T> = std::result::Result<T, RecorderError>;

struct SpeakerTrack {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    samples_written: u64,
}

/// Writes each speaker's audio to its own WAV file.
pub struct SessionRecorder {
    output_dir: PathBuf,
    sample_rate: u32,
    session_id: Option<String>,
    tracks: HashMap<String, SpeakerTrack>,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir.as_ref())?;
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            sample_rate,
            session_id: None,
            tracks: HashMap::new(),
        })
    }

    pub fn start(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        tracing::info!(
            session_id = %session_id,
            output_dir = %self.output_dir.display(),
            "recording started"
        );
        self.session_id = Some(session_id);
    }

    pub fn is_recording(&self) -> bool {
        self.session_id.is_some()
    }

    /// Append samples to the speaker's track, creating the file on first use.
    pub fn append(&mut self, speaker: &str, samples: &[i16]) -> Result<()> {
        let session_id = self.session_id.as_deref().ok_or(RecorderError::NotRecording)?;

        let track = match self.tracks.entry(speaker.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let stamp = Utc::now().format("%Y%m%d_%H%M%S");
                let filename = format!("{session_id}_{speaker}_{stamp}.wav");
                let path = self.output_dir.join(filename);
                let spec = WavSpec {
                    channels: 1,
                    sample_rate: self.sample_rate,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };
                let writer = WavWriter::create(&path, spec)?;
                tracing::info!(speaker, path = %path.display(), "wav track created");
                entry.insert(SpeakerTrack {
                    writer,
                    path,
                    samples_written: 0,
                })
            }
        };

        for &sample in samples {
            track.writer.write_sample(sample)?;
        }
        track.samples_written += samples.len() as u64;
        Ok(())
    }

    pub fn duration_secs(&self, speaker: &str) -> f64 {
        self.tracks
            .get(speaker)
            .map(|t| t.samples_written as f64 / self.sample_rate as f64)
            .unwrap_or(0.0)
    }

    /// Finalize all tracks and return `(speaker, path)` pairs.
    pub fn stop(&mut self) -> Result<Vec<(String, PathBuf)>> {
        let mut saved = Vec::with_capacity(self.tracks.len());
        for (speaker, track) in self.tracks.drain() {
            let duration = track.samples_written as f64 / self.sample_rate as f64;
            track.writer.finalize()?;
            tracing::info!(
                speaker = %speaker,
                duration_secs = duration,
                path = %track.path.display(),
                "wav track closed"
            );
            saved.push((speaker, track.path));
        }
        self.session_id = None;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_requires_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(dir.path(), 16000).unwrap();
        assert!(matches!(
            recorder.append("a", &[0i16; 100]),
            Err(RecorderError::NotRecording)
        ));
    }

    #[test]
    fn test_one_file_per_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(dir.path(), 16000).unwrap();
        recorder.start("meeting");

        recorder.append("a", &[100i16; 1600]).unwrap();
        recorder.append("b", &[-100i16; 3200]).unwrap();
        recorder.append("a", &[100i16; 1600]).unwrap();

        assert_eq!(recorder.duration_secs("a"), 0.2);
        assert_eq!(recorder.duration_secs("b"), 0.2);

        let mut saved = recorder.stop().unwrap();
        saved.sort();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].0, "a");
        assert_eq!(saved[1].0, "b");

        let reader = hound::WavReader::open(&saved[0].1).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 3200);
    }

    #[test]
    fn test_stop_clears_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(dir.path(), 16000).unwrap();
        recorder.start("meeting");
        recorder.append("a", &[0i16; 16]).unwrap();
        recorder.stop().unwrap();
        assert!(!recorder.is_recording());
    }
}
