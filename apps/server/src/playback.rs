//! WAV file ingest.
//!
//! Stands in for the platform SDK: reads a 16 kHz mono recording and feeds
//! it through the session as 20 ms frames, optionally paced to real time.

use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use tokio::sync::mpsc;

use meetscribe_pipeline::MeetingEvent;

/// 20 ms at 16 kHz, the frame size conferencing SDKs typically deliver.
const FRAME_SAMPLES: usize = 320;

pub async fn play_wav(
    path: &Path,
    speaker_id: Option<String>,
    realtime: bool,
    tx: &mpsc::Sender<MeetingEvent>,
) -> Result<()> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    ensure!(
        spec.channels == 1 && spec.sample_rate == 16000 && spec.bits_per_sample == 16,
        "expected 16 kHz mono 16-bit wav, got {} Hz / {} ch / {} bit",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .context("failed to decode wav samples")?;

    tracing::info!(
        path = %path.display(),
        duration_secs = samples.len() as f64 / 16000.0,
        realtime,
        "playback started"
    );

    let mut timestamp = 0.0;
    for chunk in samples.chunks(FRAME_SAMPLES) {
        let pcm: Vec<u8> = chunk.iter().flat_map(|s| s.to_le_bytes()).collect();
        tx.send(MeetingEvent::Audio {
            pcm,
            speaker_id: speaker_id.clone(),
            timestamp,
        })
        .await
        .context("session closed during playback")?;

        timestamp += chunk.len() as f64 / 16000.0;
        if realtime {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    tracing::info!(path = %path.display(), "playback finished");
    Ok(())
}
