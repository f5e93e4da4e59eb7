mod config;
mod playback;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use meetscribe_pipeline::{MeetingEvent, MeetingSession};
use meetscribe_recognizer::HttpRecognizer;
use meetscribe_recorder::SessionRecorder;
use meetscribe_transcript::{TranscriptLog, TranscriptSink};
use meetscribe_vad::{EnergyVad, RemoteVad, VoiceActivityDetector};

use config::Config;

/// Live meeting transcription: streaming speech pipeline against a remote
/// recognizer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "meetscribe.json")]
    config: PathBuf,

    /// 16 kHz mono WAV file to transcribe (stands in for platform ingest)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Speaker id to attribute the input stream to
    #[arg(short, long)]
    speaker: Option<String>,

    /// Recognizer endpoint override
    #[arg(long)]
    recognizer_url: Option<String>,

    /// Remote VAD websocket override (energy gate when absent)
    #[arg(long)]
    vad_url: Option<String>,

    /// One recognition stream per speaker instead of a single mixed stream
    #[arg(long)]
    per_speaker: bool,

    /// Record ingested audio to per-speaker WAV files
    #[arg(long)]
    record: bool,

    /// Pace playback to real time instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Directory for transcripts and recordings
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = Config::load(&args.config)?;
    if let Some(url) = args.recognizer_url {
        config.recognizer_url = url;
    }
    if let Some(url) = args.vad_url {
        config.vad_url = Some(url);
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.per_speaker {
        config.pipeline.per_speaker = true;
    }
    if args.record {
        config.record_audio = true;
    }

    // Fatal before any audio is accepted.
    config.pipeline.validate().context("invalid configuration")?;

    if args.write_config {
        config.save(&args.config)?;
        info!(path = %args.config.display(), "configuration written");
        return Ok(());
    }

    let input = args
        .input
        .context("--input is required (16 kHz mono WAV)")?;
    let session_id = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(
        session_id = %session_id,
        recognizer_url = %config.recognizer_url,
        per_speaker = config.pipeline.per_speaker,
        "meetscribe starting"
    );

    let recognizer = Arc::new(HttpRecognizer::with_timeout(
        config.recognizer_url.as_str(),
        Duration::from_secs(config.recognizer_timeout_secs),
    )?);

    let vad: Box<dyn VoiceActivityDetector> = match &config.vad_url {
        Some(url) => Box::new(
            RemoteVad::connect(url, 5, Duration::from_secs(2))
                .await
                .context("failed to connect to vad server")?,
        ),
        None => Box::new(EnergyVad::new(config.vad_threshold)),
    };

    let mut sink = TranscriptLog::new(config.output_format, true);
    sink.start_session(&session_id);
    if let Some(speaker) = &args.speaker {
        sink.set_speaker_name(speaker, speaker);
    }

    let recorder = if config.record_audio {
        let mut recorder = SessionRecorder::new(&config.output_dir, config.pipeline.sample_rate)?;
        recorder.start(&session_id);
        Some(recorder)
    } else {
        None
    };

    let mut session = MeetingSession::new(
        config.pipeline.clone(),
        vad,
        recognizer,
        sink,
        recorder,
    )?;

    let (tx, mut rx) = mpsc::channel::<MeetingEvent>(1024);

    let shutdown_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(MeetingEvent::Ended).await;
        }
    });

    let playback_tx = tx.clone();
    let speaker = args.speaker.clone();
    let realtime = args.realtime;
    tokio::spawn(async move {
        if let Err(e) = playback::play_wav(&input, speaker, realtime, &playback_tx).await {
            error!(error = %e, "playback failed");
        }
        let _ = playback_tx.send(MeetingEvent::Ended).await;
    });
    drop(tx);

    // Single-task event loop: all speaker state is mutated here.
    while let Some(event) = rx.recv().await {
        match event {
            MeetingEvent::Audio {
                pcm,
                speaker_id,
                timestamp,
            } => {
                session.on_audio(&pcm, speaker_id.as_deref(), timestamp).await;
            }
            MeetingEvent::ParticipantJoined {
                speaker_id,
                speaker_name,
            } => session.on_participant(&speaker_id, &speaker_name),
            MeetingEvent::Ended => break,
        }
    }

    // The final flush may still be waiting on the recognizer; give it a
    // bounded grace period and drop would-be commits past it.
    let grace = Duration::from_secs(config.shutdown_grace_secs);
    if tokio::time::timeout(grace, session.finish()).await.is_err() {
        warn!(
            grace_secs = config.shutdown_grace_secs,
            "shutdown grace deadline exceeded, dropping pending output"
        );
    }

    let log = session.sink();
    let stats = log.stats();
    match log.save(&config.output_dir) {
        Ok(path) => info!(path = %path.display(), "transcript saved"),
        Err(e) => error!(error = %e, "failed to save transcript"),
    }

    println!("\n--- Session summary ---");
    println!("Segments: {}", stats.total_segments);
    println!("Speakers: {}", stats.unique_speakers);
    println!("Words:    {}", stats.total_words);
    println!("Duration: {:.1}s", stats.session_duration_secs);

    info!("session complete");
    Ok(())
}
