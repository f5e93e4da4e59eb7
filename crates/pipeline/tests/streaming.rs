//! End-to-end pipeline scenarios: platform frames in, committed words out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use meetscribe_pipeline::{MeetingEvent, MeetingSession, PipelineConfig};
use meetscribe_recognizer::{
    RecognizeRequest, RecognizeResponse, Recognizer, RecognizerSegment, RecognizerWord,
    Result as RecognizerResult,
};
use meetscribe_transcript::TranscriptSink;
use meetscribe_vad::{Result as VadResult, VadError, VadVerdict, VoiceActivityDetector};

/// 20 ms platform frame at 16 kHz.
const FRAME_SAMPLES: usize = 320;
const FRAME_SECS: f64 = 0.02;

fn frame_pcm(value: i16) -> Vec<u8> {
    std::iter::repeat(value)
        .take(FRAME_SAMPLES)
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

/// Treats any non-zero sample as speech, so tests steer the state machine
/// through frame contents.
struct ThresholdVad;

#[async_trait::async_trait]
impl VoiceActivityDetector for ThresholdVad {
    async fn predict(&mut self, samples: &[i16], _sample_rate: u32) -> VadResult<VadVerdict> {
        let is_speech = samples.iter().any(|&s| s != 0);
        Ok(VadVerdict {
            is_speech,
            confidence: if is_speech { 1.0 } else { 0.0 },
        })
    }
}

struct BrokenVad;

#[async_trait::async_trait]
impl VoiceActivityDetector for BrokenVad {
    async fn predict(&mut self, _samples: &[i16], _sample_rate: u32) -> VadResult<VadVerdict> {
        Err(VadError::Closed)
    }
}

struct ScriptedRecognizer {
    responses: Mutex<VecDeque<RecognizeResponse>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    fn new(responses: Vec<RecognizeResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn transcribe(&self, request: RecognizeRequest<'_>) -> RecognizerResult<RecognizeResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

fn segment(words: &[(f64, f64, &str)]) -> RecognizerSegment {
    RecognizerSegment {
        words: words
            .iter()
            .map(|&(start, end, text)| RecognizerWord {
                start,
                end,
                text: text.to_string(),
            })
            .collect(),
        text: words.iter().map(|w| w.2).collect::<Vec<_>>().join(" "),
        no_speech_prob: 0.0,
    }
}

fn response(words: &[(f64, f64, &str)]) -> RecognizeResponse {
    RecognizeResponse {
        segments: vec![segment(words)],
    }
}

/// Sink capturing commits and name updates for assertions.
#[derive(Default)]
struct CollectingSink {
    entries: Vec<(String, Option<String>, f64, f64)>,
    names: Vec<(String, String)>,
}

impl TranscriptSink for CollectingSink {
    fn add(
        &mut self,
        text: &str,
        speaker_id: Option<&str>,
        _timestamp: DateTime<Utc>,
        start: f64,
        end: f64,
    ) {
        self.entries
            .push((text.to_string(), speaker_id.map(str::to_string), start, end));
    }

    fn set_speaker_name(&mut self, speaker_id: &str, name: &str) {
        self.names
            .push((speaker_id.to_string(), name.to_string()));
    }
}

fn mixed_config() -> PipelineConfig {
    PipelineConfig::default()
}

fn per_speaker_config() -> PipelineConfig {
    PipelineConfig {
        per_speaker: true,
        ..Default::default()
    }
}

async fn feed_frames(
    session: &mut MeetingSession<CollectingSink>,
    speaker: Option<&str>,
    value: i16,
    frames: usize,
    first_frame_index: usize,
) {
    let pcm = frame_pcm(value);
    for i in 0..frames {
        let ts = (first_frame_index + i) as f64 * FRAME_SECS;
        session.on_audio(&pcm, speaker, ts).await;
    }
}

#[tokio::test]
async fn test_mixed_session_commits_after_silence() {
    let recognizer = ScriptedRecognizer::new(vec![
        response(&[(0.0, 0.5, "hello"), (0.5, 1.0, "world")]),
        response(&[(0.0, 0.5, "hello"), (0.5, 1.0, "world")]),
    ]);
    let mut session = MeetingSession::new(
        mixed_config(),
        Box::new(ThresholdVad),
        recognizer.clone(),
        CollectingSink::default(),
        None,
    )
    .unwrap();

    // ~5.1 s of speech: first stride fires; then >1 s of silence flushes.
    feed_frames(&mut session, None, 2000, 256, 0).await;
    feed_frames(&mut session, None, 0, 70, 256).await;

    assert_eq!(recognizer.calls(), 2);
    let sink = session.sink();
    let texts: Vec<&str> = sink.entries.iter().map(|(t, ..)| t.as_str()).collect();
    assert_eq!(texts, ["hello", "world"]);
    assert!(sink.entries.iter().all(|(_, speaker, ..)| speaker.is_none()));

    // Commit times are offset by the speech-start clock, strictly increasing.
    let ends: Vec<f64> = sink.entries.iter().map(|&(.., end)| end).collect();
    assert!(ends.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_cross_speaker_prompt_carries_committed_words() {
    let recognizer = ScriptedRecognizer::new(vec![
        // Speaker A: stride window, then the final window on silence.
        response(&[(0.0, 0.5, "open"), (0.5, 1.0, "the"), (1.0, 1.5, "door")]),
        response(&[(0.0, 0.5, "open"), (0.5, 1.0, "the"), (1.0, 1.5, "door")]),
        // Speaker B afterwards.
        response(&[(0.0, 0.4, "yes")]),
        response(&[(0.0, 0.4, "yes")]),
    ]);
    let mut session = MeetingSession::new(
        per_speaker_config(),
        Box::new(ThresholdVad),
        recognizer.clone(),
        CollectingSink::default(),
        None,
    )
    .unwrap();

    session.on_participant("A", "Alice");

    feed_frames(&mut session, Some("A"), 1500, 256, 0).await;
    feed_frames(&mut session, Some("A"), 0, 70, 256).await;

    // B starts at t = 10 s, long after A's words committed.
    feed_frames(&mut session, Some("B"), 1500, 256, 500).await;
    feed_frames(&mut session, Some("B"), 0, 70, 756).await;

    assert_eq!(recognizer.calls(), 4);
    let prompts = recognizer.prompts();
    assert_eq!(prompts[2], "open the door");

    let sink = session.sink();
    let by_speaker: Vec<(&str, &str)> = sink
        .entries
        .iter()
        .map(|(t, s, ..)| (s.as_deref().unwrap_or(""), t.as_str()))
        .collect();
    assert_eq!(
        by_speaker,
        [("A", "open"), ("A", "the"), ("A", "door"), ("B", "yes")]
    );
    assert_eq!(sink.names, [("A".to_string(), "Alice".to_string())]);
}

#[tokio::test]
async fn test_event_loop_flushes_on_meeting_end() {
    let recognizer = ScriptedRecognizer::new(vec![response(&[(0.0, 0.5, "goodbye")])]);
    let mut session = MeetingSession::new(
        mixed_config(),
        Box::new(ThresholdVad),
        recognizer.clone(),
        CollectingSink::default(),
        None,
    )
    .unwrap();

    let (tx, rx) = mpsc::channel(1024);
    // Two seconds of speech: below the stride, so only the final flush can
    // produce the commit.
    let pcm = frame_pcm(1200);
    for i in 0..100 {
        tx.send(MeetingEvent::Audio {
            pcm: pcm.clone(),
            speaker_id: None,
            timestamp: i as f64 * FRAME_SECS,
        })
        .await
        .unwrap();
    }
    tx.send(MeetingEvent::Ended).await.unwrap();
    drop(tx);

    session.run(rx).await;

    assert_eq!(recognizer.calls(), 1);
    let texts: Vec<&str> = session
        .sink()
        .entries
        .iter()
        .map(|(t, ..)| t.as_str())
        .collect();
    assert_eq!(texts, ["goodbye"]);
}

#[tokio::test]
async fn test_vad_failure_means_silence() {
    let recognizer = ScriptedRecognizer::new(vec![]);
    let mut session = MeetingSession::new(
        mixed_config(),
        Box::new(BrokenVad),
        recognizer.clone(),
        CollectingSink::default(),
        None,
    )
    .unwrap();

    feed_frames(&mut session, None, 2000, 300, 0).await;
    session.finish().await;

    assert_eq!(recognizer.calls(), 0);
    assert!(session.sink().entries.is_empty());
}

#[tokio::test]
async fn test_commits_never_retracted_across_strides() {
    // The second window disagrees with the already committed word; the
    // commit must stand and only new words may follow.
    let recognizer = ScriptedRecognizer::new(vec![
        response(&[(0.0, 0.5, "north"), (0.5, 1.0, "wind")]),
        response(&[(0.0, 0.5, "north"), (0.5, 1.0, "wind"), (5.0, 5.5, "blew")]),
        response(&[(4.9, 5.5, "blew"), (5.5, 6.0, "hard")]),
        response(&[(4.9, 5.5, "blew"), (5.5, 6.0, "hard")]),
    ]);
    let mut session = MeetingSession::new(
        mixed_config(),
        Box::new(ThresholdVad),
        recognizer.clone(),
        CollectingSink::default(),
        None,
    )
    .unwrap();

    // Three strides of sustained speech, then silence.
    feed_frames(&mut session, None, 900, 766, 0).await;
    feed_frames(&mut session, None, 0, 70, 766).await;

    let texts: Vec<&str> = session
        .sink()
        .entries
        .iter()
        .map(|(t, ..)| t.as_str())
        .collect();
    // Prefix property: each sink entry appeared exactly once, in order.
    assert_eq!(texts, ["north", "wind", "blew", "hard"]);
}
