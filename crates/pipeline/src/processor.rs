//! Per-speaker online recognition driver.
//!
//! Runs the speech state machine over VAD verdicts, grows a rolling audio
//! window during speech, fires overlapping recognition windows on a stride,
//! and commits stable words through the hypothesis buffer. One instance per
//! speaker (individual mode) or one for the whole meeting (mixed mode).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use meetscribe_recognizer::{RecognizeRequest, RecognizeResponse, Recognizer};
use meetscribe_transcript::Word;

use crate::config::PipelineConfig;
use crate::constants::{MAX_AUDIO_SEC, SAMPLE_RATE};
use crate::context::SharedContext;
use crate::hypothesis::HypothesisBuffer;

pub struct SpeechProcessor {
    speaker_id: Option<String>,
    stride_sec: f64,
    silence_timeout_sec: f64,
    pre_speech_sec: f64,
    trim_threshold_sec: f64,

    recognizer: Arc<dyn Recognizer>,
    shared: Arc<Mutex<SharedContext>>,

    /// Rolling working buffer; grows during speech, trimmed from the left.
    audio: Vec<f32>,
    /// Absolute time of sample 0 of `audio`. Only ever moves forward.
    buffer_time_offset: f64,
    hyp: HypothesisBuffer,
    /// This speaker's committed words, kept for trimming at word
    /// boundaries. The canonical history lives in the shared context.
    committed: Vec<Word>,

    in_speech: bool,
    last_speech_time: Option<f64>,
    last_asr_time: Option<f64>,
    /// A stride that fires while a recognition is outstanding is skipped.
    asr_in_flight: bool,

    /// Last second of silence audio, prepended as left margin at the next
    /// speech start.
    pre_roll: VecDeque<Vec<f32>>,
    pre_roll_samples: usize,
}

impl SpeechProcessor {
    pub fn new(
        speaker_id: Option<String>,
        config: &PipelineConfig,
        recognizer: Arc<dyn Recognizer>,
        shared: Arc<Mutex<SharedContext>>,
    ) -> Self {
        tracing::info!(
            speaker_id = speaker_id.as_deref(),
            stride_sec = config.stride_sec,
            silence_timeout_sec = config.silence_timeout_sec,
            "speech processor initialized"
        );
        Self {
            speaker_id,
            stride_sec: config.stride_sec,
            silence_timeout_sec: config.silence_timeout_sec,
            pre_speech_sec: config.pre_speech_sec,
            trim_threshold_sec: config.trim_threshold_sec(),
            recognizer,
            shared,
            audio: Vec::new(),
            buffer_time_offset: 0.0,
            hyp: HypothesisBuffer::default(),
            committed: Vec::new(),
            in_speech: false,
            last_speech_time: None,
            last_asr_time: None,
            asr_in_flight: false,
            pre_roll: VecDeque::new(),
            pre_roll_samples: 0,
        }
    }

    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    pub fn buffer_time_offset(&self) -> f64 {
        self.buffer_time_offset
    }

    /// Current audio window length in seconds.
    pub fn audio_secs(&self) -> f64 {
        self.audio.len() as f64 / SAMPLE_RATE as f64
    }

    pub fn committed(&self) -> &[Word] {
        &self.committed
    }

    /// Process one VAD-scored packet. `timestamp` is absolute seconds;
    /// `samples` is the packet already converted to float. Returns the
    /// words newly committed by this call.
    pub async fn on_vad(&mut self, is_speech: bool, samples: &[f32], timestamp: f64) -> Vec<Word> {
        if is_speech {
            self.last_speech_time = Some(timestamp);
            if !self.in_speech {
                self.on_speech_start(timestamp);
            }
            self.audio.extend_from_slice(samples);

            if let Some(last_asr) = self.last_asr_time {
                if timestamp - last_asr >= self.stride_sec {
                    if self.asr_in_flight {
                        tracing::debug!(
                            speaker_id = self.speaker_id.as_deref(),
                            "stride skipped, recognition in flight"
                        );
                    } else {
                        return self.process_asr(timestamp, false).await;
                    }
                }
            }
            Vec::new()
        } else if self.in_speech {
            match self.last_speech_time {
                Some(last_speech) if timestamp - last_speech >= self.silence_timeout_sec => {
                    self.on_speech_end(timestamp).await
                }
                _ => Vec::new(),
            }
        } else {
            self.push_pre_roll(samples);
            Vec::new()
        }
    }

    /// Flush remaining audio at end of lifecycle (meeting end, shutdown).
    pub async fn flush(&mut self) -> Vec<Word> {
        if self.in_speech && !self.audio.is_empty() {
            let timestamp = self.buffer_time_offset + self.audio_secs();
            return self.process_asr(timestamp, true).await;
        }
        Vec::new()
    }

    fn on_speech_start(&mut self, timestamp: f64) {
        self.in_speech = true;
        tracing::info!(
            speaker_id = self.speaker_id.as_deref(),
            timestamp,
            "speech start"
        );

        // Prepend buffered silence as left-margin context for the recognizer.
        let max_pre = (self.pre_speech_sec * SAMPLE_RATE as f64) as usize;
        let mut pre: Vec<f32> = self.pre_roll.drain(..).flatten().collect();
        self.pre_roll_samples = 0;
        if pre.len() > max_pre {
            pre.drain(..pre.len() - max_pre);
        }

        self.buffer_time_offset = timestamp - pre.len() as f64 / SAMPLE_RATE as f64;
        self.audio = pre;

        // Fresh hypothesis state per utterance; offsets differ per segment.
        self.hyp = HypothesisBuffer::starting_at(self.buffer_time_offset);
        self.last_asr_time = Some(timestamp);
    }

    async fn on_speech_end(&mut self, timestamp: f64) -> Vec<Word> {
        self.in_speech = false;
        tracing::info!(
            speaker_id = self.speaker_id.as_deref(),
            timestamp,
            "speech end"
        );
        self.process_asr(timestamp, true).await
    }

    async fn process_asr(&mut self, timestamp: f64, is_last: bool) -> Vec<Word> {
        let chunk_dur = self.audio_secs();
        if chunk_dur == 0.0 {
            return Vec::new();
        }
        if chunk_dur < self.stride_sec && !is_last {
            return Vec::new();
        }

        // The recognizer accepts at most 30 s; keep the most recent window.
        let (window_start, audio_offset) = if chunk_dur > MAX_AUDIO_SEC {
            let max_samples = (MAX_AUDIO_SEC * SAMPLE_RATE as f64) as usize;
            (
                self.audio.len() - max_samples,
                self.buffer_time_offset + (chunk_dur - MAX_AUDIO_SEC),
            )
        } else {
            (0, self.buffer_time_offset)
        };

        let (prompt, sent_history) = {
            let shared = self.shared.lock().expect("shared context mutex poisoned");
            (
                shared.build_prompt(self.buffer_time_offset),
                shared.sent_history(),
            )
        };

        tracing::info!(
            speaker_id = self.speaker_id.as_deref(),
            audio_secs = chunk_dur,
            is_last,
            "recognition window"
        );

        self.asr_in_flight = true;
        let request = RecognizeRequest {
            audio: &self.audio[window_start..],
            sample_rate: SAMPLE_RATE as u32,
            prompt,
            sent_history,
            speaker_id: self.speaker_id.clone(),
        };
        let response = match self.recognizer.transcribe(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    speaker_id = self.speaker_id.as_deref(),
                    error = %e,
                    "recognition failed, continuing with empty response"
                );
                RecognizeResponse::default()
            }
        };
        self.asr_in_flight = false;
        self.last_asr_time = Some(timestamp);

        let mut words = Vec::new();
        for segment in response.segments {
            if segment.no_speech_prob > 0.9 {
                continue;
            }
            for word in segment.words {
                let text = word.text.trim();
                if !text.is_empty() {
                    words.push(Word::new(text, word.start, word.end));
                }
            }
        }

        self.hyp.insert(words, audio_offset);
        let mut newly_committed = self.hyp.flush();

        if !newly_committed.is_empty() {
            self.committed.extend(newly_committed.iter().cloned());
            self.shared
                .lock()
                .expect("shared context mutex poisoned")
                .add_committed(&newly_committed, self.speaker_id.as_deref());
            tracing::info!(
                speaker_id = self.speaker_id.as_deref(),
                count = newly_committed.len(),
                "words committed"
            );
        }

        if self.audio_secs() > self.trim_threshold_sec {
            self.trim_at_committed_word();
        }

        // If nothing has committed yet (recognizer outage), the trim above
        // was a no-op; cap the working buffer at the recognizer window,
        // since leading audio past it can never be transcribed again.
        let max_samples = (MAX_AUDIO_SEC * SAMPLE_RATE as f64) as usize;
        if self.audio.len() > max_samples {
            let cut = self.audio.len() - max_samples;
            self.audio.drain(..cut);
            self.buffer_time_offset += cut as f64 / SAMPLE_RATE as f64;
            self.hyp.pop_committed(self.buffer_time_offset);
        }

        if is_last {
            let tail = self.hyp.complete();
            if !tail.is_empty() {
                tracing::info!(
                    speaker_id = self.speaker_id.as_deref(),
                    count = tail.len(),
                    "final words committed"
                );
                self.committed.extend(tail.iter().cloned());
                self.shared
                    .lock()
                    .expect("shared context mutex poisoned")
                    .add_committed(&tail, self.speaker_id.as_deref());
                newly_committed.extend(tail);
            }
        }

        newly_committed
    }

    /// Cut the front of the audio window at the newest committed word whose
    /// end falls in the first half of the buffer.
    fn trim_at_committed_word(&mut self) {
        if self.committed.is_empty() {
            return;
        }

        let target = self.buffer_time_offset + self.audio_secs() / 2.0;
        let trim_time = match self.committed.iter().rev().find(|w| w.end <= target) {
            Some(word) => word.end,
            None => return,
        };
        if trim_time <= self.buffer_time_offset {
            return;
        }

        let cut_secs = trim_time - self.buffer_time_offset;
        let cut_samples = ((cut_secs * SAMPLE_RATE as f64) as usize).min(self.audio.len());
        self.audio.drain(..cut_samples);
        self.buffer_time_offset = trim_time;
        let removed = self.hyp.pop_committed(trim_time);

        tracing::debug!(
            speaker_id = self.speaker_id.as_deref(),
            cut_secs,
            removed_words = removed.len(),
            new_offset = self.buffer_time_offset,
            "audio buffer trimmed"
        );
    }

    fn push_pre_roll(&mut self, samples: &[f32]) {
        self.pre_roll.push_back(samples.to_vec());
        self.pre_roll_samples += samples.len();

        let max = (self.pre_speech_sec * SAMPLE_RATE as f64) as usize;
        while self.pre_roll_samples > max {
            match self.pre_roll.pop_front() {
                Some(front) => self.pre_roll_samples -= front.len(),
                None => break,
            }
        }
    }
}
