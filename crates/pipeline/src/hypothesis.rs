//! Hypothesis buffering with longest-common-prefix commits.
//!
//! Successive recognition windows over the same speech re-utter earlier
//! words. A word is committed once two consecutive windows agree on it
//! token-for-token from the front; an exact n-gram match against already
//! committed text absorbs the overlap between a window's head and the
//! committed tail.

use meetscribe_transcript::Word;

/// Normalize a word for case- and punctuation-insensitive comparison.
///
/// Characters outside `[A-Za-z0-9_]` and whitespace are dropped before
/// lowercasing. An empty result never equals a non-empty one.
pub(crate) fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Recognizer timestamps are relative to the submitted window and should
/// never be negative; malformed values collapse to zero and are then
/// monotonic-corrected against the commit frontier.
fn sanitize_time(t: f64) -> f64 {
    if t.is_finite() && t > 0.0 {
        t
    } else {
        0.0
    }
}

/// Maximum overlap length checked by the n-gram dedup scan.
const MAX_NGRAM: usize = 5;

/// Buffers recognizer output across overlapping windows and commits the
/// stable prefix.
///
/// Three ordered word sequences: committed history still covered by the
/// audio buffer, the previous window's uncommitted tail, and the latest
/// window's output after dedup.
#[derive(Debug, Default)]
pub struct HypothesisBuffer {
    committed_in_buffer: Vec<Word>,
    buffer: Vec<Word>,
    new: Vec<Word>,
    last_committed_time: f64,
}

impl HypothesisBuffer {
    /// A fresh buffer whose commit frontier starts at `offset` seconds.
    /// One is created per speech segment so state never leaks across
    /// utterances.
    pub fn starting_at(offset: f64) -> Self {
        Self {
            last_committed_time: offset,
            ..Self::default()
        }
    }

    pub fn last_committed_time(&self) -> f64 {
        self.last_committed_time
    }

    /// Insert the latest window's words, shifted by `offset` seconds.
    ///
    /// Words entirely behind the commit frontier are dropped (with 100 ms
    /// slack for near-boundary jitter). If the window starts within one
    /// second of the frontier, the longest exact n-gram overlap between the
    /// committed tail and the window head (up to five words) is removed
    /// from the head so re-uttered words are not double-counted.
    pub fn insert(&mut self, words: Vec<Word>, offset: f64) {
        self.new = words
            .into_iter()
            .map(|w| Word {
                start: sanitize_time(w.start) + offset,
                end: sanitize_time(w.end) + offset,
                text: w.text,
            })
            .filter(|w| w.start > self.last_committed_time - 0.1)
            .collect();

        tracing::debug!(
            num_words = self.new.len(),
            offset,
            last_committed_time = self.last_committed_time,
            "hypothesis insert"
        );

        let first_start = match self.new.first() {
            Some(w) => w.start,
            None => return,
        };
        if (first_start - self.last_committed_time).abs() >= 1.0
            || self.committed_in_buffer.is_empty()
        {
            return;
        }

        let max_len = self
            .committed_in_buffer
            .len()
            .min(self.new.len())
            .min(MAX_NGRAM);
        let mut overlap = 0;
        for i in 1..=max_len {
            let tail = self.committed_in_buffer[self.committed_in_buffer.len() - i..]
                .iter()
                .map(|w| normalize_word(&w.text))
                .collect::<Vec<_>>()
                .join(" ");
            let head = self.new[..i]
                .iter()
                .map(|w| normalize_word(&w.text))
                .collect::<Vec<_>>()
                .join(" ");
            if tail == head {
                overlap = i;
            }
        }
        if overlap > 0 {
            self.new.drain(..overlap);
            tracing::debug!(removed_words = overlap, "hypothesis dedup");
        }
    }

    /// Commit the longest common prefix of the previous and current window,
    /// returning the newly committed words.
    pub fn flush(&mut self) -> Vec<Word> {
        let mut commit = Vec::new();

        while !self.new.is_empty() && !self.buffer.is_empty() {
            if normalize_word(&self.new[0].text) != normalize_word(&self.buffer[0].text) {
                break;
            }
            let word = self.new.remove(0);
            self.buffer.remove(0);
            self.last_committed_time = word.end;
            commit.push(word);
        }

        self.buffer = std::mem::take(&mut self.new);
        self.committed_in_buffer.extend(commit.iter().cloned());

        if !commit.is_empty() {
            tracing::debug!(
                committed = commit.len(),
                buffer_remaining = self.buffer.len(),
                "hypothesis flush"
            );
        }
        commit
    }

    /// Remove and return committed words ending at or before `time`.
    /// Called when the audio buffer is trimmed past them.
    pub fn pop_committed(&mut self, time: f64) -> Vec<Word> {
        let keep_from = self
            .committed_in_buffer
            .iter()
            .position(|w| w.end > time)
            .unwrap_or(self.committed_in_buffer.len());
        self.committed_in_buffer.drain(..keep_from).collect()
    }

    /// The still-uncommitted tail, accepted as final at end of speech.
    pub fn complete(&self) -> Vec<Word> {
        self.buffer.clone()
    }
}
