//! Shared conversation context across all speakers in a meeting.
//!
//! Every processor reads this when composing a recognition request and
//! writes back on commit, so a reply that references another speaker's
//! named entities decodes against the words that introduced them.

use std::collections::VecDeque;

use meetscribe_transcript::{AttributedWord, Word};

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split committed text into sentences.
///
/// A sentence ends at `.` or `?` followed by whitespace, unless the dot
/// closes a dotted abbreviation ("U.S. ") or a single capitalized initial
/// ("Mr. ").
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        if !chars[i].is_whitespace() {
            continue;
        }
        let prev = chars[i - 1];
        if prev != '.' && prev != '?' {
            continue;
        }
        let abbreviation =
            i >= 4 && is_word_char(chars[i - 4]) && chars[i - 3] == '.' && is_word_char(chars[i - 2]);
        let initial = i >= 3
            && chars[i - 3].is_ascii_uppercase()
            && chars[i - 2].is_ascii_lowercase()
            && chars[i - 1] == '.';
        if abbreviation || initial {
            continue;
        }

        sentences.push(chars[start..i].iter().collect());
        start = i + 1;
    }
    if start < chars.len() {
        sentences.push(chars[start..].iter().collect());
    }
    sentences
}

/// Cross-speaker committed-word log and rolling sentence history.
pub struct SharedContext {
    all_words: Vec<AttributedWord>,
    sent_history: VecDeque<String>,
    history_size: usize,
}

impl SharedContext {
    pub fn new(history_size: usize) -> Self {
        tracing::info!(history_size, "shared context initialized");
        Self {
            all_words: Vec::new(),
            sent_history: VecDeque::new(),
            history_size,
        }
    }

    /// Register newly committed words from one speaker.
    ///
    /// The word log stays sorted by start time (words from different
    /// speakers interleave) and the committed text extends the bounded
    /// sentence history.
    pub fn add_committed(&mut self, words: &[Word], speaker_id: Option<&str>) {
        if words.is_empty() {
            return;
        }

        for word in words {
            self.all_words.push(AttributedWord {
                word: word.clone(),
                speaker_id: speaker_id.map(str::to_string),
            });
        }
        self.all_words.sort_by(|a, b| {
            a.word
                .start
                .partial_cmp(&b.word.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim();
        if !text.is_empty() {
            self.sent_history.extend(split_sentences(text));
            while self.sent_history.len() > self.history_size {
                self.sent_history.pop_front();
            }
        }

        tracing::debug!(
            speaker_id,
            new_words = words.len(),
            total_words = self.all_words.len(),
            history_sentences = self.sent_history.len(),
            "shared context updated"
        );
    }

    /// Recognizer prefix prompt: every speaker's committed words ending at
    /// or before `before_time`, single-space joined.
    pub fn build_prompt(&self, before_time: f64) -> String {
        self.all_words
            .iter()
            .filter(|w| w.word.end <= before_time)
            .map(|w| w.word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Snapshot of the rolling sentence history, oldest first.
    pub fn sent_history(&self) -> Vec<String> {
        self.sent_history.iter().cloned().collect()
    }

    pub fn all_words(&self) -> &[AttributedWord] {
        &self.all_words
    }
}
