//! Accumulates short platform frames into fixed-size VAD packets.
//!
//! Platform SDKs deliver audio in frames of ~20 ms; voice-activity
//! decisions are made on fixed packets (default 100 ms). The framer buffers
//! per stream and slices exact packets off the front, either for one mixed
//! stream or per speaker.

use std::collections::HashMap;

/// Decode little-endian signed 16-bit PCM. A trailing odd byte is dropped.
pub fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// One fixed-duration packet ready for voice-activity scoring.
///
/// `samples` always holds exactly the framer's packet size. `speaker_id` is
/// `None` in mixed mode.
#[derive(Debug, Clone)]
pub struct AudioPacket {
    pub samples: Vec<i16>,
    /// Seconds on the meeting clock.
    pub timestamp: f64,
    pub speaker_id: Option<String>,
    pub sample_rate: u32,
}

pub struct VadFramer {
    sample_rate: u32,
    packet_samples: usize,
    per_speaker: bool,
    mixed: Vec<i16>,
    speakers: HashMap<String, Vec<i16>>,
}

impl VadFramer {
    pub fn new(sample_rate: u32, vad_packet_ms: u32, per_speaker: bool) -> Self {
        let packet_samples = (sample_rate as usize * vad_packet_ms as usize) / 1000;
        tracing::info!(
            packet_samples,
            mode = if per_speaker { "per_speaker" } else { "mixed" },
            "vad framer initialized"
        );
        Self {
            sample_rate,
            packet_samples,
            per_speaker,
            mixed: Vec::new(),
            speakers: HashMap::new(),
        }
    }

    pub fn packet_samples(&self) -> usize {
        self.packet_samples
    }

    /// Append a PCM frame and return every complete packet it unlocked.
    ///
    /// Emitted packets carry the incoming timestamp. The sub-packet
    /// remainder stays buffered until enough audio arrives; it is never
    /// forwarded on its own.
    pub fn push(&mut self, pcm: &[u8], timestamp: f64, speaker_id: Option<&str>) -> Vec<AudioPacket> {
        self.push_samples(&decode_pcm(pcm), timestamp, speaker_id)
    }

    pub fn push_samples(
        &mut self,
        samples: &[i16],
        timestamp: f64,
        speaker_id: Option<&str>,
    ) -> Vec<AudioPacket> {
        let (pending, packet_speaker) = if self.per_speaker {
            let key = speaker_id.unwrap_or("unknown");
            if !self.speakers.contains_key(key) {
                tracing::info!(speaker_id = key, "speaker buffer created");
            }
            (
                self.speakers.entry(key.to_string()).or_default(),
                Some(key.to_string()),
            )
        } else {
            (&mut self.mixed, None)
        };

        pending.extend_from_slice(samples);

        let mut packets = Vec::new();
        while pending.len() >= self.packet_samples {
            let packet: Vec<i16> = pending.drain(..self.packet_samples).collect();
            packets.push(AudioPacket {
                samples: packet,
                timestamp,
                speaker_id: packet_speaker.clone(),
                sample_rate: self.sample_rate,
            });
        }
        packets
    }

    /// Discard sub-packet remainders. A tail shorter than one packet cannot
    /// be meaningfully VAD-scored, and padding it with silence could read
    /// as a speech end downstream.
    pub fn flush(&mut self) {
        let dropped: usize = if self.per_speaker {
            self.speakers.values().map(Vec::len).sum()
        } else {
            self.mixed.len()
        };
        if dropped > 0 {
            tracing::debug!(dropped_samples = dropped, "vad framer flushed");
        }
        self.mixed.clear();
        for pending in self.speakers.values_mut() {
            pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_pcm_little_endian() {
        let bytes = pcm(&[1, -1, 256]);
        assert_eq!(decode_pcm(&bytes), [1, -1, 256]);
    }

    #[test]
    fn test_buffers_until_full_packet() {
        let mut framer = VadFramer::new(16000, 100, false);
        // 20 ms frames: 320 samples each, packet is 1600.
        let frame = pcm(&vec![7i16; 320]);
        for _ in 0..4 {
            assert!(framer.push(&frame, 0.0, None).is_empty());
        }
        let packets = framer.push(&frame, 0.1, None);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].samples.len(), 1600);
        assert_eq!(packets[0].speaker_id, None);
        assert_eq!(packets[0].timestamp, 0.1);
    }

    #[test]
    fn test_total_emitted_samples() {
        let mut framer = VadFramer::new(16000, 100, false);
        let mut emitted = 0;
        // 7 frames of 700 samples = 4900 total; floor(4900/1600) = 3 packets.
        for i in 0..7 {
            for packet in framer.push(&pcm(&vec![0i16; 700]), i as f64 * 0.04, None) {
                emitted += packet.samples.len();
            }
        }
        assert_eq!(emitted, 3 * 1600);
    }

    #[test]
    fn test_oversized_frame_emits_multiple_packets() {
        let mut framer = VadFramer::new(16000, 100, false);
        let packets = framer.push(&pcm(&vec![0i16; 4000]), 0.0, None);
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| p.samples.len() == 1600));
    }

    #[test]
    fn test_exact_multiple_leaves_empty_pending() {
        let mut framer = VadFramer::new(16000, 100, false);
        let packets = framer.push(&pcm(&vec![0i16; 3200]), 0.0, None);
        assert_eq!(packets.len(), 2);
        // Nothing pending: the next single sample emits no packet.
        assert!(framer.push(&pcm(&[0i16]), 0.2, None).is_empty());
    }

    #[test]
    fn test_per_speaker_buffers_are_independent() {
        let mut framer = VadFramer::new(16000, 100, true);
        assert!(framer.push(&pcm(&vec![1i16; 1000]), 0.0, Some("a")).is_empty());
        assert!(framer.push(&pcm(&vec![2i16; 1000]), 0.0, Some("b")).is_empty());

        let packets = framer.push(&pcm(&vec![1i16; 1000]), 0.1, Some("a"));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].speaker_id.as_deref(), Some("a"));
        assert!(packets[0].samples.iter().all(|&s| s == 1));
    }

    #[test]
    fn test_flush_discards_partial_tail() {
        let mut framer = VadFramer::new(16000, 100, false);
        framer.push(&pcm(&vec![0i16; 1000]), 0.0, None);
        framer.flush();
        // 1000 buffered samples are gone; 600 more do not complete a packet.
        assert!(framer.push(&pcm(&vec![0i16; 600]), 0.1, None).is_empty());
    }

    #[test]
    fn test_mixed_mode_ignores_speaker_id() {
        let mut framer = VadFramer::new(16000, 100, false);
        framer.push(&pcm(&vec![0i16; 1000]), 0.0, Some("a"));
        let packets = framer.push(&pcm(&vec![0i16; 600]), 0.0, Some("b"));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].speaker_id, None);
    }
}
