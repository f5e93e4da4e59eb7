//! Local RMS-energy speech gate.

use crate::{Result, VadVerdict, VoiceActivityDetector};

const DEFAULT_THRESHOLD: f32 = 0.004;

/// Threshold detector on root-mean-square signal energy.
///
/// No model, no latency. Useful as a fallback when the remote detector is
/// unavailable and for driving tests.
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples
            .iter()
            .map(|&s| {
                let v = s as f64 / 32768.0;
                v * v
            })
            .sum();
        (sum / samples.len() as f64).sqrt() as f32
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[async_trait::async_trait]
impl VoiceActivityDetector for EnergyVad {
    async fn predict(&mut self, samples: &[i16], _sample_rate: u32) -> Result<VadVerdict> {
        let rms = Self::rms(samples);
        let is_speech = rms >= self.threshold;
        // 0.5 at the threshold, saturating towards 1.0 at double the energy.
        let confidence = (rms / self.threshold / 2.0).min(1.0);
        Ok(VadVerdict {
            is_speech,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silence_is_not_speech() {
        let mut vad = EnergyVad::default();
        let verdict = vad.predict(&[0i16; 1600], 16000).await.unwrap();
        assert!(!verdict.is_speech);
    }

    #[tokio::test]
    async fn test_loud_signal_is_speech() {
        let mut vad = EnergyVad::default();
        let samples: Vec<i16> = (0..1600)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect();
        let verdict = vad.predict(&samples, 16000).await.unwrap();
        assert!(verdict.is_speech);
        assert!(verdict.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_empty_packet() {
        let mut vad = EnergyVad::default();
        let verdict = vad.predict(&[], 16000).await.unwrap();
        assert!(!verdict.is_speech);
        assert_eq!(verdict.confidence, 0.0);
    }
}
