/// Sample rate the recognition pipeline operates at (16 kHz).
pub const SAMPLE_RATE: usize = 16000;

/// Maximum audio duration the recognizer accepts per request, in seconds.
pub const MAX_AUDIO_SEC: f64 = 30.0;
