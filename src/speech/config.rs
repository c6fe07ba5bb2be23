use std::time::Duration;

/// Tuning for a speech streaming session
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    /// Sample rate of inbound PCM audio
    pub sample_rate: u32,

    /// Normalized mean-amplitude level below which a frame counts as silent
    pub silence_threshold: f32,

    /// Continuous silence longer than this forces an utterance boundary
    pub silence_window: Duration,

    /// Delay between write retries while the stream is not writable
    pub retry_delay: Duration,

    /// Retry budget for a single audio frame
    pub max_write_attempts: u32,

    /// Recent frames kept for repriming a replacement stream
    pub tail_frames: usize,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            silence_threshold: 0.005,
            silence_window: Duration::from_millis(800),
            retry_delay: Duration::from_millis(100),
            max_write_attempts: 50,
            tail_frames: 10,
        }
    }
}

impl From<&crate::config::SpeechConfig> for SpeechSettings {
    fn from(cfg: &crate::config::SpeechConfig) -> Self {
        Self {
            sample_rate: cfg.sample_rate,
            silence_threshold: cfg.silence_threshold,
            silence_window: Duration::from_millis(cfg.silence_duration_ms),
            retry_delay: Duration::from_millis(cfg.write_retry_delay_ms),
            max_write_attempts: cfg.max_write_attempts,
            tail_frames: cfg.tail_frames,
        }
    }
}
