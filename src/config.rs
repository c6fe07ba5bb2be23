use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Inbound audio format: mono PCM16 at 16kHz unless overridden
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Normalized mean-amplitude level below which a frame counts as silent
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,

    /// Continuous silence longer than this forces an utterance boundary
    #[serde(default = "default_silence_duration_ms")]
    pub silence_duration_ms: u64,

    /// Delay between retries while the recognizer stream is not writable
    #[serde(default = "default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,

    /// Retry budget for a single audio frame
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,

    /// Recent frames replayed into a replacement recognizer stream
    #[serde(default = "default_tail_frames")]
    pub tail_frames: usize,
}

#[derive(Debug, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_completion_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the completion API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Conversation turns kept as completion context
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Delay before the single retry of a failed completion call
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            silence_threshold: default_silence_threshold(),
            silence_duration_ms: default_silence_duration_ms(),
            write_retry_delay_ms: default_write_retry_delay_ms(),
            max_write_attempts: default_max_write_attempts(),
            tail_frames: default_tail_frames(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_history: default_max_history(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_channels() -> u16 {
    1
}

fn default_silence_threshold() -> f32 {
    0.005
}

fn default_silence_duration_ms() -> u64 {
    800
}

fn default_write_retry_delay_ms() -> u64 {
    100
}

fn default_max_write_attempts() -> u32 {
    50
}

fn default_tail_frames() -> usize {
    10
}

fn default_completion_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_history() -> usize {
    20
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
