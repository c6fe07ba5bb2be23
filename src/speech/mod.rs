//! Real-time speech streaming
//!
//! This module provides the `SpeechSession` abstraction that manages:
//! - One logical recognition session per client connection
//! - Audio delivery under backpressure (retry, never drop)
//! - Silence detection and forced utterance boundaries
//! - Transparent replacement of the underlying recognizer stream ("bridging")
//! - Partial/final transcript events

mod config;
mod nats;
mod recognizer;
mod session;
mod stats;

pub use config::SpeechSettings;
pub use nats::{AudioFrameMessage, NatsRecognizer, StatusMessage, TranscriptMessage};
pub use recognizer::{Recognizer, RecognizerEvent, RecognizerStream, WriteError};
pub use session::{frame_level, SessionEvent, SpeechSession};
pub use stats::SessionStats;
