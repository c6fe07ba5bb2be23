use anyhow::Result;
use tokio::sync::mpsc;

/// Event emitted by an underlying recognizer stream
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// Interim hypothesis for the utterance in progress
    Partial { text: String },

    /// Completed utterance
    Final {
        text: String,
        confidence: Option<f32>,
    },

    /// The provider closed the stream at its duration cap. Recoverable.
    StreamLimit,

    /// Any other provider-side failure
    Error { message: String },
}

/// Error returned by [`RecognizerStream::write`]
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("recognizer stream is not writable yet")]
    NotWritable,

    #[error("recognizer stream write failed: {0}")]
    Failed(String),
}

/// One underlying provider stream. At most one exists per speech session
/// at any instant.
#[async_trait::async_trait]
pub trait RecognizerStream: Send {
    /// Push a chunk of PCM16LE audio into the stream
    async fn write(&mut self, pcm: &[u8]) -> Result<(), WriteError>;

    /// Whether the stream currently accepts audio
    fn is_writable(&self) -> bool;

    /// Release the stream; further writes fail
    async fn close(&mut self);
}

/// Streaming speech-recognition provider
///
/// `open` hands the provider a channel on which it reports transcripts and
/// stream-lifecycle events for the returned stream.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    async fn open(
        &self,
        events: mpsc::Sender<RecognizerEvent>,
    ) -> Result<Box<dyn RecognizerStream>>;
}
