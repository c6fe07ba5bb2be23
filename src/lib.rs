pub mod config;
pub mod enrich;
pub mod gateway;
pub mod http;
pub mod speech;

pub use config::Config;
pub use enrich::{
    CompletionProvider, ConversationHistory, EnrichmentDispatcher, EnrichmentResult,
    EnrichmentSettings, InputKind, OpenAiCompletions, Parsed,
};
pub use gateway::{ClientMessage, ConnectionState, Controller, ServerMessage};
pub use http::{create_router, AppState};
pub use speech::{
    AudioFrameMessage, NatsRecognizer, Recognizer, RecognizerEvent, RecognizerStream,
    SessionEvent, SessionStats, SpeechSession, SpeechSettings, StatusMessage, TranscriptMessage,
    WriteError,
};
