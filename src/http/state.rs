use crate::enrich::{CompletionProvider, EnrichmentSettings};
use crate::speech::{Recognizer, SpeechSettings};
use std::sync::Arc;

/// Shared application state for HTTP handlers and client connections
#[derive(Clone)]
pub struct AppState {
    /// Streaming speech-recognition provider shared by all connections
    pub recognizer: Arc<dyn Recognizer>,

    /// Text-completion provider shared by all connections
    pub completions: Arc<dyn CompletionProvider>,

    pub speech: SpeechSettings,
    pub enrichment: EnrichmentSettings,
}

impl AppState {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        completions: Arc<dyn CompletionProvider>,
        speech: SpeechSettings,
        enrichment: EnrichmentSettings,
    ) -> Self {
        Self {
            recognizer,
            completions,
            speech,
            enrichment,
        }
    }
}
