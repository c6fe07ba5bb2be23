use crate::enrich::EnrichmentResult;
use serde::{Deserialize, Serialize};

/// Control message received on the client socket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Dispatch enrichment for typed text
    ProcessLlm {
        data: String,
        #[serde(rename = "transcriptId")]
        transcript_id: Option<String>,
    },

    /// Record a typed conversation turn without dispatching
    TextInput { data: String },

    PauseTranscription { pause: bool },

    PauseLlm { pause: bool },

    /// Force-stop the current speech session
    StopStream,

    /// Lazily (re)start the speech session
    StartStream,

    /// Informational client recording indicator
    RecordingState {
        #[serde(rename = "isRecording")]
        is_recording: bool,
    },
}

/// Message sent to the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Partial or final recognition result
    Transcript {
        data: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(rename = "transcriptId", skip_serializing_if = "Option::is_none")]
        transcript_id: Option<String>,
    },

    /// Enrichment result for an earlier final transcript or typed request
    LlmResponse {
        data: EnrichmentResult,
        #[serde(rename = "transcriptId", skip_serializing_if = "Option::is_none")]
        transcript_id: Option<String>,
    },

    /// Recoverable or fatal error notice
    Error {
        message: String,
        timestamp: String,
        #[serde(rename = "transcriptId", skip_serializing_if = "Option::is_none")]
        transcript_id: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>, transcript_id: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            transcript_id,
        }
    }
}
