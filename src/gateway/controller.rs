use super::messages::{ClientMessage, ServerMessage};
use crate::enrich::{CompletionProvider, EnrichmentDispatcher, EnrichmentSettings, InputKind};
use crate::http::AppState;
use crate::speech::{Recognizer, SessionEvent, SpeechSession, SpeechSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Binary frames at or below this size are treated as non-audio noise
pub const MIN_AUDIO_FRAME_BYTES: usize = 100;

/// Pause flags and recording indicator for one connection
///
/// State is confined to the owning connection and the tasks it spawned, so
/// atomics are all the coordination needed.
#[derive(Debug, Default)]
pub struct ConnectionState {
    transcription_paused: AtomicBool,
    enrichment_paused: AtomicBool,
    recording: AtomicBool,
}

impl ConnectionState {
    pub fn transcription_paused(&self) -> bool {
        self.transcription_paused.load(Ordering::SeqCst)
    }

    pub fn set_transcription_paused(&self, paused: bool) {
        self.transcription_paused.store(paused, Ordering::SeqCst);
    }

    pub fn enrichment_paused(&self) -> bool {
        self.enrichment_paused.load(Ordering::SeqCst)
    }

    pub fn set_enrichment_paused(&self, paused: bool) {
        self.enrichment_paused.store(paused, Ordering::SeqCst);
    }

    pub fn recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
    }
}

/// Lazily-built enrichment dispatcher shared between the controller and the
/// transcript pump.
struct EnrichmentContext {
    completions: Arc<dyn CompletionProvider>,
    settings: EnrichmentSettings,
    cell: Mutex<Option<Arc<EnrichmentDispatcher>>>,
}

impl EnrichmentContext {
    async fn dispatcher(&self) -> Arc<EnrichmentDispatcher> {
        let mut cell = self.cell.lock().await;
        if let Some(dispatcher) = cell.as_ref() {
            return dispatcher.clone();
        }
        debug!("creating enrichment dispatcher");
        let dispatcher = Arc::new(EnrichmentDispatcher::new(
            self.completions.clone(),
            self.settings.clone(),
        ));
        *cell = Some(dispatcher.clone());
        dispatcher
    }
}

/// Per-connection supervisor
///
/// Owns one speech session and one enrichment dispatcher (both created
/// lazily), mediates client commands, and mints correlation ids for final
/// transcripts so asynchronous enrichment results can be matched to them.
pub struct Controller {
    recognizer: Arc<dyn Recognizer>,
    speech_settings: SpeechSettings,
    state: Arc<ConnectionState>,
    outbound: mpsc::Sender<ServerMessage>,
    enrichment: Arc<EnrichmentContext>,
    enrichments: Arc<Mutex<Vec<JoinHandle<()>>>>,
    session: Option<SpeechSession>,
    pump: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(app: &AppState, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            recognizer: app.recognizer.clone(),
            speech_settings: app.speech.clone(),
            state: Arc::new(ConnectionState::default()),
            outbound,
            enrichment: Arc::new(EnrichmentContext {
                completions: app.completions.clone(),
                settings: app.enrichment.clone(),
                cell: Mutex::new(None),
            }),
            enrichments: Arc::new(Mutex::new(Vec::new())),
            session: None,
            pump: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Route one binary frame into the speech session. Audio-path failures
    /// are logged, never surfaced to the client.
    pub async fn handle_binary(&mut self, frame: &[u8]) {
        if frame.len() <= MIN_AUDIO_FRAME_BYTES {
            debug!(bytes = frame.len(), "ignoring undersized binary frame");
            return;
        }
        if self.state.transcription_paused() {
            return;
        }

        let session = self.ensure_session();
        if let Err(e) = session.send(frame).await {
            warn!("audio frame not delivered: {e:#}");
        }
    }

    /// Route one text frame. Malformed or unknown messages are logged and
    /// ignored; the connection stays open.
    pub async fn handle_text(&mut self, raw: &str) {
        let message: ClientMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("ignoring malformed control message: {}", e);
                return;
            }
        };
        self.handle_message(message).await;
    }

    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::ProcessLlm {
                data,
                transcript_id,
            } => {
                self.process_typed(data, transcript_id).await;
            }
            ClientMessage::TextInput { data } => {
                self.enrichment.dispatcher().await.record_turn(&data).await;
            }
            ClientMessage::PauseTranscription { pause } => {
                info!("transcription {}", if pause { "paused" } else { "resumed" });
                self.state.set_transcription_paused(pause);
                if pause {
                    if let Some(session) = &self.session {
                        session.stop().await;
                    }
                } else if self.state.recording() {
                    let session = self.ensure_session();
                    if let Err(e) = session.start().await {
                        warn!("failed to restart speech session: {e:#}");
                    }
                }
            }
            ClientMessage::PauseLlm { pause } => {
                info!("enrichment {}", if pause { "paused" } else { "resumed" });
                self.state.set_enrichment_paused(pause);
            }
            ClientMessage::StopStream => {
                if let Some(session) = &self.session {
                    session.stop().await;
                }
            }
            ClientMessage::StartStream => {
                let session = self.ensure_session();
                if let Err(e) = session.start().await {
                    warn!("failed to start speech session: {e:#}");
                }
            }
            ClientMessage::RecordingState { is_recording } => {
                info!(is_recording, "client recording state");
                self.state.set_recording(is_recording);
            }
        }
    }

    /// Connection teardown: stop the speech session, then wait for
    /// outstanding enrichment calls so trailing results finish cleanly.
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        let outstanding: Vec<JoinHandle<()>> = {
            let mut enrichments = self.enrichments.lock().await;
            enrichments.drain(..).collect()
        };
        if !outstanding.is_empty() {
            debug!(
                count = outstanding.len(),
                "waiting for outstanding enrichment calls"
            );
        }
        for handle in outstanding {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("enrichment task panicked: {}", e);
                }
            }
        }
    }

    fn ensure_session(&mut self) -> SpeechSession {
        if let Some(session) = &self.session {
            return session.clone();
        }

        let (session, events) =
            SpeechSession::new(self.recognizer.clone(), self.speech_settings.clone());
        info!("speech session created");

        let pump = tokio::spawn(run_transcript_pump(
            events,
            self.state.clone(),
            self.outbound.clone(),
            self.enrichment.clone(),
            self.enrichments.clone(),
        ));
        self.pump = Some(pump);
        self.session = Some(session.clone());
        session
    }

    async fn process_typed(&mut self, data: String, transcript_id: Option<String>) {
        if self.state.enrichment_paused() {
            debug!("enrichment paused, dropping typed request");
            return;
        }
        if data.trim().is_empty() {
            debug!("empty typed request ignored");
            return;
        }

        let dispatcher = self.enrichment.dispatcher().await;
        let outbound = self.outbound.clone();
        let handle = tokio::spawn(async move {
            let result = dispatcher.process_text(&data, InputKind::Typed).await;
            let message = ServerMessage::LlmResponse {
                data: result,
                transcript_id,
            };
            if outbound.send(message).await.is_err() {
                debug!("client gone before enrichment result delivery");
            }
        });
        let mut enrichments = self.enrichments.lock().await;
        enrichments.retain(|pending| !pending.is_finished());
        enrichments.push(handle);
    }
}

/// Forward speech-session events to the client and fan finalized transcripts
/// out to enrichment without blocking ingestion.
async fn run_transcript_pump(
    mut events: mpsc::Receiver<SessionEvent>,
    state: Arc<ConnectionState>,
    outbound: mpsc::Sender<ServerMessage>,
    enrichment: Arc<EnrichmentContext>,
    enrichments: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Partial { text } => {
                let message = ServerMessage::Transcript {
                    data: text,
                    is_final: false,
                    confidence: None,
                    transcript_id: None,
                };
                if outbound.send(message).await.is_err() {
                    break;
                }
            }
            SessionEvent::Final { text, confidence } => {
                // The correlation id minted here is the only reliable key for
                // matching the asynchronous enrichment result: a newer
                // transcript may well arrive before the result does.
                let transcript_id = uuid::Uuid::new_v4().to_string();
                let message = ServerMessage::Transcript {
                    data: text.clone(),
                    is_final: true,
                    confidence,
                    transcript_id: Some(transcript_id.clone()),
                };
                if outbound.send(message).await.is_err() {
                    break;
                }

                if state.enrichment_paused() || text.trim().is_empty() {
                    continue;
                }
                let dispatcher = enrichment.dispatcher().await;
                let outbound = outbound.clone();
                let handle = tokio::spawn(async move {
                    let result = dispatcher.process_text(&text, InputKind::Voice).await;
                    let message = ServerMessage::LlmResponse {
                        data: result,
                        transcript_id: Some(transcript_id),
                    };
                    if outbound.send(message).await.is_err() {
                        debug!("client gone before enrichment result delivery");
                    }
                });
                let mut pending = enrichments.lock().await;
                pending.retain(|task| !task.is_finished());
                pending.push(handle);
            }
            SessionEvent::Error { message } => {
                let notice =
                    ServerMessage::error(format!("Error processing audio: {message}"), None);
                if outbound.send(notice).await.is_err() {
                    break;
                }
            }
        }
    }
}
