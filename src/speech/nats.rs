use super::recognizer::{Recognizer, RecognizerEvent, RecognizerStream, WriteError};
use anyhow::{Context, Result};
use base64::Engine;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Status code the recognizer service publishes when it closes a stream at
/// its duration cap.
const STATUS_MAX_DURATION: &str = "max_duration";

/// Audio frame published to the recognizer service
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub stream_id: String,
    pub sequence: u32,
    pub pcm: String,  // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String,  // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript received from the recognizer service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub stream_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    pub confidence: Option<f32>,
}

/// Stream-lifecycle notice received from the recognizer service
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub stream_id: String,
    pub code: String,
    pub message: Option<String>,
}

/// Streaming recognizer reached over NATS: PCM frames out, transcript and
/// status events back, one subject pair per stream.
pub struct NatsRecognizer {
    client: async_nats::Client,
    sample_rate: u32,
    channels: u16,
}

impl NatsRecognizer {
    /// Connect to the recognizer's NATS server
    pub async fn connect(url: &str, sample_rate: u32, channels: u16) -> Result<Self> {
        info!("Connecting to recognizer NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            sample_rate,
            channels,
        })
    }
}

#[async_trait::async_trait]
impl Recognizer for NatsRecognizer {
    async fn open(
        &self,
        events: mpsc::Sender<RecognizerEvent>,
    ) -> Result<Box<dyn RecognizerStream>> {
        let stream_id = uuid::Uuid::new_v4().to_string();

        let transcripts = self
            .client
            .subscribe(format!("stt.text.{stream_id}"))
            .await
            .context("Failed to subscribe to transcripts")?;
        let statuses = self
            .client
            .subscribe(format!("stt.status.{stream_id}"))
            .await
            .context("Failed to subscribe to stream status")?;

        let transcript_task = tokio::spawn(pump_transcripts(
            transcripts,
            stream_id.clone(),
            events.clone(),
        ));
        let status_task = tokio::spawn(pump_statuses(statuses, stream_id.clone(), events));

        debug!("opened recognizer stream {}", stream_id);

        Ok(Box::new(NatsStream {
            client: self.client.clone(),
            subject: format!("audio.frame.{stream_id}"),
            stream_id,
            sample_rate: self.sample_rate,
            channels: self.channels,
            sequence: 0,
            closed: false,
            tasks: vec![transcript_task, status_task],
        }))
    }
}

async fn pump_transcripts(
    mut sub: async_nats::Subscriber,
    stream_id: String,
    events: mpsc::Sender<RecognizerEvent>,
) {
    while let Some(msg) = sub.next().await {
        let transcript: TranscriptMessage = match serde_json::from_slice(&msg.payload) {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!("Failed to parse transcript message: {}", e);
                continue;
            }
        };

        // Filter by stream_id
        if transcript.stream_id != stream_id {
            continue;
        }

        let event = if transcript.partial {
            RecognizerEvent::Partial {
                text: transcript.text,
            }
        } else {
            RecognizerEvent::Final {
                text: transcript.text,
                confidence: transcript.confidence,
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

async fn pump_statuses(
    mut sub: async_nats::Subscriber,
    stream_id: String,
    events: mpsc::Sender<RecognizerEvent>,
) {
    while let Some(msg) = sub.next().await {
        let status: StatusMessage = match serde_json::from_slice(&msg.payload) {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to parse status message: {}", e);
                continue;
            }
        };

        if status.stream_id != stream_id {
            continue;
        }

        let event = if status.code == STATUS_MAX_DURATION {
            RecognizerEvent::StreamLimit
        } else {
            RecognizerEvent::Error {
                message: status
                    .message
                    .unwrap_or_else(|| format!("recognizer status {}", status.code)),
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

struct NatsStream {
    client: async_nats::Client,
    subject: String,
    stream_id: String,
    sample_rate: u32,
    channels: u16,
    sequence: u32,
    closed: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl NatsStream {
    fn frame_message(&self, pcm: &[u8], final_frame: bool) -> AudioFrameMessage {
        AudioFrameMessage {
            stream_id: self.stream_id.clone(),
            sequence: self.sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm),
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame,
        }
    }
}

#[async_trait::async_trait]
impl RecognizerStream for NatsStream {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::NotWritable);
        }

        let message = self.frame_message(pcm, false);
        let payload =
            serde_json::to_vec(&message).map_err(|e| WriteError::Failed(e.to_string()))?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| WriteError::Failed(e.to_string()))?;

        self.sequence += 1;
        Ok(())
    }

    fn is_writable(&self) -> bool {
        !self.closed
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Empty frame flagged final tells the recognizer the stream is done.
        let message = self.frame_message(&[], true);
        if let Ok(payload) = serde_json::to_vec(&message) {
            if let Err(e) = self.client.publish(self.subject.clone(), payload.into()).await {
                warn!("Failed to send final frame: {}", e);
            }
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for NatsStream {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
