use super::config::SpeechSettings;
use super::recognizer::{Recognizer, RecognizerEvent, WriteError};
use super::stats::SessionStats;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Maximum absolute amplitude of a 16-bit sample, for level normalization
const MAX_AMPLITUDE: f32 = 32_768.0;

/// Event surfaced by a [`SpeechSession`] to its owner
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Partial { text: String },
    Final {
        text: String,
        confidence: Option<f32>,
    },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Starting,
    Active,
    Bridging,
    Stopped,
}

/// One logical recognition session
///
/// The underlying provider stream may be replaced any number of times
/// (provider duration caps, silence boundaries, write failures) without the
/// owner seeing a gap; a trailing buffer of recent frames reprimes each
/// replacement stream so no audio is lost across the seam.
#[derive(Clone)]
pub struct SpeechSession {
    shared: Arc<Shared>,
}

struct Shared {
    recognizer: Arc<dyn Recognizer>,
    settings: SpeechSettings,
    events: mpsc::Sender<SessionEvent>,

    /// Streams replaced due to provider limits or errors since the last stop
    restarts: AtomicUsize,

    /// Set once the first stream opens; provider errors before that are
    /// suppressed as warm-up noise
    started: AtomicBool,

    /// Bumped whenever the current stream is discarded; event pumps for
    /// older streams observe the change and exit
    generation: AtomicU64,

    /// Bumped on every stop(); in-flight send retries observe it and abandon
    stops: AtomicU64,

    inner: Mutex<Inner>,
}

struct Inner {
    state: StreamState,
    stream: Option<Box<dyn super::recognizer::RecognizerStream>>,

    /// Most recent frames written, replayed into replacement streams
    tail: VecDeque<Vec<u8>>,

    silence_since: Option<Instant>,
    last_was_final: bool,

    /// True until the first frame reaches a freshly opened stream
    priming: bool,
    bridging_offset_ms: f64,
    frames_sent: u64,
}

impl SpeechSession {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        settings: SpeechSettings,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, events_rx) = mpsc::channel(64);

        let session = Self {
            shared: Arc::new(Shared {
                recognizer,
                settings,
                events,
                restarts: AtomicUsize::new(0),
                started: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                stops: AtomicU64::new(0),
                inner: Mutex::new(Inner {
                    state: StreamState::Idle,
                    stream: None,
                    tail: VecDeque::new(),
                    silence_since: None,
                    last_was_final: false,
                    priming: true,
                    bridging_offset_ms: 0.0,
                    frames_sent: 0,
                }),
            }),
        };

        (session, events_rx)
    }

    /// Open the underlying stream. Safe to call repeatedly; an existing
    /// stream is discarded first.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        self.open_stream(&mut inner).await
    }

    /// Release the underlying stream and clear all buffers. The session can
    /// be restarted afterwards, explicitly or by the next frame.
    pub async fn stop(&self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.shared.inner.lock().await;
        inner.state = StreamState::Stopped;
        if let Some(mut stream) = inner.stream.take() {
            stream.close().await;
        }
        inner.tail.clear();
        inner.silence_since = None;
        inner.last_was_final = false;
        inner.priming = true;
        inner.bridging_offset_ms = 0.0;
        self.shared.restarts.store(0, Ordering::SeqCst);

        debug!("speech session stopped");
    }

    pub async fn is_active(&self) -> bool {
        self.shared.inner.lock().await.state == StreamState::Active
    }

    pub async fn stats(&self) -> SessionStats {
        let inner = self.shared.inner.lock().await;
        SessionStats {
            active: inner.state == StreamState::Active,
            restarts: self.shared.restarts.load(Ordering::SeqCst),
            frames_sent: inner.frames_sent,
            bridging_offset_ms: inner.bridging_offset_ms,
            last_was_final: inner.last_was_final,
        }
    }

    /// Queue one audio frame for recognition
    ///
    /// The frame must hold a whole number of 16-bit samples; a trailing odd
    /// byte is dropped. Writes are retried under backpressure with a fixed
    /// delay. The call only gives up when the retry budget is exhausted or
    /// the session is stopped while the frame waits.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        let usable = frame.len() - frame.len() % 2;
        if usable == 0 {
            return Ok(());
        }
        let frame = &frame[..usable];
        let stop_epoch = self.shared.stops.load(Ordering::SeqCst);

        let mut attempts = 0u32;
        loop {
            {
                let mut inner = self.shared.inner.lock().await;

                // A stop that raced this frame wins: the frame is abandoned
                // rather than resurrecting a discarded stream.
                if self.shared.stops.load(Ordering::SeqCst) != stop_epoch {
                    return Ok(());
                }

                if matches!(inner.state, StreamState::Idle | StreamState::Stopped) {
                    if let Err(e) = self.open_stream(&mut inner).await {
                        warn!("recognizer stream start failed: {e:#}");
                    }
                }

                if inner.state == StreamState::Active {
                    let writable = inner
                        .stream
                        .as_ref()
                        .map(|stream| stream.is_writable())
                        .unwrap_or(false);

                    if writable {
                        // May replace the stream under us; the frame then
                        // goes to the replacement.
                        self.update_silence(&mut inner, frame).await;
                        self.note_priming(&mut inner, frame);

                        let outcome = match inner.stream.as_mut() {
                            Some(stream) => stream.write(frame).await,
                            None => Err(WriteError::NotWritable),
                        };
                        match outcome {
                            Ok(()) => {
                                self.push_tail(&mut inner, frame);
                                inner.frames_sent += 1;
                                return Ok(());
                            }
                            Err(WriteError::NotWritable) => {}
                            Err(WriteError::Failed(message)) => {
                                warn!("recognizer write failed, bridging: {message}");
                                self.bridge_locked(&mut inner).await;
                            }
                        }
                    }
                }
            }

            attempts += 1;
            if attempts >= self.shared.settings.max_write_attempts {
                anyhow::bail!("recognizer stream not writable after {attempts} attempts");
            }
            sleep(self.shared.settings.retry_delay).await;
        }
    }

    /// Discard the current stream, open a replacement, and reprime it with
    /// the trailing buffer.
    fn bridge_locked<'a>(
        &'a self,
        inner: &'a mut Inner,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if inner.state == StreamState::Stopped {
                return;
            }
            inner.state = StreamState::Bridging;
            let replay: Vec<Vec<u8>> = inner.tail.iter().cloned().collect();

            if let Err(e) = self.open_stream(inner).await {
                warn!("bridging failed to open a replacement stream: {e:#}");
                return;
            }
            if replay.is_empty() {
                return;
            }

            debug!(frames = replay.len(), "repriming replacement stream");
            for frame in &replay {
                let Some(stream) = inner.stream.as_mut() else {
                    break;
                };
                if let Err(e) = stream.write(frame).await {
                    warn!("failed to replay frame across bridge: {e}");
                    break;
                }
            }
        })
    }

    /// Bridge on behalf of a provider event, unless the stream that produced
    /// the event has already been replaced.
    async fn bridge_if_current(&self, generation: u64) {
        let mut inner = self.shared.inner.lock().await;
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.bridge_locked(&mut inner).await;
    }

    async fn open_stream(&self, inner: &mut Inner) -> Result<()> {
        inner.state = StreamState::Starting;
        if let Some(mut old) = inner.stream.take() {
            old.close().await;
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Per-utterance state resets on every stream, the restart counter
        // does not.
        inner.silence_since = None;
        inner.last_was_final = false;
        inner.priming = true;
        inner.bridging_offset_ms = 0.0;

        let (events_tx, events_rx) = mpsc::channel(64);
        let stream = match self.shared.recognizer.open(events_tx).await {
            Ok(stream) => stream,
            Err(e) => {
                inner.state = StreamState::Idle;
                if self.shared.started.load(Ordering::SeqCst) {
                    self.emit(SessionEvent::Error {
                        message: format!("failed to open recognizer stream: {e:#}"),
                    })
                    .await;
                }
                return Err(e).context("recognizer stream open");
            }
        };
        inner.stream = Some(stream);
        inner.state = StreamState::Active;
        self.shared.started.store(true, Ordering::SeqCst);

        let session = self.clone();
        tokio::spawn(async move { session.pump(generation, events_rx).await });

        Ok(())
    }

    /// Forward provider events for one underlying stream. Exits when the
    /// stream is replaced or its channel closes.
    async fn pump(self, generation: u64, mut events: mpsc::Receiver<RecognizerEvent>) {
        while let Some(event) = events.recv().await {
            if self.shared.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            match event {
                RecognizerEvent::Partial { text } => {
                    self.shared.inner.lock().await.last_was_final = false;
                    self.emit(SessionEvent::Partial { text }).await;
                }
                RecognizerEvent::Final { text, confidence } => {
                    self.shared.inner.lock().await.last_was_final = true;
                    self.emit(SessionEvent::Final { text, confidence }).await;
                }
                RecognizerEvent::StreamLimit => {
                    self.shared.restarts.fetch_add(1, Ordering::SeqCst);
                    debug!("recognizer stream hit its duration limit, bridging");
                    self.bridge_if_current(generation).await;
                    break;
                }
                RecognizerEvent::Error { message } => {
                    warn!("recognizer stream error: {message}");
                    if self.shared.started.load(Ordering::SeqCst) {
                        self.emit(SessionEvent::Error { message }).await;
                    }
                    self.bridge_if_current(generation).await;
                    break;
                }
            }
        }
    }

    /// Mean-amplitude silence detection. Sustained silence with no final for
    /// the current utterance forces an utterance boundary by replacing the
    /// underlying stream.
    async fn update_silence(&self, inner: &mut Inner, frame: &[u8]) {
        let level = frame_level(frame);
        if level < self.shared.settings.silence_threshold {
            match inner.silence_since {
                None => inner.silence_since = Some(Instant::now()),
                Some(since) => {
                    if since.elapsed() > self.shared.settings.silence_window {
                        if !inner.last_was_final {
                            debug!("silence boundary reached, replacing recognizer stream");
                            self.bridge_locked(inner).await;
                        }
                        inner.silence_since = None;
                    }
                }
            }
        } else {
            inner.silence_since = None;
        }
    }

    /// First frame into a fresh stream: clamp the bridging offset against
    /// the chunk duration. Retained as metadata for overlap trimming.
    fn note_priming(&self, inner: &mut Inner, frame: &[u8]) {
        if !inner.priming || inner.tail.is_empty() {
            return;
        }
        let chunk_ms =
            (frame.len() / 2) as f64 * 1000.0 / self.shared.settings.sample_rate as f64;
        if chunk_ms > 0.0 {
            if inner.bridging_offset_ms < 0.0 {
                inner.bridging_offset_ms = 0.0;
            }
            if inner.bridging_offset_ms > chunk_ms {
                inner.bridging_offset_ms = chunk_ms;
            }
            inner.priming = false;
        }
    }

    fn push_tail(&self, inner: &mut Inner, frame: &[u8]) {
        inner.tail.push_back(frame.to_vec());
        while inner.tail.len() > self.shared.settings.tail_frames {
            inner.tail.pop_front();
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if self.shared.events.send(event).await.is_err() {
            debug!("session event receiver dropped");
        }
    }
}

/// Mean absolute sample amplitude of a PCM16LE frame, normalized to 0..=1
pub fn frame_level(pcm: &[u8]) -> f32 {
    let mut sum: u64 = 0;
    let mut samples: u32 = 0;
    for chunk in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        sum += u64::from(sample.unsigned_abs());
        samples += 1;
    }
    if samples == 0 {
        return 0.0;
    }
    (sum as f32 / samples as f32) / MAX_AMPLITUDE
}
