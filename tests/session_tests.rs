use async_trait::async_trait;
use live_scribe::speech::{
    frame_level, Recognizer, RecognizerEvent, RecognizerStream, SessionEvent, SpeechSession,
    SpeechSettings, WriteError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Recognizer double: records every opened stream and its writes, and hands
/// the per-stream event senders to the test.
#[derive(Default)]
struct FakeRecognizer {
    opens: AtomicUsize,
    writes: Mutex<Vec<Arc<Mutex<Vec<Vec<u8>>>>>>,
    events: Mutex<Vec<mpsc::Sender<RecognizerEvent>>>,
    /// While set, streams report not-writable.
    jammed: Arc<AtomicBool>,
}

impl FakeRecognizer {
    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn stream_writes(&self, index: usize) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap()[index].lock().unwrap().clone()
    }

    fn stream_events(&self, index: usize) -> mpsc::Sender<RecognizerEvent> {
        self.events.lock().unwrap()[index].clone()
    }

    fn jam(&self, jammed: bool) {
        self.jammed.store(jammed, Ordering::SeqCst);
    }
}

struct FakeStream {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    jammed: Arc<AtomicBool>,
    closed: bool,
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn open(
        &self,
        events: mpsc::Sender<RecognizerEvent>,
    ) -> anyhow::Result<Box<dyn RecognizerStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let writes = Arc::new(Mutex::new(Vec::new()));
        self.writes.lock().unwrap().push(writes.clone());
        self.events.lock().unwrap().push(events);
        Ok(Box::new(FakeStream {
            writes,
            jammed: self.jammed.clone(),
            closed: false,
        }))
    }
}

#[async_trait]
impl RecognizerStream for FakeStream {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), WriteError> {
        if self.closed || self.jammed.load(Ordering::SeqCst) {
            return Err(WriteError::NotWritable);
        }
        self.writes.lock().unwrap().push(pcm.to_vec());
        Ok(())
    }

    fn is_writable(&self) -> bool {
        !self.closed && !self.jammed.load(Ordering::SeqCst)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

fn settings() -> SpeechSettings {
    SpeechSettings {
        silence_window: Duration::from_millis(50),
        retry_delay: Duration::from_millis(10),
        max_write_attempts: 50,
        tail_frames: 4,
        ..SpeechSettings::default()
    }
}

/// 2048 samples at a clearly audible level
fn loud_frame() -> Vec<u8> {
    (0..2048).flat_map(|_| 2000i16.to_le_bytes()).collect()
}

/// 2048 samples of digital silence
fn silent_frame() -> Vec<u8> {
    vec![0u8; 4096]
}

async fn recv_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("session event channel closed")
}

#[tokio::test]
async fn test_send_starts_session_lazily() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&loud_frame()).await.unwrap();

    assert_eq!(recognizer.opens(), 1);
    assert_eq!(recognizer.stream_writes(0), vec![loud_frame()]);
    assert_eq!(session.stats().await.frames_sent, 1);
}

#[tokio::test]
async fn test_send_restarts_after_stop() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&loud_frame()).await.unwrap();
    session.stop().await;
    session.send(&loud_frame()).await.unwrap();

    assert_eq!(recognizer.opens(), 2);
    assert_eq!(recognizer.stream_writes(1), vec![loud_frame()]);
}

#[tokio::test]
async fn test_frame_retried_until_writable() {
    let recognizer = Arc::new(FakeRecognizer::default());
    recognizer.jam(true);
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    let sender = {
        let session = session.clone();
        tokio::spawn(async move { session.send(&loud_frame()).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(recognizer.stream_writes(0).is_empty());

    recognizer.jam(false);
    sender.await.unwrap().unwrap();
    assert_eq!(recognizer.stream_writes(0), vec![loud_frame()]);
}

#[tokio::test]
async fn test_silence_forces_bridge_with_replay() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&loud_frame()).await.unwrap();
    session.send(&silent_frame()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    session.send(&silent_frame()).await.unwrap();

    assert_eq!(recognizer.opens(), 2);
    // The replacement stream saw the trailing buffer first, then the frame
    // that crossed the silence threshold.
    assert_eq!(
        recognizer.stream_writes(1),
        vec![loud_frame(), silent_frame(), silent_frame()]
    );
    // Silence boundaries are not provider restarts.
    assert_eq!(session.stats().await.restarts, 0);
}

#[tokio::test]
async fn test_stream_limit_bridges_and_replays() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&loud_frame()).await.unwrap();
    session.send(&loud_frame()).await.unwrap();

    recognizer
        .stream_events(0)
        .send(RecognizerEvent::StreamLimit)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(recognizer.opens(), 2);
    assert_eq!(
        recognizer.stream_writes(1),
        vec![loud_frame(), loud_frame()]
    );
    assert_eq!(session.stats().await.restarts, 1);

    // New frames land on the replacement stream.
    session.send(&loud_frame()).await.unwrap();
    assert_eq!(recognizer.stream_writes(1).len(), 3);
}

#[tokio::test]
async fn test_provider_error_surfaces_and_bridges() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, mut events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&loud_frame()).await.unwrap();
    recognizer
        .stream_events(0)
        .send(RecognizerEvent::Error {
            message: "boom".to_string(),
        })
        .await
        .unwrap();

    match recv_event(&mut events).await {
        SessionEvent::Error { message } => assert!(message.contains("boom")),
        other => panic!("expected error event, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recognizer.opens(), 2);
}

#[tokio::test]
async fn test_stop_abandons_pending_retries() {
    let recognizer = Arc::new(FakeRecognizer::default());
    recognizer.jam(true);
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    let sender = {
        let session = session.clone();
        tokio::spawn(async move { session.send(&loud_frame()).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    session.stop().await;

    // The queued retry observes the stop and gives up without writing.
    sender.await.unwrap().unwrap();
    assert_eq!(recognizer.opens(), 1);
    assert!(recognizer.stream_writes(0).is_empty());
    assert!(!session.stats().await.active);
}

#[tokio::test]
async fn test_partials_and_final_flow_in_order() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, mut events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&loud_frame()).await.unwrap();
    let stream_events = recognizer.stream_events(0);
    stream_events
        .send(RecognizerEvent::Partial {
            text: "he".to_string(),
        })
        .await
        .unwrap();
    stream_events
        .send(RecognizerEvent::Partial {
            text: "hello".to_string(),
        })
        .await
        .unwrap();
    stream_events
        .send(RecognizerEvent::Final {
            text: "hello world".to_string(),
            confidence: Some(0.92),
        })
        .await
        .unwrap();

    match recv_event(&mut events).await {
        SessionEvent::Partial { text } => assert_eq!(text, "he"),
        other => panic!("expected partial, got {:?}", other),
    }
    match recv_event(&mut events).await {
        SessionEvent::Partial { text } => assert_eq!(text, "hello"),
        other => panic!("expected partial, got {:?}", other),
    }
    match recv_event(&mut events).await {
        SessionEvent::Final { text, confidence } => {
            assert_eq!(text, "hello world");
            assert_eq!(confidence, Some(0.92));
        }
        other => panic!("expected final, got {:?}", other),
    }

    assert!(session.stats().await.last_was_final);
}

#[tokio::test]
async fn test_odd_trailing_byte_dropped() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let (session, _events) = SpeechSession::new(recognizer.clone(), settings());

    session.send(&[10, 0, 10, 0, 7]).await.unwrap();

    let writes = recognizer.stream_writes(0);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0], vec![10, 0, 10, 0]);
}

#[test]
fn test_frame_level_silence() {
    assert_eq!(frame_level(&[0u8; 4096]), 0.0);
    assert_eq!(frame_level(&[]), 0.0);
}

#[test]
fn test_frame_level_normalizes_amplitude() {
    let frame: Vec<u8> = (0..2048).flat_map(|_| 3277i16.to_le_bytes()).collect();
    let level = frame_level(&frame);
    assert!((level - 0.1).abs() < 0.001, "level was {}", level);
}
