/// Point-in-time view of a speech session, for logging and tests
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Whether an underlying recognizer stream is currently open
    pub active: bool,

    /// Streams replaced due to provider limits or errors since the last stop
    pub restarts: usize,

    /// Frames written across all underlying streams
    pub frames_sent: u64,

    /// Estimated overlap carried across the last bridge, in milliseconds
    pub bridging_offset_ms: f64,

    /// Whether the most recent transcript for this stream was final
    pub last_was_final: bool,
}
