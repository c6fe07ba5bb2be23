//! Client-facing ingress
//!
//! One persistent WebSocket per client carries binary audio frames and JSON
//! control messages. A per-connection controller supervises the speech
//! session and the enrichment dispatcher and correlates asynchronous
//! enrichment results back to the transcript that triggered them.

mod connection;
mod controller;
mod messages;

pub use connection::run_connection;
pub use controller::{ConnectionState, Controller, MIN_AUDIO_FRAME_BYTES};
pub use messages::{ClientMessage, ServerMessage};
