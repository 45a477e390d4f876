//! Chunked message framing shared by the `dongle-send` host tool and anything else that needs to
//! push an oversized payload through a request/response device transport.
//!
//! A payload is split into chunks of at most [`SendConfig::chunk_size`] bytes, and each chunk is
//! prefixed with a 4-byte header (see [`frame`]) before being handed to a [`Transport`].

/// First byte of every frame.
pub const MAGIC: u8 = 0x80;

/// Length of the header in front of every chunk.
pub const HEADER_LEN: usize = 4;

/// Number of payload bytes carried per frame unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// Chunk index and chunk count are each a single byte on the wire.
pub const MAX_CHUNKS: usize = u8::MAX as usize;

/// Send policies.
pub mod config;
/// Frame encoding and decoding, for both sides.
pub mod frame;
/// Sending a framed message over a transport.
pub mod send;
/// The exchange capability supplied by the device connection layer.
pub mod transport;

pub use config::{EmptyPayload, OnFailure, SendConfig};
pub use frame::{encode_frames, plan_chunks, ChunkPlan, Frame, FrameHeader, Frames};
pub use frame::{HeaderError, Message, Reassembler, ReassemblyError};
pub use send::{send, send_with_progress, ChunkOutcome, ChunkReport, SendError, SendReport, Sender};
pub use transport::{Transport, TransportError};
