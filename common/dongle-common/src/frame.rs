//! Frame format:
//! ```txt
//! | HEADER                                | CHUNK                     |
//! | magic | instruction | index  | count  | payload bytes             |
//! | 0x80  | caller tag  | 1-based| total  | at most `chunk_size`      |
//!   +0:1  | +1:1        | +2:1   | +3:1   | +4:(chunk length)
//! ```
//! `count` is identical in every frame of a message, and `index` runs from 1 to `count`.

/// Header of a single frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameHeader {
    pub instruction: u8,
    pub index: u8,
    pub count: u8,
}
impl FrameHeader {
    pub fn to_bytes(&self) -> [u8; crate::HEADER_LEN] {
        [crate::MAGIC, self.instruction, self.index, self.count]
    }
}

/// Rebuilds messages from a stream of frames.
mod decode;
pub use decode::{HeaderError, Message, Reassembler, ReassemblyError};

/// Splits a payload into frames.
mod encode;
pub use encode::{encode_frames, plan_chunks, ChunkPlan, Frame, Frames};
