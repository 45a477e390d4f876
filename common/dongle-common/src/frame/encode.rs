use crate::config::{EmptyPayload, SendConfig};
use crate::frame::FrameHeader;
use crate::send::SendError;
use crate::{HEADER_LEN, MAX_CHUNKS};
use core::ops::Range;

/// How a payload of a given length is split up.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChunkPlan {
    count: u8,
    chunk_size: usize,
    payload_len: usize,
}
impl ChunkPlan {
    /// Number of frames that will be sent.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Byte range of the payload carried by the 1-based chunk `index`.
    fn range(&self, index: usize) -> Range<usize> {
        let start = ((index - 1) * self.chunk_size).min(self.payload_len);
        let end = (start + self.chunk_size).min(self.payload_len);
        start..end
    }
}

/// Works out how many frames `payload_len` bytes need, rejecting payloads whose chunk count
/// doesn't fit in the single-byte index and count fields.
pub fn plan_chunks(payload_len: usize, config: &SendConfig) -> Result<ChunkPlan, SendError> {
    if config.chunk_size == 0 {
        return Err(SendError::InvalidChunkSize);
    }
    let chunks = if payload_len == 0 {
        match config.empty_payload {
            EmptyPayload::NoFrames => 0,
            EmptyPayload::HeaderOnly => 1,
        }
    } else {
        payload_len.div_ceil(config.chunk_size)
    };
    if chunks > MAX_CHUNKS {
        return Err(SendError::PayloadTooLarge {
            len: payload_len,
            chunk_size: config.chunk_size,
            chunks,
        });
    }
    Ok(ChunkPlan {
        // chunks <= MAX_CHUNKS
        count: chunks as u8,
        chunk_size: config.chunk_size,
        payload_len,
    })
}

/// A header followed by one chunk of the payload, exactly as it goes on the wire.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Frame {
    bytes: Vec<u8>,
}
impl Frame {
    pub fn new(header: FrameHeader, chunk: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(HEADER_LEN + chunk.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(chunk);
        Self { bytes }
    }
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            instruction: self.bytes[1],
            index: self.bytes[2],
            count: self.bytes[3],
        }
    }
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// Lowercase hex of the whole frame, header included.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// Lazily produces the frames of one message, in index order.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    instruction: u8,
    payload: &'a [u8],
    plan: ChunkPlan,
    next: usize,
}
impl<'a> Frames<'a> {
    pub fn new(instruction: u8, payload: &'a [u8], config: &SendConfig) -> Result<Self, SendError> {
        Ok(Self {
            instruction,
            payload,
            plan: plan_chunks(payload.len(), config)?,
            next: 1,
        })
    }
    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }
}
impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let count = usize::from(self.plan.count);
        if self.next > count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        // index <= count <= 255
        let header = FrameHeader {
            instruction: self.instruction,
            index: index as u8,
            count: self.plan.count,
        };
        Some(Frame::new(header, &self.payload[self.plan.range(index)]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (usize::from(self.plan.count) + 1).saturating_sub(self.next);
        (left, Some(left))
    }
}
impl ExactSizeIterator for Frames<'_> {}

/// Encodes every frame of `payload` up front.
pub fn encode_frames(
    instruction: u8,
    payload: &[u8],
    config: &SendConfig,
) -> Result<Vec<Frame>, SendError> {
    Ok(Frames::new(instruction, payload, config)?.collect())
}
