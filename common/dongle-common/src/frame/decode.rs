use crate::frame::FrameHeader;
use crate::{HEADER_LEN, MAGIC};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum HeaderError {
    #[error("frame is {len} bytes long, shorter than the 4-byte header")]
    Truncated { len: usize },
    #[error("expected magic byte 0x80, found {found:#04x}")]
    BadMagic { found: u8 },
}

impl FrameHeader {
    /// Splits a raw frame into its header and chunk bytes.
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8]), HeaderError> {
        if frame.len() < HEADER_LEN {
            return Err(HeaderError::Truncated { len: frame.len() });
        }
        let (header, chunk) = frame.split_at(HEADER_LEN);
        if header[0] != MAGIC {
            return Err(HeaderError::BadMagic { found: header[0] });
        }
        Ok((
            Self {
                instruction: header[1],
                index: header[2],
                count: header[3],
            },
            chunk,
        ))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum ReassemblyError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("chunk index 0 is not valid, indices start at 1")]
    ZeroIndex,
    #[error("chunk index {index} is beyond chunk count {count}")]
    IndexBeyondCount { index: u8, count: u8 },
    #[error("expected chunk {expected}, received chunk {found}")]
    OutOfOrder { expected: u8, found: u8 },
    #[error("chunk count changed from {expected} to {found} mid-message")]
    CountChanged { expected: u8, found: u8 },
    #[error("instruction changed from {expected:#04x} to {found:#04x} mid-message")]
    InstructionChanged { expected: u8, found: u8 },
    #[error("message exceeds the {limit}-byte buffer")]
    TooLarge { limit: usize },
}

/// A complete message rebuilt from its frames.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    pub instruction: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct Partial {
    instruction: u8,
    count: u8,
    next: u8,
    buffer: Vec<u8>,
}

/// Device-side view of the protocol: chunk 1 starts a fresh message, every chunk is appended,
/// and the message is complete once the chunk index reaches the chunk count.
///
/// Any error discards the partial message; the next valid chunk 1 starts over.
#[derive(Debug, Default)]
pub struct Reassembler {
    limit: Option<usize>,
    partial: Option<Partial>,
}
impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }
    /// Rejects messages longer than `limit` payload bytes, like a fixed device buffer would.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            partial: None,
        }
    }
    /// Returns `true` if some chunks of a message have been received, but not the last one.
    pub fn in_progress(&self) -> bool {
        self.partial.is_some()
    }

    /// Returns `Ok(Some(_))` if `frame` was the last chunk of a message, `Ok(None)` if more chunks
    /// are expected.
    pub fn feed(&mut self, frame: &[u8]) -> Result<Option<Message>, ReassemblyError> {
        let result = self.feed_inner(frame);
        if result.is_err() {
            self.partial = None;
        }
        result
    }

    fn feed_inner(&mut self, frame: &[u8]) -> Result<Option<Message>, ReassemblyError> {
        let (header, chunk) = FrameHeader::parse(frame)?;
        if header.index == 0 {
            return Err(ReassemblyError::ZeroIndex);
        }
        if header.index > header.count {
            return Err(ReassemblyError::IndexBeyondCount {
                index: header.index,
                count: header.count,
            });
        }
        if header.index == 1 {
            if self.partial.is_some() {
                tracing::debug!("[reassembler] chunk 1 received, dropping partial message");
            }
            self.partial = Some(Partial {
                instruction: header.instruction,
                count: header.count,
                next: 1,
                buffer: Vec::new(),
            });
        }
        let Some(partial) = self.partial.as_mut() else {
            return Err(ReassemblyError::OutOfOrder {
                expected: 1,
                found: header.index,
            });
        };
        if header.index != partial.next {
            return Err(ReassemblyError::OutOfOrder {
                expected: partial.next,
                found: header.index,
            });
        }
        if header.count != partial.count {
            return Err(ReassemblyError::CountChanged {
                expected: partial.count,
                found: header.count,
            });
        }
        if header.instruction != partial.instruction {
            return Err(ReassemblyError::InstructionChanged {
                expected: partial.instruction,
                found: header.instruction,
            });
        }
        if let Some(limit) = self.limit {
            if partial.buffer.len() + chunk.len() > limit {
                return Err(ReassemblyError::TooLarge { limit });
            }
        }
        partial.buffer.extend_from_slice(chunk);

        if header.index < header.count {
            partial.next += 1;
            return Ok(None);
        }
        Ok(self.partial.take().map(|p| Message {
            instruction: p.instruction,
            payload: p.buffer,
        }))
    }
}
