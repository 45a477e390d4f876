use crate::DEFAULT_CHUNK_SIZE;
use std::fmt::{Display, Formatter};

/// What to put on the wire when the payload is empty.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum EmptyPayload {
    /// Send nothing at all.
    #[default]
    NoFrames,
    /// Send a single `80 ii 01 01` frame with no chunk bytes.
    HeaderOnly,
}
impl Display for EmptyPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyPayload::NoFrames => write!(f, "no-frames"),
            EmptyPayload::HeaderOnly => write!(f, "header-only"),
        }
    }
}

/// What to do with the remaining chunks once an exchange has failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnFailure {
    /// Keep sending; every chunk is attempted exactly once.
    #[default]
    Continue,
    /// Stop at the first failed chunk and report the rest as skipped.
    Abort,
}
impl Display for OnFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OnFailure::Continue => write!(f, "continue"),
            OnFailure::Abort => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SendConfig {
    /// Maximum number of payload bytes per frame. Must be at least 1.
    pub chunk_size: usize,
    pub empty_payload: EmptyPayload,
    pub on_failure: OnFailure,
}
impl Default for SendConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            empty_payload: EmptyPayload::default(),
            on_failure: OnFailure::default(),
        }
    }
}
impl SendConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
    pub fn with_empty_payload(mut self, empty_payload: EmptyPayload) -> Self {
        self.empty_payload = empty_payload;
        self
    }
    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }
}
