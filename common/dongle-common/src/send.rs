use crate::config::{OnFailure, SendConfig};
use crate::frame::{FrameHeader, Frames};
use crate::transport::{Transport, TransportError};
use thiserror::Error;

/// Reasons a message is refused before anything is sent.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum SendError {
    #[error("payload too large: {len} bytes in chunks of {chunk_size} needs {chunks} frames, at most 255 fit")]
    PayloadTooLarge {
        len: usize,
        chunk_size: usize,
        chunks: usize,
    },
    #[error("chunk size must be at least 1 byte")]
    InvalidChunkSize,
}

#[derive(Debug)]
pub enum ChunkOutcome {
    /// The device answered; `response` is whatever the transport returned.
    Delivered { response: Vec<u8> },
    Failed(TransportError),
    /// Never attempted because an earlier chunk failed under [`OnFailure::Abort`].
    Skipped,
}
impl ChunkOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ChunkOutcome::Delivered { .. })
    }
    pub fn response(&self) -> Option<&[u8]> {
        match self {
            ChunkOutcome::Delivered { response } => Some(response),
            _ => None,
        }
    }
    pub fn error(&self) -> Option<&TransportError> {
        match self {
            ChunkOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ChunkReport {
    /// 1-based chunk index.
    pub index: u8,
    pub count: u8,
    pub outcome: ChunkOutcome,
}

/// Per-chunk outcomes of one [`send`], in index order. Every planned chunk has an entry.
#[derive(Debug)]
pub struct SendReport {
    pub instruction: u8,
    pub payload_len: usize,
    pub chunks: Vec<ChunkReport>,
    /// Set if [`OnFailure::Abort`] cut the message short.
    pub aborted: bool,
}
impl SendReport {
    /// Returns `true` if every chunk was delivered. A message with no chunks counts as delivered.
    pub fn is_success(&self) -> bool {
        self.chunks.iter().all(|c| c.outcome.is_delivered())
    }
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
    pub fn delivered(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.outcome.is_delivered())
            .count()
    }
    pub fn failures(&self) -> impl Iterator<Item = &ChunkReport> {
        self.chunks
            .iter()
            .filter(|c| matches!(c.outcome, ChunkOutcome::Failed(_)))
    }
    pub fn first_failure(&self) -> Option<&ChunkReport> {
        self.failures().next()
    }
    pub fn responses(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().filter_map(|c| c.outcome.response())
    }
}

/// Frames `payload` and exchanges the frames over `transport` one at a time.
///
/// Fails only if the payload cannot be framed; in that case nothing has been sent. Transport
/// failures are logged and recorded per chunk in the returned [`SendReport`].
pub fn send<T: Transport + ?Sized>(
    transport: &mut T,
    instruction: u8,
    payload: &[u8],
    config: &SendConfig,
) -> Result<SendReport, SendError> {
    send_with_progress(transport, instruction, payload, config, |_| {})
}

/// Like [`send`], calling `on_chunk` after each chunk has been handled.
pub fn send_with_progress<T, F>(
    transport: &mut T,
    instruction: u8,
    payload: &[u8],
    config: &SendConfig,
    mut on_chunk: F,
) -> Result<SendReport, SendError>
where
    T: Transport + ?Sized,
    F: FnMut(&ChunkReport),
{
    let frames = Frames::new(instruction, payload, config)?;
    tracing::debug!(
        "[send] instruction {instruction:#04x}: {} bytes in {} chunk(s)",
        payload.len(),
        frames.plan().count()
    );

    let mut chunks = Vec::with_capacity(frames.len());
    let mut aborted = false;
    for frame in frames {
        let FrameHeader { index, count, .. } = frame.header();
        let outcome = if aborted {
            ChunkOutcome::Skipped
        } else {
            tracing::debug!("> [{index}/{count}] {}", frame.to_hex());
            match transport.exchange(frame.as_bytes()) {
                Ok(response) => {
                    tracing::trace!("< [{index}/{count}] {}", hex::encode(&response));
                    ChunkOutcome::Delivered { response }
                }
                Err(e) => {
                    tracing::error!("[send] chunk {index}/{count} failed: {e}");
                    if config.on_failure == OnFailure::Abort && index < count {
                        tracing::warn!("[send] aborting, {} chunk(s) left unsent", count - index);
                        aborted = true;
                    }
                    ChunkOutcome::Failed(e)
                }
            }
        };
        let report = ChunkReport {
            index,
            count,
            outcome,
        };
        on_chunk(&report);
        chunks.push(report);
    }

    Ok(SendReport {
        instruction,
        payload_len: payload.len(),
        chunks,
        aborted,
    })
}

/// A transport paired with the config used for every message sent through it.
#[derive(Debug)]
pub struct Sender<T> {
    transport: T,
    config: SendConfig,
}
impl<T: Transport> Sender<T> {
    pub fn new(transport: T, config: SendConfig) -> Self {
        Self { transport, config }
    }
    pub fn into_inner(self) -> T {
        self.transport
    }
    pub fn send(&mut self, instruction: u8, payload: &[u8]) -> Result<SendReport, SendError> {
        send(&mut self.transport, instruction, payload, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmptyPayload;
    use crate::frame::Reassembler;

    /// Records every frame and fails the calls listed in `fail_on` (1-based).
    #[derive(Default)]
    struct Recorder {
        frames: Vec<Vec<u8>>,
        fail_on: Vec<usize>,
    }
    impl Transport for Recorder {
        fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
            self.frames.push(frame.to_vec());
            let call = self.frames.len();
            if self.fail_on.contains(&call) {
                Err(TransportError::Disconnected)
            } else {
                Ok(vec![call as u8])
            }
        }
    }

    #[test]
    fn test_send_two_frames() {
        let mut transport = Recorder::default();
        let payload = vec![0x41; 500];
        let report = send(&mut transport, 1, &payload, &SendConfig::default())
            .expect("500 bytes fit");
        assert!(report.is_success());
        assert_eq!(report.len(), 2);
        assert_eq!(transport.frames.len(), 2);
        assert_eq!(&transport.frames[0][..4], &[0x80, 0x01, 0x01, 0x02]);
        assert_eq!(&transport.frames[0][4..], &payload[..250]);
        assert_eq!(&transport.frames[1][..4], &[0x80, 0x01, 0x02, 0x02]);
        assert_eq!(&transport.frames[1][4..], &payload[250..]);
        let responses: Vec<&[u8]> = report.responses().collect();
        assert_eq!(responses, vec![&[1u8][..], &[2u8][..]]);
    }

    #[test]
    fn test_send_empty_payload() {
        let mut transport = Recorder::default();
        let report = send(&mut transport, 1, &[], &SendConfig::default()).expect("empty is fine");
        assert!(report.is_empty());
        assert!(report.is_success());
        assert!(transport.frames.is_empty());

        let config = SendConfig::default().with_empty_payload(EmptyPayload::HeaderOnly);
        let report = send(&mut transport, 1, &[], &config).expect("empty is fine");
        assert_eq!(report.len(), 1);
        assert_eq!(transport.frames, vec![vec![0x80, 0x01, 0x01, 0x01]]);
    }

    #[test]
    fn test_send_too_large_sends_nothing() {
        let mut transport = Recorder::default();
        let payload = vec![0u8; 255 * 250 + 1];
        let err = send(&mut transport, 1, &payload, &SendConfig::default())
            .expect_err("256 chunks do not fit");
        assert!(matches!(err, SendError::PayloadTooLarge { chunks: 256, .. }));
        assert!(transport.frames.is_empty());
    }

    /// Test that a failed chunk does not stop the remaining chunks
    #[test]
    fn test_send_continues_after_failure() {
        let mut transport = Recorder {
            fail_on: vec![1],
            ..Default::default()
        };
        let config = SendConfig::default().with_chunk_size(10);
        let report = send(&mut transport, 1, &[7u8; 30], &config).expect("fits");
        assert_eq!(transport.frames.len(), 3);
        assert!(!report.is_success());
        assert!(!report.aborted);
        assert!(matches!(
            report.chunks[0].outcome,
            ChunkOutcome::Failed(TransportError::Disconnected)
        ));
        assert!(report.chunks[1].outcome.is_delivered());
        assert!(report.chunks[2].outcome.is_delivered());
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.first_failure().map(|c| c.index), Some(1));
    }

    #[test]
    fn test_send_aborts_after_failure() {
        let mut transport = Recorder {
            fail_on: vec![2],
            ..Default::default()
        };
        let config = SendConfig::default()
            .with_chunk_size(10)
            .with_on_failure(OnFailure::Abort);
        let report = send(&mut transport, 1, &[7u8; 40], &config).expect("fits");
        assert_eq!(transport.frames.len(), 2);
        assert!(report.aborted);
        assert_eq!(report.len(), 4);
        assert!(report.chunks[0].outcome.is_delivered());
        assert!(report.chunks[1].outcome.error().is_some());
        assert!(matches!(report.chunks[2].outcome, ChunkOutcome::Skipped));
        assert!(matches!(report.chunks[3].outcome, ChunkOutcome::Skipped));
        assert_eq!(report.failures().count(), 1);
    }

    /// Test that a failure on the last chunk under Abort leaves nothing to cut short
    #[test]
    fn test_send_abort_on_last_chunk() {
        let mut transport = Recorder {
            fail_on: vec![2],
            ..Default::default()
        };
        let config = SendConfig::default()
            .with_chunk_size(10)
            .with_on_failure(OnFailure::Abort);
        let report = send(&mut transport, 1, &[7u8; 20], &config).expect("fits");
        assert_eq!(transport.frames.len(), 2);
        assert!(!report.aborted);
        assert!(!report.is_success());
        assert!(report.chunks[1].outcome.error().is_some());
        assert!(!report
            .chunks
            .iter()
            .any(|c| matches!(c.outcome, ChunkOutcome::Skipped)));
    }

    #[test]
    fn test_send_progress_in_order() {
        let mut transport = Recorder::default();
        let mut seen = vec![];
        send_with_progress(
            &mut transport,
            3,
            &[0u8; 1000],
            &SendConfig::default(),
            |chunk| seen.push((chunk.index, chunk.count)),
        )
        .expect("fits");
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_sender_round_trip() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(777).collect();
        let mut sender = Sender::new(Recorder::default(), SendConfig::default());
        let report = sender.send(0x10, &payload).expect("fits");
        assert!(report.is_success());

        let mut reassembler = Reassembler::new();
        let mut message = None;
        for frame in &sender.into_inner().frames {
            message = reassembler.feed(frame).expect("valid frame");
        }
        let message = message.expect("complete");
        assert_eq!(message.instruction, 0x10);
        assert_eq!(message.payload, payload);
    }
}
