use dongle_common::transport::{check_status_word, SW_OK};
use dongle_common::{Message, Reassembler, Transport, TransportError};

/// Stand-in for a device: reassembles frames the way the device would and answers [`SW_OK`] to
/// everything that follows the protocol.
#[derive(Debug, Default)]
pub struct Loopback {
    reassembler: Reassembler,
    frames: usize,
    messages: Vec<Message>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }
    /// Number of frames received so far.
    pub fn frames(&self) -> usize {
        self.frames
    }
    /// Messages completed so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

impl Transport for Loopback {
    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.frames += 1;
        match self.reassembler.feed(frame) {
            Ok(Some(message)) => {
                tracing::info!(
                    "[loopback] received message: instruction {:#04x}, {} bytes",
                    message.instruction,
                    message.payload.len()
                );
                tracing::debug!(
                    "[loopback] < {}",
                    String::from_utf8_lossy(&message.payload).trim_end()
                );
                self.messages.push(message);
            }
            Ok(None) => {}
            Err(e) => {
                return Err(TransportError::Other(format!("loopback rejected frame: {e}")));
            }
        }
        check_status_word(SW_OK.to_be_bytes().to_vec())
    }
}
