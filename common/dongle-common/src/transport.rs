use std::io;
use thiserror::Error;

/// Status word of a successful exchange.
pub const SW_OK: u16 = 0x9000;
/// Status word the device answers with when the user declines the on-device prompt.
pub const SW_CONDITIONS_NOT_SATISFIED: u16 = 0x6985;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device disconnected")]
    Disconnected,
    #[error("device busy")]
    Busy,
    #[error("request rejected on the device")]
    Rejected,
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("device answered with status word {0:#06x}")]
    Status(u16),
    #[error("response of {0} bytes is too short to carry a status word")]
    Truncated(usize),
    #[error("I/O error: {0}")]
    Io(io::Error),
    #[error("{0}")]
    Other(String),
}
impl TransportError {
    /// Returns `true` for failures talking to the device, `false` for unclassified ones.
    pub fn is_communication(&self) -> bool {
        !matches!(self, TransportError::Other(_))
    }
}
impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => TransportError::Disconnected,
            io::ErrorKind::WouldBlock => TransportError::Busy,
            io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(e),
        }
    }
}

/// Splits the trailing big-endian status word off `response`, returning the data in front of it
/// if the status word is [`SW_OK`].
pub fn check_status_word(mut response: Vec<u8>) -> Result<Vec<u8>, TransportError> {
    let len = response.len();
    if len < 2 {
        return Err(TransportError::Truncated(len));
    }
    let sw = u16::from_be_bytes([response[len - 2], response[len - 1]]);
    response.truncate(len - 2);
    match sw {
        SW_OK => Ok(response),
        SW_CONDITIONS_NOT_SATISFIED => Err(TransportError::Rejected),
        sw => Err(TransportError::Status(sw)),
    }
}

/// A connection to the device, opened and closed by whoever hands it out.
pub trait Transport {
    /// Sends `frame` and blocks until the device answers.
    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError>;
}
impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word() {
        assert_eq!(
            check_status_word(vec![0x01, 0x02, 0x90, 0x00]).expect("status OK"),
            vec![0x01, 0x02]
        );
        assert!(check_status_word(vec![0x90, 0x00])
            .expect("status OK")
            .is_empty());
        assert!(matches!(
            check_status_word(vec![0x69, 0x85]),
            Err(TransportError::Rejected)
        ));
        assert!(matches!(
            check_status_word(vec![0xaa, 0x6e, 0x00]),
            Err(TransportError::Status(0x6e00))
        ));
        assert!(matches!(
            check_status_word(vec![0x90]),
            Err(TransportError::Truncated(1))
        ));
    }

    #[test]
    fn test_io_classification() {
        let e = TransportError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(e, TransportError::Disconnected));
        let e = TransportError::from(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(e, TransportError::Timeout));
        let e = TransportError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(e, TransportError::Io(_)));
        assert!(e.is_communication());
        assert!(!TransportError::Other("boom".into()).is_communication());
    }
}
