use dongle_common::transport::{check_status_word, Transport, TransportError};
use eyre::{eyre, Result, WrapErr};
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices,
};
use std::ffi::c_int;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Once the device has started answering, the response is over when the line stays quiet this
/// long.
const IDLE_GAP: Duration = Duration::from_millis(20);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A serial line to a bridge that forwards each frame to the dongle and writes back the
/// response followed by its status word.
pub struct Tty {
    file: File,
    path: PathBuf,
    timeout: Duration,
}

impl Tty {
    pub fn new<P: AsRef<Path>>(path: P, baud: u32) -> Result<Self> {
        let path = path.as_ref();
        // don't block on open waiting for carrier
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)
            .wrap_err_with(|| eyre!("failed to open {}", path.display()))?;
        let mut this = Self {
            file,
            path: path.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        };
        this.set_blocking()
            .wrap_err_with(|| eyre!("failed to clear O_NONBLOCK on {}", path.display()))?;
        this.configure(baud)?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn set_blocking(&mut self) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Raw 8N1, no flow control, reads never block.
    fn configure(&mut self, baud: u32) -> Result<()> {
        let speed = baud_rate(baud).ok_or_else(|| eyre!("unsupported baud rate {baud}"))?;
        let mut tios = termios::tcgetattr(&self.file).wrap_err("failed to tcgetattr")?;

        termios::cfmakeraw(&mut tios);
        tios.input_flags |= InputFlags::IGNBRK;
        tios.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
        tios.control_flags &=
            !(ControlFlags::PARENB | ControlFlags::CSTOPB | ControlFlags::CRTSCTS);
        // enable receiver & ignore modem control lines
        tios.control_flags |= ControlFlags::CS8 | ControlFlags::CREAD | ControlFlags::CLOCAL;
        // poll() does the waiting
        tios.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tios.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        termios::cfsetspeed(&mut tios, speed).wrap_err("failed to set baud rate")?;
        termios::tcsetattr(&self.file, SetArg::TCSADRAIN, &tios)
            .wrap_err("failed to tcsetattr")?;
        termios::tcflush(&self.file, FlushArg::TCIOFLUSH).wrap_err("failed to flush")?;
        Ok(())
    }

    /// Returns `Ok(false)` if nothing arrived within `timeout`.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
        loop {
            let r = unsafe { libc::poll(&mut pfd, 1, millis) };
            if r < 0 {
                let e = io::Error::last_os_error();
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }
            if r == 0 {
                return Ok(false);
            }
            if pfd.revents & libc::POLLIN != 0 {
                return Ok(true);
            }
            // POLLHUP, POLLERR or POLLNVAL with nothing left to read
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device hung up"));
        }
    }

    fn read_response(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut response = vec![];
        let mut buf = [0u8; 512];
        let mut wait = self.timeout;
        loop {
            if !self.wait_readable(wait).map_err(classify_io)? {
                if response.is_empty() {
                    return Err(TransportError::Timeout);
                }
                return Ok(response);
            }
            let n = self.file.read(&mut buf).map_err(classify_io)?;
            if n == 0 {
                // readable but empty: the other end is gone
                return Err(TransportError::Disconnected);
            }
            response.extend_from_slice(&buf[..n]);
            wait = IDLE_GAP;
        }
    }
}

impl Transport for Tty {
    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.file.write_all(frame).map_err(classify_io)?;
        termios::tcdrain(&self.file).map_err(|e| classify_io(e.into()))?;
        let response = self.read_response()?;
        tracing::trace!("[tty] < {}", hex::encode(&response));
        check_status_word(response)
    }
}

/// Maps errno values a vanished or contended device produces before falling back to the
/// [`io::ErrorKind`] mapping.
fn classify_io(e: io::Error) -> TransportError {
    match e.raw_os_error() {
        Some(libc::ENODEV | libc::ENXIO | libc::EIO) => TransportError::Disconnected,
        Some(libc::EBUSY) => TransportError::Busy,
        _ => TransportError::from(e),
    }
}

fn baud_rate(baud: u32) -> Option<BaudRate> {
    Some(match baud {
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        #[cfg(target_os = "linux")]
        460800 => BaudRate::B460800,
        #[cfg(target_os = "linux")]
        921600 => BaudRate::B921600,
        _ => return None,
    })
}
