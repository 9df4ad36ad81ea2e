//! Scripted serial port for tests.
//!
//! `MockSerialPort` records every write and serves reads from a byte queue.
//! Replies can be queued up front, or produced per command by a responder
//! closure that sees each complete command line as it is written.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Duration reported by simulated timeouts.
const MOCK_TIMEOUT: Duration = Duration::from_secs(1);

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

struct MockPortState {
    /// Bytes returned by subsequent reads.
    read_queue: VecDeque<u8>,
    /// Every write, verbatim.
    write_log: Vec<Vec<u8>>,
    /// Bytes written since the last command terminator.
    pending_line: Vec<u8>,
    /// Byte that ends a command line for the responder.
    line_terminator: u8,
    /// Appended to every responder reply.
    reply_terminator: String,
    responder: Option<Responder>,
    /// Whether the next read/write should time out.
    should_timeout: bool,
    buffers_cleared: bool,
}

/// Mock serial port.
///
/// # Example
/// ```
/// use laser_remote::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::with_responder("MOCK0", |cmd| match cmd {
///     "gsn?" => Some("12345".to_string()),
///     _ => Some("Syntax error: illegal command".to_string()),
/// });
///
/// port.write_bytes(b"gsn?\r").unwrap();
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"12345\r\n");
/// assert_eq!(port.commands(), vec!["gsn?".to_string()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a mock port with an empty read queue and no responder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                read_queue: VecDeque::new(),
                write_log: Vec::new(),
                pending_line: Vec::new(),
                line_terminator: b'\r',
                reply_terminator: "\r\n".to_string(),
                responder: None,
                should_timeout: false,
                buffers_cleared: false,
            })),
        }
    }

    /// Create a mock port that answers each command line via `responder`.
    ///
    /// Returning `None` from the responder means the device stays silent.
    pub fn with_responder<F>(name: impl Into<String>, responder: F) -> Self
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let port = Self::new(name);
        port.state.lock().responder = Some(Box::new(responder));
        port
    }

    /// Enqueue raw bytes to be returned by subsequent reads.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Enqueue a reply line; the reply terminator is appended.
    pub fn enqueue_reply(&mut self, reply: &str) {
        let mut state = self.state.lock();
        let line = format!("{}{}", reply, state.reply_terminator);
        state.read_queue.extend(line.as_bytes());
    }

    /// Every write, verbatim.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Complete command lines seen so far, terminators stripped.
    pub fn commands(&self) -> Vec<String> {
        let state = self.state.lock();
        let terminator = state.line_terminator as char;
        state
            .write_log
            .iter()
            .map(|w| {
                String::from_utf8_lossy(w)
                    .trim_end_matches(terminator)
                    .to_string()
            })
            .collect()
    }

    pub fn clear_write_log(&mut self) {
        self.state.lock().write_log.clear();
    }

    /// Make the next read or write fail with a timeout.
    pub fn set_should_timeout(&mut self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(MOCK_TIMEOUT));
        }

        state.write_log.push(data.to_vec());

        if state.responder.is_none() {
            return Ok(data.len());
        }

        for &byte in data {
            if byte != state.line_terminator {
                state.pending_line.push(byte);
                continue;
            }
            let line = String::from_utf8_lossy(&state.pending_line).to_string();
            state.pending_line.clear();

            let reply = state.responder.as_mut().and_then(|respond| respond(&line));
            if let Some(reply) = reply {
                let framed = format!("{}{}", reply, state.reply_terminator);
                state.read_queue.extend(framed.as_bytes());
            }
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(MOCK_TIMEOUT));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.pending_line.clear();
        state.buffers_cleared = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
