//! Request/reply exchange with the instrument.
//!
//! The dispatcher frames each command with the send terminator, collects the
//! reply up to the receive terminator and classifies it. Any reply containing
//! the word "error" (in any case) becomes `UnsupportedCommand`; that is how a
//! firmware's missing commands are detected without a capability table.
//!
//! There are no retries here. The protocol is half-duplex, so every command
//! to one instrument must go through one dispatcher, one at a time.

use crate::error::{LaserError, LaserResult};
use crate::port::{PortError, SerialPortAdapter};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Appended to every command.
pub const SEND_TERMINATOR: &str = "\r";

/// Ends every reply.
pub const RECEIVE_TERMINATOR: &str = "\r\n";

/// Default time allowed for one complete reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(1000);

const READ_CHUNK: usize = 256;
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Owns the transport and performs one command/reply round-trip at a time.
#[derive(Debug)]
pub struct CommandDispatcher {
    port: Box<dyn SerialPortAdapter>,
    send_terminator: String,
    receive_terminator: String,
    reply_timeout: Duration,
    commands_sent: u64,
}

impl CommandDispatcher {
    pub fn new(port: Box<dyn SerialPortAdapter>) -> Self {
        Self {
            port,
            send_terminator: SEND_TERMINATOR.to_string(),
            receive_terminator: RECEIVE_TERMINATOR.to_string(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            commands_sent: 0,
        }
    }

    /// Override the line terminators. Empty terminators are ignored.
    pub fn with_terminators(mut self, send: impl Into<String>, receive: impl Into<String>) -> Self {
        let (send, receive) = (send.into(), receive.into());
        if !send.is_empty() {
            self.send_terminator = send;
        }
        if !receive.is_empty() {
            self.receive_terminator = receive;
        }
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn port_name(&self) -> &str {
        self.port.name()
    }

    /// Number of commands written so far, successful or not.
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Send `command` and return the device's reply.
    ///
    /// # Errors
    ///
    /// - `LaserError::Transport` if the write or read fails or no complete
    ///   reply arrives within the reply timeout
    /// - `LaserError::UnsupportedCommand` if the reply contains "error"
    pub fn send(&mut self, command: &str) -> LaserResult<String> {
        self.port.clear_buffers()?;

        let line = format!("{}{}", command, self.send_terminator);
        self.commands_sent += 1;
        self.port.write_bytes(line.as_bytes())?;

        let reply = self.read_reply()?;
        debug!(port = self.port.name(), command, reply = %reply, "exchange");

        classify(command, reply)
    }

    /// Send `<command> <argument>`, the shape of every parameterised set.
    pub fn send_with_argument(&mut self, command: &str, argument: &str) -> LaserResult<String> {
        self.send(&format!("{} {}", command, argument))
    }

    fn read_reply(&mut self) -> LaserResult<String> {
        let deadline = Instant::now() + self.reply_timeout;
        let terminator = self.receive_terminator.as_bytes();
        let mut received: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match self.port.read_bytes(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    received.extend_from_slice(&chunk[..n]);
                    if let Some(end) = memchr::memmem::find(&received, terminator) {
                        if end + terminator.len() < received.len() {
                            trace!(
                                extra = received.len() - end - terminator.len(),
                                "discarding bytes after reply terminator"
                            );
                        }
                        received.truncate(end);
                        return decode_reply(received);
                    }
                }
                Err(e) if e.is_idle() => {}
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(PortError::timeout(self.reply_timeout).into());
            }
            std::thread::sleep(IDLE_BACKOFF);
        }
    }
}

fn decode_reply(bytes: Vec<u8>) -> LaserResult<String> {
    let reply = String::from_utf8(bytes)
        .map_err(|e| PortError::MalformedReply(format!("reply is not text: {e}")))?;
    Ok(reply.trim().to_string())
}

fn classify(command: &str, reply: String) -> LaserResult<String> {
    if reply.to_ascii_lowercase().contains("error") {
        return Err(LaserError::UnsupportedCommand {
            command: command.to_string(),
            reply,
        });
    }
    Ok(reply)
}
