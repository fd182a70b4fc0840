//! One connection to the QEMU human monitor.
//!
//! A session walks a fixed path and never goes back:
//!
//! ```text
//! Connecting -> AwaitingBanner -> Active(n) -> Closing -> Closed
//! ```
//!
//! The monitor prints a greeting and a `(qemu)` prompt as soon as a client
//! connects. `read_banner` drains that once so the first command does not
//! race the greeting. After that the caller alternates `send_command` and,
//! where it wants pacing, `read_pacing`. `close` half-closes the write side
//! so the monitor sees end of input, then releases the socket.
//!
//! Pacing reads are advisory. A pacing read that times out reports
//! `ReadOutcome::Cancelled` and the exchange carries on; any other failure
//! (reset, hangup) is fatal. Timeouts anywhere else are fatal too.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::{debug, warn};

use super::telnet;
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};

/// Byte stream a session can run over.
pub trait MonitorStream: Read + Write {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Signal end of output while keeping the read side open.
    fn shutdown_write(&mut self) -> io::Result<()>;
}

impl MonitorStream for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown_write(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingBanner,
    /// Number of command lines sent so far.
    Active(usize),
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::AwaitingBanner => f.write_str("awaiting banner"),
            SessionState::Active(n) => write!(f, "active ({} sent)", n),
            SessionState::Closing => f.write_str("closing"),
            SessionState::Closed => f.write_str("closed"),
        }
    }
}

/// Result of an advisory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes drained from the monitor.
    Data(usize),
    /// The read was abandoned before anything arrived.
    Cancelled,
}

/// An open monitor connection.
pub struct MonitorSession<S: MonitorStream = TcpStream> {
    stream: Option<S>,
    state: SessionState,
    banner_timeout: Duration,
    pacing_timeout: Duration,
    banner_limit: usize,
    pacing_limit: usize,
}

impl MonitorSession<TcpStream> {
    /// Connect to the monitor named in `config`.
    ///
    /// Every resolved address is tried in turn; the error from the last
    /// attempt is reported if none accept.
    pub fn open(config: &MonitorConfig) -> Result<Self> {
        let address = config.monitor_address()?;
        debug!(%address, state = %SessionState::Connecting, "connecting to monitor");

        let mut last_err = None;
        for addr in address.resolve()? {
            match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_write_timeout(Some(config.write_timeout))
                        .map_err(|e| MonitorError::connection("configuring socket", e))?;
                    // sendkey lines are tiny, don't let Nagle hold them back
                    stream
                        .set_nodelay(true)
                        .map_err(|e| MonitorError::connection("configuring socket", e))?;
                    debug!(%addr, "connected");
                    return Ok(Self::from_stream(stream, config));
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(MonitorError::connection(
            format!("connecting to {}", address),
            last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)),
        ))
    }
}

impl<S: MonitorStream> MonitorSession<S> {
    /// Wrap an already connected stream.
    pub fn from_stream(stream: S, config: &MonitorConfig) -> Self {
        Self {
            stream: Some(stream),
            state: SessionState::AwaitingBanner,
            banner_timeout: config.banner_timeout,
            pacing_timeout: config.pacing_timeout,
            banner_limit: config.banner_limit,
            pacing_limit: config.pacing_limit,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drain the monitor's greeting. Content is only logged.
    pub fn read_banner(&mut self) -> Result<()> {
        self.expect(SessionState::AwaitingBanner)?;
        let (timeout, limit) = (self.banner_timeout, self.banner_limit);
        let stream = self.stream_mut()?;

        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| MonitorError::connection("configuring socket", e))?;

        let mut buf = vec![0u8; limit];
        let n = stream
            .read(&mut buf)
            .map_err(|e| MonitorError::connection("reading monitor banner", e))?;
        if n == 0 {
            return Err(MonitorError::closed("reading monitor banner"));
        }

        debug!(bytes = n, banner = %telnet::printable(&buf[..n]), "got banner");
        self.transition(SessionState::Active(0));
        Ok(())
    }

    /// Write one command line. The trailing newline is added here.
    ///
    /// The command must be printable ASCII: a line break inside it would let
    /// the monitor run whatever follows as a second command.
    pub fn send_command(&mut self, command: &str) -> Result<()> {
        let sent = self.active_count()?;
        check_command_line(command)?;
        let stream = self.stream_mut()?;

        debug!(command, "sending");
        let line = format!("{}\n", command);
        stream
            .write_all(line.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|e| MonitorError::connection(format!("writing '{}'", command), e))?;

        self.transition(SessionState::Active(sent + 1));
        Ok(())
    }

    /// Read whatever the monitor echoed, giving up after the pacing timeout.
    ///
    /// A timed out or interrupted read is `Cancelled`, not an error. End of
    /// stream and every other read error abort the session.
    pub fn read_pacing(&mut self) -> Result<ReadOutcome> {
        self.active_count()?;
        let (timeout, limit) = (self.pacing_timeout, self.pacing_limit);
        let stream = self.stream_mut()?;

        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| MonitorError::connection("configuring socket", e))?;

        let mut buf = vec![0u8; limit];
        match stream.read(&mut buf) {
            Ok(0) => Err(MonitorError::closed("reading monitor response")),
            Ok(n) => {
                debug!(bytes = n, data = %telnet::printable(&buf[..n]), "got data");
                Ok(ReadOutcome::Data(n))
            }
            Err(e) if is_cancellation(&e) => {
                debug!(error = %e, "read cancelled");
                Ok(ReadOutcome::Cancelled)
            }
            Err(e) => Err(MonitorError::connection("reading monitor response", e)),
        }
    }

    /// Half-close the write side and release the transport.
    pub fn close(mut self) -> Result<()> {
        self.active_count()?;
        self.transition(SessionState::Closing);

        let result = match self.stream_mut()?.shutdown_write() {
            Ok(()) => Ok(()),
            // peer already went away; everything we wrote was handed off
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                warn!("monitor disconnected before end of input was signalled");
                Ok(())
            }
            Err(e) => Err(MonitorError::connection("signalling end of input", e)),
        };

        self.release();
        result
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            self.transition(SessionState::Closed);
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    fn expect(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected.to_string()))
        }
    }

    fn active_count(&self) -> Result<usize> {
        match self.state {
            SessionState::Active(n) => Ok(n),
            _ => Err(self.invalid_state("active".to_string())),
        }
    }

    fn invalid_state(&self, expected: String) -> MonitorError {
        MonitorError::InvalidState {
            expected,
            actual: self.state.to_string(),
        }
    }

    fn stream_mut(&mut self) -> Result<&mut S> {
        let actual = self.state.to_string();
        self.stream.as_mut().ok_or(MonitorError::InvalidState {
            expected: "open".to_string(),
            actual,
        })
    }
}

impl<S: MonitorStream> Drop for MonitorSession<S> {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(state = %self.state, "releasing monitor connection");
            self.release();
        }
    }
}

fn check_command_line(command: &str) -> Result<()> {
    let reason = if command.contains(['\n', '\r']) {
        "contains a line break"
    } else if !command.is_ascii() {
        "contains non-ASCII characters"
    } else if command.chars().any(|c| c.is_ascii_control()) {
        "contains control characters"
    } else {
        return Ok(());
    };
    Err(MonitorError::InvalidCommand {
        command: command.to_string(),
        reason: reason.to_string(),
    })
}

/// Read errors that mean "nothing arrived in time" rather than a broken link.
fn is_cancellation(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// In-memory stream with scripted reads, for session and driver tests.
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Everything the session did to the stream, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Read,
        Line(String),
        ShutdownWrite,
        Dropped,
    }

    pub struct ScriptedStream {
        reads: VecDeque<io::Result<Vec<u8>>>,
        pending: Vec<u8>,
        events: Arc<Mutex<Vec<Event>>>,
        fail_writes: bool,
    }

    impl ScriptedStream {
        pub fn new(reads: Vec<io::Result<Vec<u8>>>) -> (Self, Arc<Mutex<Vec<Event>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            let stream = Self {
                reads: reads.into(),
                pending: Vec::new(),
                events: Arc::clone(&events),
                fail_writes: false,
            };
            (stream, events)
        }

        pub fn failing_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }

        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Reads return the next scripted result; once the script runs out
    /// they time out.
    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.record(Event::Read);
            match self.reads.pop_front() {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            let data = std::mem::take(&mut self.pending);
            for line in String::from_utf8_lossy(&data).lines() {
                self.record(Event::Line(line.to_string()));
            }
            Ok(())
        }
    }

    impl MonitorStream for ScriptedStream {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn shutdown_write(&mut self) -> io::Result<()> {
            self.record(Event::ShutdownWrite);
            Ok(())
        }
    }

    impl Drop for ScriptedStream {
        fn drop(&mut self) {
            self.record(Event::Dropped);
        }
    }

    pub fn banner() -> io::Result<Vec<u8>> {
        Ok(b"QEMU 8.2.0 monitor - type 'help' for more information\r\n(qemu) ".to_vec())
    }

    pub fn timed_out() -> io::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }

    pub fn reset() -> io::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::ConnectionReset))
    }
}
