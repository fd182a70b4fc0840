//! The three scripted monitor exchanges: screenshot, keyboard input, reset.
//!
//! Each driver opens its own session, runs a fixed sequence of command lines
//! and closes. The `*_with` variants take a session that is already open
//! (banner not yet read), which is how the tests drive them.
//!
//! | Driver | Lines written |
//! |--------|---------------|
//! | `screenshot` | `screendump <absolute path>` |
//! | `send_input` | `sendkey <key>` per key, with a pacing read after each |
//! | `reboot` | `system_reset` |
//!
//! None of them verify the outcome. `screendump` writes the file on the
//! host running QEMU, and whether it exists is for the caller to check.
//! A failed `send_input` leaves the keys before the failure already typed.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::monitor::{encode, KeyToken, MonitorSession, MonitorStream, ReadOutcome};

/// A human monitor command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    Screendump(PathBuf),
    SendKey(KeyToken),
    SystemReset,
}

impl fmt::Display for MonitorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorCommand::Screendump(path) => write!(f, "screendump {}", path.display()),
            MonitorCommand::SendKey(key) => write!(f, "sendkey {}", key),
            MonitorCommand::SystemReset => f.write_str("system_reset"),
        }
    }
}

/// What a `send_input` run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Keys written to the monitor.
    pub sent: usize,
    /// Pacing reads that timed out.
    pub cancelled_reads: usize,
}

/// Make `path` absolute against `cwd`. Absolute paths pass through.
pub fn resolve_output_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Ask the monitor to dump the screen to `output`.
///
/// Relative paths are resolved against the current directory first, since
/// QEMU would otherwise resolve them against its own.
pub fn screenshot(config: &MonitorConfig, output: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().map_err(|source| MonitorError::Io {
        context: "reading current directory".to_string(),
        source,
    })?;
    let output = resolve_output_path(output, &cwd);
    debug!(path = %output.display(), "save to");

    let session = MonitorSession::open(config)?;
    screenshot_with(session, &output)?;
    Ok(output)
}

/// `screenshot` on an open session. `output` must already be absolute.
pub fn screenshot_with<S: MonitorStream>(
    mut session: MonitorSession<S>,
    output: &Path,
) -> Result<()> {
    session.read_banner()?;
    session.send_command(&MonitorCommand::Screendump(output.to_path_buf()).to_string())?;
    session.close()?;
    info!(path = %output.display(), "screendump requested");
    Ok(())
}

/// Type `text` into the guest.
///
/// The text is encoded before connecting, so unsupported input never opens
/// a connection.
pub fn send_input(config: &MonitorConfig, text: &str, raw: bool) -> Result<SendReport> {
    let keys = encode(text, raw)?;
    debug!(sequence = %keys, "qemu sequence");

    let session = MonitorSession::open(config)?;
    send_keys_with(session, keys.tokens())
}

/// Send `keys` one at a time on an open session.
///
/// After every `sendkey` the monitor's echo is drained before the next key
/// goes out. A drain that times out is counted and skipped; a broken
/// connection stops the run.
pub fn send_keys_with<S: MonitorStream>(
    mut session: MonitorSession<S>,
    keys: &[KeyToken],
) -> Result<SendReport> {
    session.read_banner()?;

    let mut report = SendReport::default();
    for key in keys {
        session.send_command(&MonitorCommand::SendKey(key.clone()).to_string())?;
        report.sent += 1;

        if session.read_pacing()? == ReadOutcome::Cancelled {
            report.cancelled_reads += 1;
        }
    }

    session.close()?;
    info!(sent = report.sent, cancelled_reads = report.cancelled_reads, "input sent");
    Ok(report)
}

/// Reset the VM.
pub fn reboot(config: &MonitorConfig) -> Result<()> {
    let session = MonitorSession::open(config)?;
    reboot_with(session)
}

/// `reboot` on an open session.
pub fn reboot_with<S: MonitorStream>(mut session: MonitorSession<S>) -> Result<()> {
    session.read_banner()?;
    session.send_command(&MonitorCommand::SystemReset.to_string())?;
    session.close()?;
    info!("system_reset sent");
    Ok(())
}
