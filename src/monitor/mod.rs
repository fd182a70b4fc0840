//! QEMU human monitor client.
//!
//! The human monitor is the plain text console QEMU exposes with
//! `-monitor telnet:host:port,server,nowait`. Commands are single lines
//! (`command arg1 arg2\n`), and the monitor answers with free-form text and a
//! `(qemu)` prompt. Nothing in the reply is machine readable, so the client
//! only uses replies for pacing.
//!
//! # Architecture
//!
//! | Piece | Job |
//! |-------|-----|
//! | `address` | parse and resolve `host:port` |
//! | `keys` | turn text into `sendkey` key names |
//! | `session` | one connection: banner, command lines, half-close |
//! | `telnet` | strip telnet/VT100 noise from replies for logging |
//!
//! The scripted exchanges built on top of these live in `crate::commands`.

mod address;
mod keys;
mod session;
mod telnet;

pub use address::MonitorAddress;
pub use keys::{encode, special_key, KeySequence, KeyToken, ENTER};
pub use session::{MonitorSession, MonitorStream, ReadOutcome, SessionState};
pub use telnet::printable;

#[cfg(test)]
pub(crate) use session::scripted;
