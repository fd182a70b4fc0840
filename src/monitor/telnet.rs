//! Cleanup of raw monitor output for logging.
//!
//! QEMU usually exposes the human monitor as a telnet server
//! (`-monitor telnet:host:port,server,nowait`). What comes back over the
//! wire is a mix of telnet option negotiation, VT100 control sequences from
//! the readline prompt, and the actual text. Only the text is interesting in
//! a debug log.
//!
//! Handles:
//! - telnet commands: `IAC <cmd>`, `IAC WILL/WONT/DO/DONT <opt>`,
//!   subnegotiation `IAC SB ... IAC SE`, escaped `IAC IAC`
//! - CSI sequences: `ESC [ ... <final>`
//! - two-byte escapes: `ESC <char>`
//! - NUL and BEL

const IAC: u8 = 255;
const DONT: u8 = 254;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;
const ESC: u8 = 0x1b;

/// Strip protocol noise from bytes read off the monitor connection.
pub fn printable(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter().copied().peekable();

    while let Some(b) = bytes.next() {
        match b {
            IAC => match bytes.next() {
                Some(IAC) => out.push(IAC),
                Some(cmd) if (WILL..=DONT).contains(&cmd) => {
                    bytes.next(); // option code
                }
                Some(SB) => {
                    while let Some(next) = bytes.next() {
                        if next == IAC && bytes.peek() == Some(&SE) {
                            bytes.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            ESC => match bytes.peek() {
                Some(b'[') => {
                    bytes.next();
                    // parameters run until a final byte in 0x40..=0x7e
                    for next in bytes.by_ref() {
                        if (0x40..=0x7e).contains(&next) {
                            break;
                        }
                    }
                }
                Some(_) => {
                    bytes.next();
                }
                None => {}
            },
            0x00 | 0x07 => {}
            _ => out.push(b),
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}
