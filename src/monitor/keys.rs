//! Translation of human input text into monitor key names.
//!
//! The human monitor's `sendkey` command takes one key name per call
//! (`a`, `shift-a`, `kp_enter`, ...). `encode` turns a string into the ordered
//! list of names to send.
//!
//! Supported input:
//! - lowercase ASCII letters map to themselves
//! - uppercase ASCII letters map to `shift-<lowercase>`
//! - characters from the special table (`.`, `@`, newline)
//! - the escape `\n`, equivalent to a literal newline
//!
//! Anything else is rejected. Nothing is ever silently dropped.

use std::fmt;

use crate::error::EncodingError;

/// Name of a single key press understood by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyToken(String);

impl KeyToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered key presses produced from one input string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence(Vec<KeyToken>);

impl KeySequence {
    pub fn tokens(&self) -> &[KeyToken] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyToken> {
        self.0.iter()
    }

    fn push(&mut self, name: impl Into<String>) {
        self.0.push(KeyToken::new(name));
    }
}

impl<'a> IntoIterator for &'a KeySequence {
    type Item = &'a KeyToken;
    type IntoIter = std::slice::Iter<'a, KeyToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(KeyToken::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Key name sent for a newline, whichever way it was spelled.
pub const ENTER: &str = "kp_enter";

/// Look up a character in the special key table.
pub fn special_key(ch: char) -> Option<&'static str> {
    match ch {
        '.' => Some("dot"),
        '\n' => Some(ENTER),
        '@' => Some("shift-2"),
        _ => None,
    }
}

/// Convert input text into the key sequence to send.
///
/// With `raw` set the whole input is one preformed key name (for example
/// `ctrl-alt-f1`) and is passed through untouched.
pub fn encode(input: &str, raw: bool) -> Result<KeySequence, EncodingError> {
    let mut sequence = KeySequence::default();

    if raw {
        sequence.push(input);
        return Ok(sequence);
    }

    let mut escaped = false;
    for ch in input.chars() {
        if escaped {
            escaped = false;
            match ch {
                'n' => sequence.push(ENTER),
                other => return Err(EncodingError::UnsupportedEscape(other)),
            }
            continue;
        }

        if ch == '\\' {
            escaped = true;
        } else if let Some(name) = special_key(ch) {
            sequence.push(name);
        } else if ch.is_ascii_lowercase() {
            sequence.push(ch);
        } else if ch.is_ascii_uppercase() {
            sequence.push(format!("shift-{}", ch.to_ascii_lowercase()));
        } else {
            return Err(EncodingError::UnsupportedCharacter(ch));
        }
    }

    if escaped {
        return Err(EncodingError::DanglingEscape);
    }

    Ok(sequence)
}
