//! Error types for the monitor client.
//!
//! Encoding failures are precondition violations and never touch the network.
//! Everything else that goes wrong talking to the monitor is a connection
//! failure and aborts the current exchange.

use std::io;
use thiserror::Error;

/// Input text that has no key token mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("character {0:?} is not supported")]
    UnsupportedCharacter(char),

    #[error("unsupported escape sequence \\{0}")]
    UnsupportedEscape(char),

    #[error("input ends with an unfinished escape sequence")]
    DanglingEscape,
}

/// Errors raised while talking to the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("invalid monitor address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("{context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: monitor closed the connection")]
    Closed { context: String },

    #[error("refusing to send {command:?}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("session is {actual}, expected {expected}")]
    InvalidState { expected: String, actual: String },
}

impl MonitorError {
    pub(crate) fn connection(context: impl Into<String>, source: io::Error) -> Self {
        MonitorError::Connection {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn closed(context: impl Into<String>) -> Self {
        MonitorError::Closed {
            context: context.into(),
        }
    }

    /// True for transport-level failures (connect, read, write, peer hangup).
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            MonitorError::Connection { .. } | MonitorError::Closed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_messages() {
        assert_eq!(
            EncodingError::UnsupportedCharacter('#').to_string(),
            "character '#' is not supported"
        );
        assert_eq!(
            EncodingError::UnsupportedEscape('x').to_string(),
            "unsupported escape sequence \\x"
        );
    }

    #[test]
    fn test_connection_classification() {
        let err = MonitorError::connection(
            "reading banner",
            io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        );
        assert!(err.is_connection());
        assert_eq!(err.to_string(), "reading banner: reset");

        assert!(MonitorError::closed("sendkey a").is_connection());

        let err: MonitorError = EncodingError::DanglingEscape.into();
        assert!(!err.is_connection());

        let err = MonitorError::Io {
            context: "reading current directory".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(!err.is_connection());
        assert!(err.to_string().starts_with("reading current directory: "));
    }
}
