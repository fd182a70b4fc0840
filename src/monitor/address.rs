//! `host:port` addresses of monitor endpoints.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{MonitorError, Result};

/// Where the monitor listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorAddress {
    pub host: String,
    pub port: u16,
}

impl MonitorAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve to socket addresses, in resolver order.
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| MonitorError::connection(format!("resolving {}", self), e))?
            .collect();

        if addrs.is_empty() {
            return Err(MonitorError::connection(
                format!("resolving {}", self),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
            ));
        }
        Ok(addrs)
    }
}

impl FromStr for MonitorAddress {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| MonitorError::InvalidAddress {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| invalid("unterminated '[' in host"))?,
            None if host.contains(':') => {
                return Err(invalid("IPv6 hosts must be written as [addr]:port"))
            }
            None => host,
        };

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number in 0-65535"))?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for MonitorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
