//! SSH transport error types

use std::fmt;
use std::io;
use thiserror::Error;

/// The distinguishable ways establishing a session can fail.
///
/// All three share the same retry policy, so they are one tagged variant
/// rather than separate error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// TCP connect timed out
    Timeout,
    /// No route to the host, connection refused, or handshake failure
    NoRoute,
    /// Key or password rejected
    Auth,
}

impl ConnectFailure {
    pub(crate) fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectFailure::Timeout,
            _ => ConnectFailure::NoRoute,
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectFailure::Timeout => "timeout",
            ConnectFailure::NoRoute => "no valid connection",
            ConnectFailure::Auth => "authentication failed",
        };
        f.write_str(label)
    }
}

/// SSH transport errors
#[derive(Error, Debug)]
pub enum SshError {
    #[error("connection to {host} failed ({kind}): {message}")]
    Connect {
        host: String,
        kind: ConnectFailure,
        message: String,
    },

    #[error("key material error: {0}")]
    Key(String),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] ssh2::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SshError {
    /// Whether the session-connect retry loop should try again.
    /// Only connection establishment failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SshError::Connect { .. })
    }

    pub fn connect_failure(&self) -> Option<ConnectFailure> {
        match self {
            SshError::Connect { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SshError>;
