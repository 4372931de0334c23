//! Client error taxonomy and the transient-fault classifier.

use std::io;

use hlld_protocol::ProtocolError;
use thiserror::Error;

/// Result type for the client.
pub type HlldResult<T> = Result<T, HlldError>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum HlldError {
    /// Socket-level failure outside the transient set; never retried.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Every attempt failed on a transient fault; the last one is attached.
    #[error("cannot contact hlld server after {attempts} attempts")]
    ConnectionExhausted {
        attempts: u32,
        #[source]
        last: io::Error,
    },
    /// Response violated the wire grammar.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Server answered with something other than the expected status.
    #[error("server response: {0}")]
    Server(String),
    /// Server address could not be parsed as `host` or `host:port`.
    #[error("invalid server address {0:?}")]
    InvalidAddress(String),
}

/// Faults worth a reconnect: reset, refused, EAGAIN, host unreachable, and
/// broken pipe. Everything else propagates without consuming an attempt.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::BrokenPipe
    )
}
