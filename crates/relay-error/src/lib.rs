//! Structured error kinds for the relay circuit runtime.
//!
//! A closed, small set of kinds (§7 of the design spec) rather than an
//! open-ended per-crate code space: every fallible operation in `cellbuf`,
//! `reputation`, `router-identity`, and `hidden-service` returns
//! `relay_error::Result<T>`.
//!
//! ## Modules
//!
//! - `io` — the `IoError`/`Crypto` detail types wrapped one level deep.

use std::fmt;
use std::io;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The seven error kinds from the design spec's error handling section.
#[derive(Debug)]
pub enum Error {
    /// Socket or TLS transport failure distinct from would-block.
    IoError(io::Error),

    /// Protocol framing has not yet accumulated enough input; caller
    /// should try again after more data.
    Incomplete,

    /// Capacity or header/body cap exceeded; non-recoverable for this
    /// message.
    TooLarge,

    /// Malformed cell, bad nickname, unknown version byte, bad SOCKS
    /// command, bad INTRODUCE2 structure.
    Protocol(&'static str),

    /// INTRODUCE2 for an unknown service or mismatched service/key digest.
    NoService,

    /// DH, signature, or decryption failure.
    Crypto(&'static str),

    /// All rendezvous launches exhausted.
    ConnectFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "io error: {}", e),
            Error::Incomplete => write!(f, "incomplete: need more input"),
            Error::TooLarge => write!(f, "capacity or size cap exceeded"),
            Error::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Error::NoService => write!(f, "no matching hidden service"),
            Error::Crypto(msg) => write!(f, "crypto error: {}", msg),
            Error::ConnectFailed => write!(f, "all rendezvous launches exhausted"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

impl Error {
    /// True for errors a caller should retry after more input/readiness,
    /// as opposed to a fatal failure of the owning connection or circuit.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Incomplete)
    }

    /// True for errors that should tear down the owning circuit or
    /// connection outright (§7 propagation rules).
    #[inline]
    pub const fn is_fatal_to_owner(&self) -> bool {
        matches!(
            self,
            Error::IoError(_) | Error::TooLarge | Error::ConnectFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::Protocol("bad socks command");
        assert_eq!(format!("{}", e), "protocol error: bad socks command");

        let e = Error::NoService;
        assert_eq!(format!("{}", e), "no matching hidden service");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::WouldBlock, "nope");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::IoError(_)));
    }

    #[test]
    fn test_retryable_vs_fatal() {
        assert!(Error::Incomplete.is_retryable());
        assert!(!Error::Incomplete.is_fatal_to_owner());

        assert!(Error::ConnectFailed.is_fatal_to_owner());
        assert!(!Error::ConnectFailed.is_retryable());
    }
}
