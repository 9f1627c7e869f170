//! Errors surfaced by a [`crate::session::Session`].
//!
//! Loss, corruption, reordering, and duplication never show up here; the
//! transport absorbs them as added latency.  Only failures to establish the
//! channel, fatal channel I/O, and misuse of the API reach the caller.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying channel could not be opened or bound.
    #[error("channel unavailable on {addr}: {source}")]
    ChannelUnavailable {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The channel failed after it was established.
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no peer address; call connect() first")]
    NotConnected,

    #[error("payload of {len} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// The drain wait ran out with frames still unacknowledged.
    #[error("timed out with {outstanding} frame(s) unacknowledged")]
    CloseTimeout { outstanding: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let err = TransportError::ChannelUnavailable {
            addr,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:9"));

        let err = TransportError::PayloadTooLarge { len: 200, max: 123 };
        assert_eq!(err.to_string(), "payload of 200 bytes exceeds the 123-byte frame limit");

        let err = TransportError::CloseTimeout { outstanding: 2 };
        assert_eq!(err.to_string(), "timed out with 2 frame(s) unacknowledged");
    }

    #[test]
    fn io_error_converts() {
        let err: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
