//! Error types for locolib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! application-layer errors are all captured here.

/// The error type for all locolib operations.
///
/// Variants cover the full range of failure modes encountered when
/// communicating with command stations: physical transport failures,
/// protocol decode errors, timeouts, and unsupported operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket, UDP).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed frame, length inconsistent with
    /// the opcode's length class, unexpected response shape).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a reply from the command station.
    ///
    /// This typically indicates the station is powered off, the addressed
    /// device is not on the bus, or the wrong transport is configured.
    #[error("timeout waiting for response")]
    Timeout,

    /// The command station reported no free slot for a locomotive address,
    /// or a slot lookup timed out.
    ///
    /// Locomotive operations that cannot resolve a slot fail with this
    /// variant rather than a hard fault; the slot cache is left untouched.
    #[error("no slot available for locomotive address {0}")]
    NoSlot(u16),

    /// The requested operation is not supported by this backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An invalid parameter was passed to a command builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the command station has been established, or the
    /// connection has been shut down.
    #[error("not connected")]
    NotConnected,

    /// The connection to the command station was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("bad frame length".into());
        assert_eq!(e.to_string(), "protocol error: bad frame length");
    }

    #[test]
    fn error_display_timeout() {
        let e = Error::Timeout;
        assert_eq!(e.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_no_slot() {
        let e = Error::NoSlot(4711);
        assert_eq!(
            e.to_string(),
            "no slot available for locomotive address 4711"
        );
    }

    #[test]
    fn error_display_unsupported() {
        let e = Error::Unsupported("LNCV programming".into());
        assert_eq!(e.to_string(), "unsupported operation: LNCV programming");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("address out of range".into());
        assert_eq!(e.to_string(), "invalid parameter: address out of range");
    }

    #[test]
    fn error_display_not_connected() {
        let e = Error::NotConnected;
        assert_eq!(e.to_string(), "not connected");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
