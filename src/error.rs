use std::io;

use crate::protocol::Status;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the driver.
///
/// Supersedure of the notification request is deliberately absent: a
/// displaced request resolves with a minimal [`crate::Notification`] carrying
/// [`Status::Superseded`], not with an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input failed validation before anything touched the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An escape octet was followed by a byte above 0x02, or ended the frame.
    #[error("invalid escape sequence in frame")]
    InvalidEscape,

    /// The byte stream is gone; the gateway handle must be recreated.
    #[error("transport closed")]
    TransportClosed,

    /// The module completed the request with a non-success status.
    #[error("module reported status {0:?}")]
    Status(Status),

    /// The caller's cancellation signal fired.
    #[error("operation canceled")]
    Canceled,

    /// A completion was structurally wrong (too short, unknown status byte).
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}
