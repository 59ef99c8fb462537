//! Error types for amplifier transport

use std::io;

use outsider_protocol::{ProtocolError, ValidationError};
use thiserror::Error;

/// Errors raised while talking to an amplifier
///
/// Read timeouts are not errors; [`AmpConnection::read_packet`] reports
/// them as `Ok(None)`.
///
/// [`AmpConnection::read_packet`]: crate::AmpConnection::read_packet
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying device or stream failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device accepted only part of a packet
    ///
    /// The amplifier may now be in an undefined control state. Writes are
    /// never retried.
    #[error("failed to write {} of {expected} bytes to amplifier", expected - written)]
    IncompleteWrite { written: usize, expected: usize },

    /// The device or stream closed
    #[error("amplifier connection closed")]
    Closed,

    /// A request got no matching reply before the read timeout
    #[error("no reply to {0} request")]
    NoReply(&'static str),

    /// Command was rejected before encoding
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Reply could not be decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
