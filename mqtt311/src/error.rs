//! Error types for mqtt311.
//!
//! Every failure carries a stable numeric code (see [`Error::code`]) next to
//! its message. CONNACK refusals report the broker's return code, SUBACK
//! mismatches report the offending byte, and local failures use negative codes.

use std::io;

use crate::types::{ConnectReturnCode, QoS, SessionState};

/// Result type alias for mqtt311.
pub type Result<T> = std::result::Result<T, Error>;

/// Code reported when the first byte after CONNECT is not a CONNACK.
pub const CODE_CONNACK_NOT_RECEIVED: i32 = -1;
/// Code reported for transport (socket) failures.
pub const CODE_TRANSPORT: i32 = -2;
/// Code reported for a remaining length with too many continuation bytes.
pub const CODE_REMAINING_LENGTH: i32 = -3;
/// Code reported when a buffer ends before the packet does.
pub const CODE_INCOMPLETE: i32 = -4;
/// Code reported for structurally invalid packets.
pub const CODE_MALFORMED: i32 = -5;
/// Code reported for a QoS value that cannot be put on the wire.
pub const CODE_INVALID_QOS: i32 = -6;
/// Code reported for packets or fields that exceed protocol limits.
pub const CODE_TOO_LARGE: i32 = -7;
/// Code reported when an operation is called in the wrong session state.
pub const CODE_INVALID_STATE: i32 = -8;
/// Code reported when the peer closed the connection.
pub const CODE_CONNECTION_CLOSED: i32 = -9;

/// Error type for mqtt311 operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket read or write failed.
    #[error("mqtt: io error: {0}")]
    Io(#[from] io::Error),

    /// The broker answered CONNECT with something other than CONNACK.
    #[error("mqtt: connack packet not received (got {0:#04x})")]
    ConnAckNotReceived(u8),

    /// The broker refused the connection.
    #[error("mqtt: connection refused: {0}")]
    ConnectionRefused(ConnectReturnCode),

    /// CONNACK carried a return code outside the MQTT 3.1.1 range.
    #[error("mqtt: unknown connack return code {0:#04x}")]
    UnknownReturnCode(u8),

    /// The broker answered SUBSCRIBE with something other than SUBACK.
    #[error("mqtt: suback not received (got {0:#04x})")]
    SubAckNotReceived(u8),

    /// SUBACK echoed a packet identifier different from the one sent.
    #[error("mqtt: packet identifier mismatch: expected {expected:#06x}, got {got:#06x}")]
    PacketIdMismatch { expected: u16, got: u16 },

    /// SUBACK granted a QoS different from the one requested.
    #[error("mqtt: qos mismatch: requested {requested}, granted {granted:#04x}")]
    QosMismatch { requested: QoS, granted: u8 },

    /// An inbound packet was decoded as the wrong type.
    #[error("mqtt: not correct packet (type {0:#04x})")]
    NotCorrectPacket(u8),

    /// Remaining length used more than four bytes.
    #[error("mqtt: malformed remaining length")]
    RemainingLengthOverflow,

    /// The buffer ended before the packet did.
    #[error("mqtt: incomplete packet, need {needed} more bytes")]
    Incomplete { needed: usize },

    /// The packet structure is invalid.
    #[error("mqtt: malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// QoS value not allowed here.
    #[error("mqtt: invalid qos {0:#04x}")]
    InvalidQos(u8),

    /// A packet or a length-prefixed field exceeds protocol limits.
    #[error("mqtt: too large: {size} bytes exceeds {max}")]
    TooLarge { size: usize, max: usize },

    /// Operation not allowed in the current session state.
    #[error("mqtt: invalid state: expected {expected}, session is {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// The peer closed the connection.
    #[error("mqtt: connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Numeric code of this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::Io(_) => CODE_TRANSPORT,
            Error::ConnAckNotReceived(_) => CODE_CONNACK_NOT_RECEIVED,
            Error::ConnectionRefused(rc) => *rc as i32,
            Error::UnknownReturnCode(rc) => *rc as i32,
            Error::SubAckNotReceived(got) => *got as i32,
            Error::PacketIdMismatch { got, .. } => *got as i32,
            Error::QosMismatch { granted, .. } => *granted as i32,
            Error::NotCorrectPacket(kind) => *kind as i32,
            Error::RemainingLengthOverflow => CODE_REMAINING_LENGTH,
            Error::Incomplete { .. } => CODE_INCOMPLETE,
            Error::MalformedPacket(_) => CODE_MALFORMED,
            Error::InvalidQos(_) => CODE_INVALID_QOS,
            Error::TooLarge { .. } => CODE_TOO_LARGE,
            Error::InvalidState { .. } => CODE_INVALID_STATE,
            Error::ConnectionClosed => CODE_CONNECTION_CLOSED,
        }
    }

    /// Maps an unexpected EOF from `read_exact` to [`Error::ConnectionClosed`].
    pub(crate) fn from_read(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connack_codes() {
        assert_eq!(Error::ConnAckNotReceived(0x90).code(), -1);
        assert_eq!(
            Error::ConnectionRefused(ConnectReturnCode::RefusedNotAuthorized).code(),
            5
        );
        assert_eq!(Error::UnknownReturnCode(0x09).code(), 9);
    }

    #[test]
    fn test_suback_codes_are_distinct() {
        let pkid = Error::PacketIdMismatch { expected: 0x10, got: 0x11 };
        let qos = Error::QosMismatch { requested: QoS::AtLeastOnce, granted: 0x80 };
        assert_eq!(pkid.code(), 0x11);
        assert_eq!(qos.code(), 0x80);
        assert!(pkid.to_string().contains("packet identifier mismatch"));
        assert!(qos.to_string().contains("qos mismatch"));
    }

    #[test]
    fn test_from_read_maps_eof() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from_read(eof), Error::ConnectionClosed));

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err = Error::from_read(reset);
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.code(), CODE_TRANSPORT);
    }
}
