//! Common types for mqtt311.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Quality of Service level.
///
/// `Failure` is the SUBACK return code `0x80`. It can be received but never
/// requested or published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum QoS {
    /// At most once delivery (fire and forget).
    #[default]
    AtMostOnce = 0,
    /// At least once delivery.
    AtLeastOnce = 1,
    /// Exactly once delivery.
    ExactlyOnce = 2,
    /// Subscription refused by the broker.
    Failure = 0x80,
}

impl QoS {
    /// Returns the QoS as a byte that may be sent by a client.
    pub(crate) fn requestable(self) -> crate::Result<u8> {
        match self {
            QoS::Failure => Err(Error::InvalidQos(self as u8)),
            other => Ok(other as u8),
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            0x80 => Ok(QoS::Failure),
            other => Err(Error::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos as u8
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QoS::Failure => write!(f, "failure"),
            other => write!(f, "{}", *other as u8),
        }
    }
}

/// CONNACK return codes defined by MQTT 3.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    Accepted = 0x00,
    RefusedProtocolVersion = 0x01,
    RefusedIdentifierRejected = 0x02,
    RefusedServerUnavailable = 0x03,
    RefusedUsernamePassword = 0x04,
    RefusedNotAuthorized = 0x05,
}

impl ConnectReturnCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Accepted),
            0x01 => Some(Self::RefusedProtocolVersion),
            0x02 => Some(Self::RefusedIdentifierRejected),
            0x03 => Some(Self::RefusedServerUnavailable),
            0x04 => Some(Self::RefusedUsernamePassword),
            0x05 => Some(Self::RefusedNotAuthorized),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Accepted => "connection accepted",
            Self::RefusedProtocolVersion => "protocol version not supported",
            Self::RefusedIdentifierRejected => "identifier rejected",
            Self::RefusedServerUnavailable => "server unavailable",
            Self::RefusedUsernamePassword => "wrong username or password",
            Self::RefusedNotAuthorized => "not authorised",
        };
        f.write_str(msg)
    }
}

/// Lifecycle of a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, CONNECT not sent yet.
    Disconnected,
    /// CONNECT sent, waiting for CONNACK.
    Connecting,
    /// CONNACK accepted.
    Connected,
    /// SUBSCRIBE sent, waiting for SUBACK.
    Subscribing,
    /// SUBACK validated, background tasks running.
    Subscribed,
    /// Torn down. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Subscribing => "subscribing",
            SessionState::Subscribed => "subscribed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A decoded inbound PUBLISH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageData {
    /// Topic name.
    pub topic: String,
    /// Message payload.
    pub payload: Bytes,
    /// QoS from the fixed header.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
}

impl MessageData {
    /// Create a QoS 0 message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    /// Payload as UTF-8, if it is valid.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Handler for inbound messages.
pub trait MessageHandler: Send + Sync {
    /// Called by the receive task for every decoded PUBLISH.
    fn on_message(&self, msg: MessageData);
}

/// Function-based handler.
impl<F> MessageHandler for F
where
    F: Fn(MessageData) + Send + Sync,
{
    fn on_message(&self, msg: MessageData) {
        self(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(QoS::try_from(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(QoS::try_from(0x80).unwrap(), QoS::Failure);
        assert!(matches!(QoS::try_from(3), Err(Error::InvalidQos(3))));
    }

    #[test]
    fn test_qos_requestable() {
        assert_eq!(QoS::ExactlyOnce.requestable().unwrap(), 2);
        assert!(QoS::Failure.requestable().is_err());
    }

    #[test]
    fn test_return_codes_are_distinct() {
        let codes: Vec<_> = (0u8..=5)
            .map(|v| ConnectReturnCode::from_u8(v).unwrap())
            .collect();
        for (i, a) in codes.iter().enumerate() {
            assert_eq!(*a as u8, i as u8);
            for b in &codes[i + 1..] {
                assert_ne!(a.to_string(), b.to_string());
            }
        }
        assert!(ConnectReturnCode::from_u8(6).is_none());
    }

    #[test]
    fn test_payload_str() {
        let msg = MessageData::new("a/b", &b"hello"[..]);
        assert_eq!(msg.payload_str(), Some("hello"));

        let bin = MessageData::new("a/b", vec![0xff, 0xfe]);
        assert_eq!(bin.payload_str(), None);
    }
}
