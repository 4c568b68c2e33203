//! MQTT 3.1.1 control packets.
//!
//! Outbound packets are assembled as three sections: fixed header, variable
//! header and payload. The body sections are written first; the remaining
//! length is appended to the fixed header last, from their combined size.
//!
//! Inbound, only PUBLISH is decoded into a value. CONNACK and SUBACK are
//! validated in place by the session handshakes.

use bytes::{BufMut, Bytes, BytesMut};

use super::codec::{decode_remaining_length, encode_remaining_length, put_binary, put_string, read_u16};
use super::*;
use crate::config::ConnectOptions;
use crate::error::{Error, Result};
use crate::types::{ConnectReturnCode, MessageData, QoS};

/// An outbound control packet.
#[derive(Debug, Clone)]
pub struct Packet {
    fixed_header: BytesMut,
    variable_header: BytesMut,
    payload: BytesMut,
}

impl Packet {
    fn start(control: u8) -> Self {
        let mut fixed_header = BytesMut::with_capacity(5);
        fixed_header.put_u8(control);
        Self {
            fixed_header,
            variable_header: BytesMut::new(),
            payload: BytesMut::new(),
        }
    }

    /// Append the remaining length once both body sections are complete.
    fn finish(mut self) -> Result<Self> {
        let len = self.variable_header.len() + self.payload.len();
        encode_remaining_length(len, &mut self.fixed_header)?;
        Ok(self)
    }

    /// Build a CONNECT packet.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut pkt = Self::start(CONNECT);

        put_binary(&mut pkt.variable_header, PROTOCOL_NAME)?;
        pkt.variable_header.put_u8(PROTOCOL_LEVEL);
        pkt.variable_header.put_u8(connect_flags(options)?);
        pkt.variable_header.put_u16(options.keep_alive);

        put_string(&mut pkt.payload, &options.client_id)?;
        if let Some(will) = &options.will {
            put_string(&mut pkt.payload, &will.topic)?;
            put_string(&mut pkt.payload, &will.message)?;
        }
        if let Some((username, password)) = options.credentials() {
            put_string(&mut pkt.payload, username)?;
            if let Some(password) = password {
                put_string(&mut pkt.payload, password)?;
            }
        }

        pkt.finish()
    }

    /// Build a SUBSCRIBE packet for a single topic filter.
    ///
    /// The packet identifier is always [`SUBSCRIBE_PACKET_ID`].
    pub fn subscribe(topic: &str, qos: QoS) -> Result<Self> {
        let requested = qos.requestable()?;
        let mut pkt = Self::start(SUBSCRIBE | SUBSCRIBE_FLAGS);

        pkt.variable_header.put_u16(SUBSCRIBE_PACKET_ID);

        put_string(&mut pkt.payload, topic)?;
        pkt.payload.put_u8(requested);

        pkt.finish()
    }

    /// Build a PUBLISH packet.
    ///
    /// The QoS goes in bits 1-2 of the fixed header: QoS 1 sets
    /// [`FLAG_QOS1`] (0x02) and QoS 2 sets [`FLAG_QOS2`] (0x04). Both bits
    /// together would be the reserved QoS 3.
    ///
    /// `pkid` is only written for QoS 1 and 2, and must be non-zero there.
    pub fn publish(topic: &str, message: &[u8], dup: bool, qos: QoS, pkid: u16) -> Result<Self> {
        let mut control = PUBLISH;
        if dup {
            control |= FLAG_DUP;
        }
        match qos {
            QoS::AtMostOnce => {}
            QoS::AtLeastOnce => control |= FLAG_QOS1,
            QoS::ExactlyOnce => control |= FLAG_QOS2,
            QoS::Failure => return Err(Error::InvalidQos(qos as u8)),
        }

        let mut pkt = Self::start(control);
        put_string(&mut pkt.variable_header, topic)?;
        if qos != QoS::AtMostOnce {
            if pkid == 0 {
                return Err(Error::MalformedPacket("publish packet identifier must be non-zero"));
            }
            pkt.variable_header.put_u16(pkid);
        }
        pkt.payload.put_slice(message);

        pkt.finish()
    }

    /// Build a PINGREQ packet.
    pub fn pingreq() -> Self {
        Self::bare(PINGREQ)
    }

    /// Build a DISCONNECT packet.
    pub fn disconnect() -> Self {
        Self::bare(DISCONNECT)
    }

    fn bare(control: u8) -> Self {
        let mut pkt = Self::start(control);
        pkt.fixed_header.put_u8(0);
        pkt
    }

    pub fn fixed_header(&self) -> &[u8] {
        &self.fixed_header
    }

    pub fn variable_header(&self) -> &[u8] {
        &self.variable_header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Byte length of variable header plus payload.
    pub fn remaining_length(&self) -> usize {
        self.variable_header.len() + self.payload.len()
    }

    /// Total encoded size.
    pub fn len(&self) -> usize {
        self.fixed_header.len() + self.remaining_length()
    }

    /// The three sections concatenated, ready for the wire.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_slice(&self.fixed_header);
        buf.put_slice(&self.variable_header);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Assemble the CONNECT flags byte.
pub fn connect_flags(options: &ConnectOptions) -> Result<u8> {
    let mut flags = 0u8;

    if options.clean_session {
        flags |= FLAG_CLEAN_SESSION;
    }

    if let Some(will) = &options.will {
        flags |= FLAG_WILL;
        match will.qos {
            QoS::AtMostOnce => {}
            QoS::AtLeastOnce => flags |= FLAG_WILL_QOS1,
            QoS::ExactlyOnce => flags |= FLAG_WILL_QOS2,
            QoS::Failure => return Err(Error::InvalidQos(will.qos as u8)),
        }
        if will.retain {
            flags |= FLAG_WILL_RETAIN;
        }
    }

    if let Some((_, password)) = options.credentials() {
        flags |= FLAG_USERNAME;
        if password.is_some() {
            flags |= FLAG_PASSWORD;
        }
    }

    Ok(flags)
}

/// Validate the three CONNACK bytes following the control byte
/// (remaining length, session present, return code).
///
/// Returns the session-present flag on acceptance.
pub fn check_connack(data: [u8; 3]) -> Result<bool> {
    match ConnectReturnCode::from_u8(data[2]) {
        Some(ConnectReturnCode::Accepted) => Ok(data[1] & 0x01 != 0),
        Some(code) => Err(Error::ConnectionRefused(code)),
        None => Err(Error::UnknownReturnCode(data[2])),
    }
}

/// Validate a SUBACK body against the SUBSCRIBE that was sent.
pub fn check_suback(body: &[u8], requested: QoS) -> Result<()> {
    let pkid = read_u16(body).ok_or(Error::MalformedPacket("suback without packet identifier"))?;
    if pkid != SUBSCRIBE_PACKET_ID {
        return Err(Error::PacketIdMismatch {
            expected: SUBSCRIBE_PACKET_ID,
            got: pkid,
        });
    }

    let granted = *body
        .get(2)
        .ok_or(Error::MalformedPacket("suback without return code"))?;
    if granted != requested as u8 {
        return Err(Error::QosMismatch { requested, granted });
    }

    Ok(())
}

/// Decode a complete inbound PUBLISH packet, fixed header included.
pub fn decode_publish(data: &[u8]) -> Result<MessageData> {
    let first = *data.first().ok_or(Error::Incomplete { needed: 1 })?;
    if first & 0xF0 != PUBLISH {
        return Err(Error::NotCorrectPacket(first & 0xF0));
    }

    let (remaining, consumed) = decode_remaining_length(&data[1..])?;
    let start = 1 + consumed;
    let end = start + remaining;
    if data.len() < end {
        return Err(Error::Incomplete { needed: end - data.len() });
    }
    let body = &data[start..end];

    let topic_len = read_u16(body).ok_or(Error::MalformedPacket("publish without topic length"))? as usize;
    let topic = body
        .get(2..2 + topic_len)
        .ok_or(Error::MalformedPacket("topic length exceeds packet"))?;
    let topic = std::str::from_utf8(topic)
        .map_err(|_| Error::MalformedPacket("topic is not valid utf-8"))?
        .to_string();

    let qos = QoS::try_from((first >> 1) & 0x03)?;
    let mut pos = 2 + topic_len;
    if qos != QoS::AtMostOnce {
        if body.len() < pos + 2 {
            return Err(Error::MalformedPacket("publish without packet identifier"));
        }
        pos += 2;
    }

    Ok(MessageData {
        topic,
        payload: Bytes::copy_from_slice(&body[pos..]),
        qos,
        retain: first & FLAG_RETAIN != 0,
    })
}
