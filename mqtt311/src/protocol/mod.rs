//! MQTT 3.1.1 protocol encoding and decoding.

pub mod codec;
pub mod packet;

pub use codec::*;
pub use packet::*;

/// Maximum inbound packet size accepted by the receive task (1MB default).
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Largest value the remaining length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Protocol name for MQTT.
pub const PROTOCOL_NAME: &[u8] = b"MQTT";

/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Packet identifier used by every SUBSCRIBE.
pub const SUBSCRIBE_PACKET_ID: u16 = 0x0010;

// Control packet types (upper nibble of the first byte).
pub const CONNECT: u8 = 0x10;
pub const CONNACK: u8 = 0x20;
pub const PUBLISH: u8 = 0x30;
pub const PUBACK: u8 = 0x40;
pub const PUBREC: u8 = 0x50;
pub const PUBREL: u8 = 0x60;
pub const PUBCOMP: u8 = 0x70;
pub const SUBSCRIBE: u8 = 0x80;
pub const SUBACK: u8 = 0x90;
pub const UNSUBSCRIBE: u8 = 0xA0;
pub const UNSUBACK: u8 = 0xB0;
pub const PINGREQ: u8 = 0xC0;
pub const PINGRESP: u8 = 0xD0;
pub const DISCONNECT: u8 = 0xE0;
pub const AUTH: u8 = 0xF0;

/// Reserved flag bits required on SUBSCRIBE.
pub const SUBSCRIBE_FLAGS: u8 = 0x02;

// PUBLISH fixed header flags.
pub const FLAG_DUP: u8 = 0x08;
pub const FLAG_QOS1: u8 = 0x02;
pub const FLAG_QOS2: u8 = 0x04;
pub const FLAG_RETAIN: u8 = 0x01;

// CONNECT flags.
pub const FLAG_CLEAN_SESSION: u8 = 0x02;
pub const FLAG_WILL: u8 = 0x04;
pub const FLAG_WILL_QOS1: u8 = 0x08;
pub const FLAG_WILL_QOS2: u8 = 0x10;
pub const FLAG_WILL_RETAIN: u8 = 0x20;
pub const FLAG_PASSWORD: u8 = 0x40;
pub const FLAG_USERNAME: u8 = 0x80;
