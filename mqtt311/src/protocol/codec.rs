//! MQTT primitive encoding/decoding.
//!
//! Remaining length (base-128 varint), length-prefixed strings, and framing
//! of whole control packets off an async reader.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::MAX_REMAINING_LENGTH;
use crate::error::{Error, Result};

/// Largest multiplier reached by a valid remaining length.
const MAX_MULTIPLIER: usize = 128 * 128 * 128;

/// Encode a remaining length into `buf`.
///
/// Each byte holds 7 value bits; the high bit is set on every byte except
/// the last. Zero encodes as a single `0x00`. Returns the number of bytes
/// written (1..=4).
pub fn encode_remaining_length<B: BufMut>(value: usize, buf: &mut B) -> Result<usize> {
    if value > MAX_REMAINING_LENGTH {
        return Err(Error::TooLarge { size: value, max: MAX_REMAINING_LENGTH });
    }

    let mut n = value;
    let mut written = 0;
    loop {
        let mut byte = (n % 128) as u8;
        n /= 128;
        if n > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        written += 1;
        if n == 0 {
            return Ok(written);
        }
    }
}

/// Decode a remaining length from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`. Fails with
/// [`Error::RemainingLengthOverflow`] once the multiplier would pass 128³,
/// and with [`Error::Incomplete`] if `buf` ends on a continuation byte.
pub fn decode_remaining_length(buf: &[u8]) -> Result<(usize, usize)> {
    let mut multiplier = 1usize;
    let mut value = 0usize;

    for (i, &byte) in buf.iter().enumerate() {
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
        if multiplier > MAX_MULTIPLIER {
            return Err(Error::RemainingLengthOverflow);
        }
    }

    Err(Error::Incomplete { needed: 1 })
}

/// Number of bytes needed to encode `value` as a remaining length.
pub const fn remaining_length_len(value: usize) -> usize {
    if value < 128 {
        1
    } else if value < 128 * 128 {
        2
    } else if value < 128 * 128 * 128 {
        3
    } else {
        4
    }
}

/// Read a remaining length from an async reader, one byte at a time.
pub async fn read_remaining_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize> {
    let mut raw = BytesMut::with_capacity(4);
    read_remaining_length_into(reader, &mut raw).await
}

async fn read_remaining_length_into<R: AsyncRead + Unpin>(
    reader: &mut R,
    raw: &mut BytesMut,
) -> Result<usize> {
    let mut multiplier = 1usize;
    let mut value = 0usize;

    loop {
        let byte = reader.read_u8().await.map_err(Error::from_read)?;
        raw.put_u8(byte);
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        multiplier *= 128;
        if multiplier > MAX_MULTIPLIER {
            return Err(Error::RemainingLengthOverflow);
        }
    }
}

/// One complete control packet as read off the wire.
#[derive(Debug, Clone)]
pub struct Frame {
    bytes: Bytes,
    header_len: usize,
}

impl Frame {
    /// First byte: packet type and flags.
    pub fn control(&self) -> u8 {
        self.bytes[0]
    }

    /// Packet type (upper nibble of the first byte).
    pub fn packet_type(&self) -> u8 {
        self.bytes[0] & 0xF0
    }

    /// Variable header and payload.
    pub fn body(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    /// The whole packet, fixed header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read exactly one control packet, framed by its remaining length.
///
/// A packet larger than `max_size` is read off the stream and discarded
/// before [`Error::TooLarge`] is returned, so the next call starts on a
/// packet boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_size: usize) -> Result<Frame> {
    let first = reader.read_u8().await.map_err(Error::from_read)?;

    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(first);
    let remaining = read_remaining_length_into(reader, &mut buf).await?;
    let header_len = buf.len();

    let total = header_len + remaining;
    if total > max_size {
        skip(reader, remaining).await?;
        return Err(Error::TooLarge { size: total, max: max_size });
    }

    buf.resize(total, 0);
    reader
        .read_exact(&mut buf[header_len..])
        .await
        .map_err(Error::from_read)?;

    Ok(Frame { bytes: buf.freeze(), header_len })
}

async fn skip<R: AsyncRead + Unpin>(reader: &mut R, len: usize) -> Result<()> {
    let skipped = tokio::io::copy(&mut reader.take(len as u64), &mut tokio::io::sink())
        .await
        .map_err(Error::from_read)?;
    if skipped < len as u64 {
        return Err(Error::ConnectionClosed);
    }
    Ok(())
}

/// Read a 2-byte big-endian u16.
pub fn read_u16(buf: &[u8]) -> Option<u16> {
    if buf.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([buf[0], buf[1]]))
}

/// Write a UTF-8 string (2-byte length prefix + data).
pub fn put_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    put_binary(buf, s.as_bytes())
}

/// Write binary data (2-byte length prefix + data).
pub fn put_binary(buf: &mut BytesMut, data: &[u8]) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| Error::TooLarge {
        size: data.len(),
        max: u16::MAX as usize,
    })?;
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}
