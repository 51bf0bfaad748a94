//! On-disk record framing for the placement log.
//!
//! ## Record Format
//!
//! ```text
//! | len: u32 LE | payload (len bytes) | crc32(payload): u32 LE |
//!
//! payload:
//! | timestamp: f64 LE | x: u16 LE | y: u16 LE | color: u8 | name_len: u16 LE | name (UTF-8) |
//! ```

use crate::error::{StorageError, StorageResult};
use crate::placement::Placement;

/// Size of the length prefix.
const LEN_SIZE: usize = 4;
/// Size of the trailing checksum.
const CRC_SIZE: usize = 4;
/// Fixed part of the payload (timestamp, x, y, color, name_len).
const FIXED_PAYLOAD: usize = 8 + 2 + 2 + 1 + 2;

/// Outcome of decoding one record from the front of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordRead {
    /// A full, valid record and the number of bytes it occupied.
    Complete(Placement, usize),
    /// The buffer ends before the record does (torn write).
    Incomplete,
    /// The record is present but invalid.
    Corrupt(String),
}

/// Encodes a placement as a framed log record.
///
/// # Errors
///
/// Returns [`StorageError::InvalidRecord`] if the user name does not fit
/// the 16-bit length field.
pub fn encode_record(placement: &Placement) -> StorageResult<Vec<u8>> {
    let name = placement.user.as_bytes();
    let name_len = u16::try_from(name.len()).map_err(|_| {
        StorageError::InvalidRecord(format!("user name too long: {} bytes", name.len()))
    })?;

    let payload_len = FIXED_PAYLOAD + name.len();
    let mut buf = Vec::with_capacity(LEN_SIZE + payload_len + CRC_SIZE);
    buf.extend_from_slice(&(payload_len as u32).to_le_bytes());
    buf.extend_from_slice(&placement.timestamp.to_le_bytes());
    buf.extend_from_slice(&placement.x.to_le_bytes());
    buf.extend_from_slice(&placement.y.to_le_bytes());
    buf.push(placement.color);
    buf.extend_from_slice(&name_len.to_le_bytes());
    buf.extend_from_slice(name);

    let crc = compute_crc32(&buf[LEN_SIZE..]);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Decodes the record at the front of `data`.
pub fn decode_record(data: &[u8]) -> RecordRead {
    if data.len() < LEN_SIZE {
        return RecordRead::Incomplete;
    }
    let payload_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if payload_len < FIXED_PAYLOAD {
        return RecordRead::Corrupt(format!("payload length {payload_len} below minimum"));
    }

    let total = LEN_SIZE + payload_len + CRC_SIZE;
    if data.len() < total {
        return RecordRead::Incomplete;
    }

    let payload = &data[LEN_SIZE..LEN_SIZE + payload_len];
    let stored_crc = u32::from_le_bytes([
        data[total - 4],
        data[total - 3],
        data[total - 2],
        data[total - 1],
    ]);
    let actual_crc = compute_crc32(payload);
    if stored_crc != actual_crc {
        return RecordRead::Corrupt(format!(
            "checksum mismatch: stored {stored_crc:#010x}, computed {actual_crc:#010x}"
        ));
    }

    match decode_payload(payload) {
        Ok(placement) => RecordRead::Complete(placement, total),
        Err(message) => RecordRead::Corrupt(message),
    }
}

fn decode_payload(payload: &[u8]) -> Result<Placement, String> {
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&payload[0..8]);
    let timestamp = f64::from_le_bytes(ts);
    let x = u16::from_le_bytes([payload[8], payload[9]]);
    let y = u16::from_le_bytes([payload[10], payload[11]]);
    let color = payload[12];
    let name_len = u16::from_le_bytes([payload[13], payload[14]]) as usize;

    if FIXED_PAYLOAD + name_len != payload.len() {
        return Err(format!(
            "name length {name_len} does not match payload of {} bytes",
            payload.len()
        ));
    }

    let user = std::str::from_utf8(&payload[FIXED_PAYLOAD..])
        .map_err(|e| format!("user name is not UTF-8: {e}"))?
        .to_string();

    Ok(Placement {
        timestamp,
        user,
        x,
        y,
        color,
    })
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, table built at compile time
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
