//! PDU build, parse and field access.
//!
//! Wire layout of a redundancy-layer PDU, all fields little-endian:
//!
//! ```text
//! offset  size  field
//!  0       2    message_length  (total length including this field)
//!  2       2    reserved        (zero on transmit, unchecked on receive)
//!  4       4    sequence_number
//!  8       N    payload         (opaque to the redundancy layer)
//!  8+N     C    check_code      (C = 0, 2 or 4 depending on check-code type)
//! ```
//!
//! The embedded `message_length` is authoritative: it must equal the byte
//! count actually delivered by the transport, or the PDU is invalid.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::CheckCodeType;
use crate::crc::CrcEngine;
use crate::limits::{
    MAX_PAYLOAD_LEN, MAX_PDU_LEN, MIN_PAYLOAD_LEN, MIN_PDU_LEN, PDU_HEADER_LEN,
};

const SEQUENCE_NUMBER_OFFSET: usize = 4;

/// Why an incoming byte sequence was rejected as a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduError {
    /// Total length out of bounds, embedded length field disagreeing with
    /// the delivered length, or a payload outside its permitted size range.
    InvalidLength,
    /// The embedded check code does not match the computed one.
    InvalidCrc,
}

impl std::fmt::Display for PduError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PduError::InvalidLength => write!(f, "invalid pdu length"),
            PduError::InvalidCrc => write!(f, "check code mismatch"),
        }
    }
}

impl std::error::Error for PduError {}

/// A validated redundancy-layer PDU.
///
/// Only the codec constructs these, so holding a `Pdu` implies the length
/// invariant holds and the check code has been verified (or built in).
#[derive(Debug, Clone)]
pub struct Pdu {
    bytes: Bytes,
    payload_len: usize,
}

impl Pdu {
    pub fn sequence_number(&self) -> u32 {
        get_u32_le(&self.bytes, SEQUENCE_NUMBER_OFFSET)
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[PDU_HEADER_LEN..PDU_HEADER_LEN + self.payload_len]
    }

    /// The payload as a cheap owned slice of the PDU's backing storage.
    pub fn payload_bytes(&self) -> Bytes {
        self.bytes
            .slice(PDU_HEADER_LEN..PDU_HEADER_LEN + self.payload_len)
    }

    /// The full wire representation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds and validates PDUs for one configured check-code type.
pub struct MessageCodec {
    check_code_type: CheckCodeType,
    crc: Option<CrcEngine>,
}

impl MessageCodec {
    pub fn new(check_code_type: CheckCodeType) -> Self {
        Self {
            check_code_type,
            crc: CrcEngine::for_check_code(check_code_type),
        }
    }

    pub fn check_code_type(&self) -> CheckCodeType {
        self.check_code_type
    }

    /// Serialize a PDU from a sequence number and payload, computing and
    /// appending the check code.
    ///
    /// The payload length is a precondition here; callers validate it at
    /// the API boundary first.
    pub fn build(&self, sequence_number: u32, payload: &[u8]) -> Pdu {
        assert!(
            (MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&payload.len()),
            "payload length {} outside {}..={}",
            payload.len(),
            MIN_PAYLOAD_LEN,
            MAX_PAYLOAD_LEN,
        );

        let code_len = self.check_code_type.code_len();
        let total_len = PDU_HEADER_LEN + payload.len() + code_len;

        let mut buf = BytesMut::with_capacity(total_len);
        buf.put_u16_le(total_len as u16);
        buf.put_u16_le(0); // reserved
        buf.put_u32_le(sequence_number);
        buf.put_slice(payload);

        if let Some(crc) = &self.crc {
            let code = crc.compute(&buf);
            match code_len {
                4 => buf.put_u32_le(code),
                2 => buf.put_u16_le(code as u16),
                _ => unreachable!("check code engine with unsupported width"),
            }
        }

        Pdu {
            bytes: buf.freeze(),
            payload_len: payload.len(),
        }
    }

    /// Validate an incoming byte sequence and return it as a PDU.
    ///
    /// Checks, in order: total length bounds, the embedded length field
    /// against the delivered length, the derived payload length, and
    /// finally the check code. For type A the check code step always
    /// succeeds.
    pub fn parse(&self, bytes: Bytes) -> Result<Pdu, PduError> {
        if !(MIN_PDU_LEN..=MAX_PDU_LEN).contains(&bytes.len()) {
            return Err(PduError::InvalidLength);
        }
        if get_u16_le(&bytes, 0) as usize != bytes.len() {
            return Err(PduError::InvalidLength);
        }

        let code_len = self.check_code_type.code_len();
        let payload_len = bytes
            .len()
            .checked_sub(PDU_HEADER_LEN + code_len)
            .ok_or(PduError::InvalidLength)?;
        if !(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&payload_len) {
            return Err(PduError::InvalidLength);
        }

        if let Some(crc) = &self.crc {
            let code_offset = bytes.len() - code_len;
            let computed = crc.compute(&bytes[..code_offset]);
            let embedded = match code_len {
                4 => get_u32_le(&bytes, code_offset),
                2 => get_u16_le(&bytes, code_offset) as u32,
                _ => unreachable!("check code engine with unsupported width"),
            };
            if computed != embedded {
                return Err(PduError::InvalidCrc);
            }
        }

        Ok(Pdu { bytes, payload_len })
    }
}

fn get_u16_le(buf: &[u8], position: usize) -> u16 {
    u16::from_le_bytes([buf[position], buf[position + 1]])
}

fn get_u32_le(buf: &[u8], position: usize) -> u32 {
    u32::from_le_bytes([
        buf[position],
        buf[position + 1],
        buf[position + 2],
        buf[position + 3],
    ])
}
