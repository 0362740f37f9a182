//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! This module provides functions for encoding and decoding NDN TLV packets.
//! µDCN restricts TLV types to a single byte, which covers every type used by
//! the PIT-CS composite table.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants (single‑byte for µDCN)
 * ---------------------------------------------------------------- */

pub const TLV_IMPLICIT_DIGEST: u8   = 0x01;
pub const TLV_INTEREST: u8          = 0x05;
pub const TLV_DATA: u8              = 0x06;
pub const TLV_NAME: u8              = 0x07;
pub const TLV_COMPONENT: u8         = 0x08;
pub const TLV_NONCE: u8             = 0x0A;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_MUST_BE_FRESH: u8     = 0x12;
pub const TLV_META_INFO: u8         = 0x14;
pub const TLV_CONTENT: u8           = 0x15;
pub const TLV_SIGNATURE_INFO: u8    = 0x16;
pub const TLV_SIGNATURE_VALUE: u8   = 0x17;
pub const TLV_FRESHNESS_PERIOD: u8  = 0x19;
pub const TLV_SIGNATURE_TYPE: u8    = 0x1B;
pub const TLV_CAN_BE_PREFIX: u8     = 0x21;

/* ---------------------------------------------------------------- *
 * Encoding helpers
 * ---------------------------------------------------------------- */

/// Encode the 1‑byte TLV *type* field.
pub fn encode_tlv_type(tlv_type: u8, buf: &mut BytesMut) {
    buf.put_u8(tlv_type);
}

/// Encode the variable‑width TLV *length* field.
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2‑byte length
/// * otherwise → marker 254 + 4‑byte length (max ≈ 4 GB)
pub fn encode_tlv_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/// Encode a NonNegativeInteger value in its shortest form (1, 2, 4 or 8 bytes).
pub fn encode_nni(value: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    if value <= u8::MAX as u64 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
    buf.freeze()
}

/* ---------------------------------------------------------------- *
 * Decoding helpers
 * ---------------------------------------------------------------- */

/// Decode the TLV *type* field (single byte).
pub fn decode_tlv_type(buf: &mut impl Buf) -> Result<u8, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV type".into()));
    }
    Ok(buf.get_u8())
}

/// Decode the TLV *length* field using NDN variable‑length rules.
pub fn decode_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV length".into()));
    }

    let first_byte = buf.get_u8();
    match first_byte {
        0..=252 => Ok(first_byte as usize),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("Buffer underflow when decoding 16‑bit TLV length".into()));
            }
            Ok(buf.get_u16() as usize)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("Buffer underflow when decoding 32‑bit TLV length".into()));
            }
            Ok(buf.get_u32() as usize)
        }
        255 => Err(Error::Tlv("64‑bit TLV lengths not supported".into())),
    }
}

/// Decode a NonNegativeInteger TLV value.
pub fn decode_nni(value: &[u8]) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_be_bytes([value[0], value[1]]) as u64),
        4 => Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]) as u64),
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(value);
            Ok(u64::from_be_bytes(raw))
        }
        n => Err(Error::Tlv(format!("Invalid NonNegativeInteger length {}", n))),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Create a new wrapper from raw parts.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        let vlen = self.value.len();
        1            // type
        + tlv_length_size(vlen)
        + vlen       // value
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_tlv_type(self.tlv_type, buf);
        encode_tlv_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decode a single element from `buf` **in‑place**.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("Buffer too small for TLV header".into()));
        }

        let tlv_type = decode_tlv_type(buf)?;
        let length   = decode_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        // bytes 1.*: cheap zero‑copy slice
        let value = buf.copy_to_bytes(length);
        Ok(Self { tlv_type, value })
    }

    /// Decode the nested elements carried in this element's value.
    pub fn children(&self) -> Result<Vec<TlvElement>, Error> {
        let mut buf = self.value.clone();
        let mut out = Vec::new();
        while buf.has_remaining() {
            out.push(TlvElement::decode(&mut buf)?);
        }
        Ok(out)
    }
}

/* ---------------------------------------------------------------- *
 * Helper
 * ---------------------------------------------------------------- */

/// Number of bytes required to encode `length` with the variable‑width scheme.
pub fn tlv_length_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length <= 65_535 {
        3
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_field_widths() {
        for (len, width) in [(0usize, 1usize), (252, 1), (253, 3), (65_535, 3), (65_536, 5)] {
            let mut buf = BytesMut::new();
            encode_tlv_length(len, &mut buf);
            assert_eq!(buf.len(), width);
            assert_eq!(tlv_length_size(len), width);
            assert_eq!(decode_tlv_length(&mut buf.freeze()).unwrap(), len);
        }
    }

    #[test]
    fn test_nni_shortest_form() {
        assert_eq!(encode_nni(0).len(), 1);
        assert_eq!(encode_nni(300).len(), 2);
        assert_eq!(encode_nni(70_000).len(), 4);
        assert_eq!(encode_nni(u64::MAX).len(), 8);
        assert_eq!(decode_nni(&encode_nni(70_000)).unwrap(), 70_000);
        assert!(decode_nni(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_truncated_element_rejected() {
        let mut buf = BytesMut::new();
        TlvElement::new(TLV_CONTENT, Bytes::from_static(b"hello")).encode(&mut buf);
        let mut short = buf.freeze().slice(..4);
        assert!(TlvElement::decode(&mut short).is_err());
    }
}
