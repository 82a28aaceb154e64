//! Conversion of ECDSA signatures into the fixed-width `r || s` form JWS expects.

use thiserror::Error;

pub const RAW_SIGNATURE_LEN: usize = 64;
const SCALAR_LEN: usize = RAW_SIGNATURE_LEN / 2;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature truncated: needed {needed} byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("unexpected DER tag 0x{found:02x} at offset {offset} (expected 0x{expected:02x})")]
    UnexpectedTag { offset: usize, expected: u8, found: u8 },
    #[error("unsupported DER length encoding 0x{0:02x}")]
    UnsupportedLength(u8),
    #[error("DER sequence declares {declared} byte(s) but contains {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("{0} trailing byte(s) after DER signature")]
    TrailingBytes(usize),
    #[error("signature scalar is {0} bytes after stripping padding (max 32)")]
    ScalarTooLong(usize),
    #[error("unexpected ECDSA signature length: {0}")]
    InvalidLength(usize),
}

/// Cursor over a byte slice where every read is bounds-checked.
#[derive(Debug)]
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, SignatureError> {
        let byte = *self.buf.get(self.pos).ok_or(SignatureError::Truncated { offset: self.pos, needed: 1 })?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], SignatureError> {
        let slice = self
            .pos
            .checked_add(len)
            .and_then(|end| self.buf.get(self.pos..end))
            .ok_or(SignatureError::Truncated { offset: self.pos, needed: len })?;
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn expect_tag(&mut self, expected: u8) -> Result<(), SignatureError> {
        let offset = self.pos;
        let found = self.read_u8()?;
        if found == expected { Ok(()) } else { Err(SignatureError::UnexpectedTag { offset, expected, found }) }
    }

    /// Reads a DER length: short form, or long form with one or two length bytes.
    pub(crate) fn read_length(&mut self) -> Result<usize, SignatureError> {
        match self.read_u8()? {
            short @ 0x00..=0x7f => Ok(usize::from(short)),
            0x81 => Ok(usize::from(self.read_u8()?)),
            0x82 => {
                let hi = self.read_u8()?;
                let lo = self.read_u8()?;
                Ok(usize::from(u16::from_be_bytes([hi, lo])))
            }
            other => Err(SignatureError::UnsupportedLength(other)),
        }
    }

    fn read_tlv(&mut self, tag: u8) -> Result<&'a [u8], SignatureError> {
        self.expect_tag(tag)?;
        let len = self.read_length()?;
        self.read_slice(len)
    }
}

/// Parses `SEQUENCE { INTEGER r, INTEGER s }` into a 64-byte `r || s`.
///
/// # Errors
/// Returns a `SignatureError` for malformed DER or scalars wider than 32 bytes.
pub fn der_to_raw(der: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN], SignatureError> {
    let mut reader = ByteReader::new(der);
    reader.expect_tag(TAG_SEQUENCE)?;
    let declared = reader.read_length()?;
    let content_start = reader.position();

    let r = reader.read_tlv(TAG_INTEGER)?;
    let s = reader.read_tlv(TAG_INTEGER)?;

    let actual = reader.position() - content_start;
    if actual != declared {
        return Err(SignatureError::LengthMismatch { declared, actual });
    }
    if reader.remaining() > 0 {
        return Err(SignatureError::TrailingBytes(reader.remaining()));
    }

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    let (r_out, s_out) = raw.split_at_mut(SCALAR_LEN);
    write_scalar(r_out, r)?;
    write_scalar(s_out, s)?;
    Ok(raw)
}

/// Strips leading zero bytes and left-pads into `out`.
fn write_scalar(out: &mut [u8], value: &[u8]) -> Result<(), SignatureError> {
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    let stripped = &value[start..];
    if stripped.len() > out.len() {
        return Err(SignatureError::ScalarTooLong(stripped.len()));
    }
    let offset = out.len() - stripped.len();
    out[offset..].copy_from_slice(stripped);
    Ok(())
}

/// Accepts either a DER signature (leading `0x30`) or an already-raw one.
///
/// # Errors
/// Returns a `SignatureError` if DER parsing fails or the result is not 64 bytes.
pub fn normalize_signature(signature: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN], SignatureError> {
    if signature.first() == Some(&TAG_SEQUENCE) {
        return der_to_raw(signature);
    }
    <[u8; RAW_SIGNATURE_LEN]>::try_from(signature).map_err(|_| SignatureError::InvalidLength(signature.len()))
}
