//! Bounds-checked little-endian readers and writers over account and instruction buffers.
//!
//! The free functions address an explicit offset; [`Reader`] and [`Writer`] wrap them with a
//! running cursor for layouts whose repeated groups make every later offset data-dependent.

use solana_program::pubkey::{Pubkey, PUBKEY_BYTES};

use crate::errors::CodecError;

pub const PUBKEY_LEN: usize = PUBKEY_BYTES;

fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8], CodecError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| CodecError::truncated(offset, len, data.len()))?;
    data.get(offset..end)
        .ok_or_else(|| CodecError::truncated(offset, len, data.len()))
}

fn slice_at_mut(data: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8], CodecError> {
    let available = data.len();
    let end = offset
        .checked_add(len)
        .ok_or_else(|| CodecError::truncated(offset, len, available))?;
    data.get_mut(offset..end)
        .ok_or_else(|| CodecError::truncated(offset, len, available))
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], CodecError> {
    let mut out = [0u8; N];
    out.copy_from_slice(slice_at(data, offset, N)?);
    Ok(out)
}

pub fn read_u8(data: &[u8], offset: usize) -> Result<u8, CodecError> {
    Ok(read_array::<1>(data, offset)?[0])
}

pub fn read_u16(data: &[u8], offset: usize) -> Result<u16, CodecError> {
    read_array(data, offset).map(u16::from_le_bytes)
}

pub fn read_u32(data: &[u8], offset: usize) -> Result<u32, CodecError> {
    read_array(data, offset).map(u32::from_le_bytes)
}

pub fn read_u64(data: &[u8], offset: usize) -> Result<u64, CodecError> {
    read_array(data, offset).map(u64::from_le_bytes)
}

pub fn read_i64(data: &[u8], offset: usize) -> Result<i64, CodecError> {
    read_array(data, offset).map(i64::from_le_bytes)
}

/// Reads a strict 0/1 boolean byte.
pub fn read_bool(data: &[u8], offset: usize) -> Result<bool, CodecError> {
    match read_u8(data, offset)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(CodecError::InvalidEncoding("boolean byte must be 0 or 1")),
    }
}

pub fn read_bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], CodecError> {
    read_array(data, offset)
}

pub fn read_address(data: &[u8], offset: usize) -> Result<Pubkey, CodecError> {
    read_array::<PUBKEY_LEN>(data, offset).map(Pubkey::new_from_array)
}

/// Returns the bytes of a `width`-wide region up to (not including) its first `0x00`.
pub fn read_fixed_string_bytes(
    data: &[u8],
    offset: usize,
    width: usize,
) -> Result<&[u8], CodecError> {
    let region = slice_at(data, offset, width)?;
    let end = region.iter().position(|b| *b == 0).unwrap_or(width);
    Ok(&region[..end])
}

/// Reads a null-padded fixed-width string. Invalid UTF-8 falls back to the escaped raw bytes
/// (`\xNN`), so no byte is lost; use [`read_fixed_string_bytes`] for the exact stored value.
pub fn read_fixed_string(data: &[u8], offset: usize, width: usize) -> Result<String, CodecError> {
    let bytes = read_fixed_string_bytes(data, offset, width)?;
    Ok(match core::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.escape_ascii().to_string(),
    })
}

/// Like [`read_fixed_string`] but fails on invalid UTF-8.
pub fn read_fixed_string_strict(
    data: &[u8],
    offset: usize,
    width: usize,
) -> Result<String, CodecError> {
    let bytes = read_fixed_string_bytes(data, offset, width)?;
    core::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| CodecError::InvalidEncoding("fixed-width string is not valid UTF-8"))
}

pub fn write_bytes(data: &mut [u8], offset: usize, bytes: &[u8]) -> Result<(), CodecError> {
    slice_at_mut(data, offset, bytes.len())?.copy_from_slice(bytes);
    Ok(())
}

pub fn write_u8(data: &mut [u8], offset: usize, value: u8) -> Result<(), CodecError> {
    write_bytes(data, offset, &[value])
}

pub fn write_u16(data: &mut [u8], offset: usize, value: u16) -> Result<(), CodecError> {
    write_bytes(data, offset, &value.to_le_bytes())
}

pub fn write_u32(data: &mut [u8], offset: usize, value: u32) -> Result<(), CodecError> {
    write_bytes(data, offset, &value.to_le_bytes())
}

pub fn write_u64(data: &mut [u8], offset: usize, value: u64) -> Result<(), CodecError> {
    write_bytes(data, offset, &value.to_le_bytes())
}

pub fn write_i64(data: &mut [u8], offset: usize, value: i64) -> Result<(), CodecError> {
    write_bytes(data, offset, &value.to_le_bytes())
}

pub fn write_bool(data: &mut [u8], offset: usize, value: bool) -> Result<(), CodecError> {
    write_u8(data, offset, value as u8)
}

pub fn write_address(data: &mut [u8], offset: usize, value: &Pubkey) -> Result<(), CodecError> {
    write_bytes(data, offset, value.as_ref())
}

/// Writes `value` into a `width`-wide region and zero-fills the rest.
pub fn write_fixed_string(
    data: &mut [u8],
    offset: usize,
    width: usize,
    value: &str,
) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(CodecError::FieldOverflow("string longer than its fixed width"));
    }
    let region = slice_at_mut(data, offset, width)?;
    region[..bytes.len()].copy_from_slice(bytes);
    region[bytes.len()..].fill(0);
    Ok(())
}

/// Forward-only cursor over an immutable buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn advance<T>(&mut self, width: usize, value: T) -> T {
        self.offset += width;
        value
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        let v = read_u8(self.data, self.offset)?;
        Ok(self.advance(1, v))
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let v = read_u16(self.data, self.offset)?;
        Ok(self.advance(2, v))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let v = read_u32(self.data, self.offset)?;
        Ok(self.advance(4, v))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        let v = read_u64(self.data, self.offset)?;
        Ok(self.advance(8, v))
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        let v = read_i64(self.data, self.offset)?;
        Ok(self.advance(8, v))
    }

    pub fn bool(&mut self) -> Result<bool, CodecError> {
        let v = read_bool(self.data, self.offset)?;
        Ok(self.advance(1, v))
    }

    pub fn address(&mut self) -> Result<Pubkey, CodecError> {
        let v = read_address(self.data, self.offset)?;
        Ok(self.advance(PUBKEY_LEN, v))
    }

    /// Reads a `u32` element count and checks that `count * min_element_len` bytes remain,
    /// so a corrupt count fails before anything is allocated for it.
    pub fn count(&mut self, min_element_len: usize) -> Result<usize, CodecError> {
        let start = self.offset;
        let count = self.u32()? as usize;
        let needed = count
            .checked_mul(min_element_len)
            .ok_or_else(|| CodecError::truncated(start, usize::MAX, self.data.len()))?;
        if needed > self.remaining() {
            return Err(CodecError::truncated(self.offset, needed, self.data.len()));
        }
        Ok(count)
    }

    /// Reads a `u32`-prefixed sequence of elements, each decoded by `read_one`.
    pub fn vec<T>(
        &mut self,
        min_element_len: usize,
        mut read_one: impl FnMut(&mut Self) -> Result<T, CodecError>,
    ) -> Result<Vec<T>, CodecError> {
        let count = self.count(min_element_len)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(read_one(self)?);
        }
        Ok(out)
    }
}

/// Forward-only cursor over a pre-sized output buffer.
#[derive(Debug)]
pub struct Writer<'a> {
    data: &'a mut [u8],
    offset: usize,
}

impl<'a> Writer<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        write_bytes(self.data, self.offset, bytes)?;
        self.offset += bytes.len();
        Ok(())
    }

    pub fn u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.bytes(&[value])
    }

    pub fn u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u64(&mut self, value: u64) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn i64(&mut self, value: i64) -> Result<(), CodecError> {
        self.bytes(&value.to_le_bytes())
    }

    pub fn bool(&mut self, value: bool) -> Result<(), CodecError> {
        self.u8(value as u8)
    }

    pub fn address(&mut self, value: &Pubkey) -> Result<(), CodecError> {
        self.bytes(value.as_ref())
    }

    /// Consumes the writer, failing unless every byte of the buffer was written.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.offset != self.data.len() {
            return Err(CodecError::SchemaMismatch(
                "encoded length differs from the precomputed length",
            ));
        }
        Ok(())
    }
}
