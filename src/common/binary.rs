//! Little-endian primitive readers and string decoding helpers.
//!
//! All readers are bounds checked and return [`Error::Truncated`] rather than
//! panicking on short input. String helpers are lenient: malformed or short
//! data yields an empty string, matching how the file format is decoded in
//! practice.
use crate::common::error::{Error, Result};
use encoding_rs::UTF_16LE;
use zerocopy::{FromBytes, F64, I16, I32, LE, U16, U32};

/// Read a u8 from a byte slice at the given offset.
#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or(Error::Truncated {
        needed: offset + 1,
        available: data.len(),
    })
}

/// Read a little-endian u16 from a byte slice at the given offset.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(Error::Truncated {
            needed: offset + 2,
            available: data.len(),
        });
    }
    U16::<LE>::read_from_bytes(&data[offset..offset + 2])
        .map(|v| v.get())
        .map_err(|_| Error::InvalidData("failed to read u16".to_string()))
}

/// Read a little-endian i16 from a byte slice at the given offset.
#[inline]
pub fn read_i16_le(data: &[u8], offset: usize) -> Result<i16> {
    if offset + 2 > data.len() {
        return Err(Error::Truncated {
            needed: offset + 2,
            available: data.len(),
        });
    }
    I16::<LE>::read_from_bytes(&data[offset..offset + 2])
        .map(|v| v.get())
        .map_err(|_| Error::InvalidData("failed to read i16".to_string()))
}

/// Read a little-endian u32 from a byte slice at the given offset.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(Error::Truncated {
            needed: offset + 4,
            available: data.len(),
        });
    }
    U32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .map_err(|_| Error::InvalidData("failed to read u32".to_string()))
}

/// Read a little-endian i32 from a byte slice at the given offset.
#[inline]
pub fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    if offset + 4 > data.len() {
        return Err(Error::Truncated {
            needed: offset + 4,
            available: data.len(),
        });
    }
    I32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .map_err(|_| Error::InvalidData("failed to read i32".to_string()))
}

/// Read a little-endian f64 from a byte slice at the given offset.
#[inline]
pub fn read_f64_le(data: &[u8], offset: usize) -> Result<f64> {
    if offset + 8 > data.len() {
        return Err(Error::Truncated {
            needed: offset + 8,
            available: data.len(),
        });
    }
    F64::<LE>::read_from_bytes(&data[offset..offset + 8])
        .map(|v| v.get())
        .map_err(|_| Error::InvalidData("failed to read f64".to_string()))
}

/// Decode a NUL-terminated UTF-16LE string starting at `offset`.
///
/// Scans for the terminating 0x0000 code unit; if none is found the string
/// runs to the end of the slice. Offsets beyond the slice yield an empty
/// string.
pub fn unicode_string(data: &[u8], offset: usize) -> String {
    if offset >= data.len() {
        return String::new();
    }
    unicode_string_capped(data, offset, data.len() - offset)
}

/// Decode a UTF-16LE string limited to at most `max_bytes` of input,
/// stopping early at a NUL terminator.
pub fn unicode_string_capped(data: &[u8], offset: usize, max_bytes: usize) -> String {
    if offset >= data.len() {
        return String::new();
    }
    let end = data.len().min(offset + max_bytes);
    let slice = &data[offset..end];

    let mut byte_len = slice.len() & !1;
    let mut i = 0;
    while i + 1 < slice.len() {
        if slice[i] == 0 && slice[i + 1] == 0 {
            byte_len = i;
            break;
        }
        i += 2;
    }

    let (decoded, _, _) = UTF_16LE.decode(&slice[..byte_len]);
    decoded.into_owned()
}
