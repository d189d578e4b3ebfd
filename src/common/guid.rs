//! Mixed-endian GUID values.
//!
//! GUIDs are stored with the first three groups little-endian and the final
//! eight bytes big-endian. An all-zero field means "no GUID".
use std::fmt;

/// A 128-bit GUID, held in canonical (display) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Decode a GUID from its mixed-endian storage form.
    ///
    /// Returns `None` for short input or the all-zero sentinel.
    pub fn read(data: &[u8], offset: usize) -> Option<Guid> {
        if offset + 16 > data.len() {
            return None;
        }
        let d = &data[offset..offset + 16];
        let bytes = [
            d[3], d[2], d[1], d[0], // u32, little-endian
            d[5], d[4], // u16, little-endian
            d[7], d[6], // u16, little-endian
            d[8], d[9], d[10], d[11], d[12], d[13], d[14], d[15],
        ];
        if bytes.iter().all(|&b| b == 0) {
            return None;
        }
        Some(Guid(bytes))
    }

    /// The GUID in canonical byte order.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}
