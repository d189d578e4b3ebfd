//! Extended data trailers.
//!
//! First-generation fixed records point at a keyed trailer held in the
//! chained deferred stream: a sequence of entries, each an i32 total
//! size (including the eight header bytes), an i32 key and the value
//! bytes. An undersized or overrunning entry ends the sequence.
use std::collections::HashMap;

use crate::common::binary::{read_i32_le, read_u32_le};

/// Header bytes of one entry: the size and key fields.
const ENTRY_HEADER_SIZE: usize = 8;

/// Decoded extended data trailer.
#[derive(Debug, Default)]
pub struct ExtendedData {
    values: HashMap<i32, Vec<u8>>,
}

impl ExtendedData {
    /// Parse the entries of one trailer.
    pub fn new(data: &[u8]) -> Self {
        let mut values = HashMap::new();
        let mut pos = 0usize;
        while pos + ENTRY_HEADER_SIZE <= data.len() {
            let size = read_i32_le(data, pos).unwrap_or(-1);
            if size < ENTRY_HEADER_SIZE as i32 || pos + size as usize > data.len() {
                break;
            }
            let Ok(key) = read_i32_le(data, pos + 4) else {
                break;
            };
            values.insert(key, data[pos + ENTRY_HEADER_SIZE..pos + size as usize].to_vec());
            pos += size as usize;
        }
        Self { values }
    }

    /// The raw value bytes stored under `key`.
    pub fn byte_array(&self, key: i32) -> Option<&[u8]> {
        self.values.get(&key).map(Vec::as_slice)
    }

    /// The value stored under `key` as an i32, zero when absent or short.
    pub fn int(&self, key: i32) -> i32 {
        self.byte_array(key)
            .and_then(|value| read_u32_le(value, 0).ok())
            .map(|value| value as i32)
            .unwrap_or(0)
    }
}
