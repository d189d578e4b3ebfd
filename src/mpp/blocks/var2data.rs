//! Var2Data stream reader.
//!
//! A Var2Data stream holds length-prefixed blobs at the offsets recorded in
//! the companion VarMeta index. Files in the wild carry offsets beyond the
//! end of the stream and negative or oversized lengths; those entries are
//! skipped rather than failing the decode.
use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::common::binary::{read_f64_le, read_i32_le, read_u16_le, read_u8};
use crate::common::dates;
use crate::common::error::{DecodeWarning, WarningSink};
use crate::common::guid::Guid;
use crate::mpp::blocks::VarMeta;

/// Decoded Var2Data stream, indexed by its VarMeta.
pub struct Var2Data {
    map: BTreeMap<u32, Bytes>,
    offsets_by_key: BTreeMap<(u32, u32), u32>,
}

impl Var2Data {
    /// Decode the blobs referenced by `meta`.
    pub fn new(meta: &VarMeta, stream: Bytes, warnings: &mut WarningSink) -> Self {
        let mut map = BTreeMap::new();

        for &item_offset in meta.offsets() {
            let offset = item_offset as usize;
            if offset >= stream.len() {
                warnings.push(DecodeWarning::OffsetOutOfRange {
                    stream: "Var2Data",
                    offset: item_offset,
                });
                continue;
            }

            let Ok(size) = read_i32_le(&stream, offset) else {
                warnings.push(DecodeWarning::EntrySkipped {
                    stream: "Var2Data",
                    detail: format!("no length prefix at offset {item_offset}"),
                });
                continue;
            };
            if size < 0 || offset + 4 + size as usize > stream.len() {
                warnings.push(DecodeWarning::EntrySkipped {
                    stream: "Var2Data",
                    detail: format!("bad length {size} at offset {item_offset}"),
                });
                continue;
            }

            map.insert(item_offset, stream.slice(offset + 4..offset + 4 + size as usize));
        }

        let mut offsets_by_key = BTreeMap::new();
        for id in meta.unique_ids() {
            for data_type in meta.types_for(id) {
                if let Some(offset) = meta.offset(id, data_type) {
                    offsets_by_key.insert((id, data_type), offset);
                }
            }
        }

        Self { map, offsets_by_key }
    }

    fn item(&self, id: u32, data_type: u32) -> Option<&Bytes> {
        let offset = self.offsets_by_key.get(&(id, data_type))?;
        self.map.get(offset)
    }

    /// The raw blob stored for this id and type.
    pub fn byte_array(&self, id: u32, data_type: u32) -> Option<&[u8]> {
        self.item(id, data_type).map(|b| b.as_ref())
    }

    /// The raw blob stored at an explicit stream offset.
    pub fn byte_array_at(&self, offset: u32) -> Option<&[u8]> {
        self.map.get(&offset).map(|b| b.as_ref())
    }

    /// A NUL-terminated UTF-16 string value.
    pub fn unicode_string(&self, id: u32, data_type: u32) -> Option<String> {
        self.item(id, data_type)
            .map(|data| crate::common::binary::unicode_string(data, 0))
    }

    /// A timestamp value; absent or short blobs decode as `None`.
    pub fn timestamp(&self, id: u32, data_type: u32) -> Option<NaiveDateTime> {
        let data = self.item(id, data_type)?;
        if data.len() < 4 {
            return None;
        }
        dates::timestamp(data, 0)
    }

    /// A byte value, defaulting to 0 when absent.
    pub fn byte(&self, id: u32, data_type: u32) -> u8 {
        self.item(id, data_type)
            .and_then(|data| read_u8(data, 0).ok())
            .unwrap_or(0)
    }

    /// A u16 value, defaulting to 0 when absent.
    pub fn short(&self, id: u32, data_type: u32) -> u16 {
        self.item(id, data_type)
            .and_then(|data| read_u16_le(data, 0).ok())
            .unwrap_or(0)
    }

    /// An i32 value, defaulting to 0 when absent.
    pub fn int(&self, id: u32, data_type: u32) -> i32 {
        self.int_at(id, 0, data_type)
    }

    /// An i32 value read at `offset` within the blob, defaulting to 0.
    pub fn int_at(&self, id: u32, offset: usize, data_type: u32) -> i32 {
        self.item(id, data_type)
            .and_then(|data| read_i32_le(data, offset).ok())
            .unwrap_or(0)
    }

    /// An f64 value; NaN and absent both decode as 0.
    pub fn double(&self, id: u32, data_type: u32) -> f64 {
        let value = self
            .item(id, data_type)
            .and_then(|data| read_f64_le(data, 0).ok())
            .unwrap_or(0.0);
        if value.is_nan() {
            0.0
        } else {
            value
        }
    }

    /// A GUID value.
    pub fn guid(&self, id: u32, data_type: u32) -> Option<Guid> {
        self.item(id, data_type).and_then(|data| Guid::read(data, 0))
    }

    /// Number of blobs successfully decoded.
    pub fn item_count(&self) -> usize {
        self.map.len()
    }
}
