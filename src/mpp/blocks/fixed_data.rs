//! FixedData stream reader.
//!
//! Items in a FixedData stream have a known maximum size rather than a
//! uniform record size. Item boundaries come from the offsets stored in the
//! companion FixedMeta stream; offsets may be out of sequence and items may
//! overlap, so the whole stream is held in memory and sliced per item.
use bytes::Bytes;

use crate::common::error::{DecodeWarning, WarningSink};
use crate::mpp::blocks::FixedMeta;

/// Decoded FixedData stream: one optional byte slice per metadata record.
pub struct FixedData {
    items: Vec<Option<Bytes>>,
    offsets: Vec<i32>,
}

impl FixedData {
    /// Decode using item boundaries from the companion metadata.
    pub fn from_meta(meta: &FixedMeta, stream: Bytes, warnings: &mut WarningSink) -> Self {
        Self::with_limits(meta, stream, 0, 0, warnings)
    }

    /// Decode with a cap on individual item sizes and a floor applied when
    /// the metadata reports a zero-length item.
    ///
    /// `max_expected` of 0 means uncapped. Items whose stored length is
    /// negative or overruns the stream are clamped to the remaining bytes
    /// (then capped), with a warning recorded.
    pub fn with_limits(
        meta: &FixedMeta,
        stream: Bytes,
        max_expected: usize,
        min_size: usize,
        warnings: &mut WarningSink,
    ) -> Self {
        let item_count = meta.item_count();
        let mut items = vec![None; item_count];
        let mut offsets = vec![0i32; item_count];

        for index in 0..item_count {
            let Some(item_offset) = meta.data_offset(index) else {
                continue;
            };
            if item_offset < 0 || item_offset as usize > stream.len() {
                warnings.push(DecodeWarning::OffsetOutOfRange {
                    stream: "FixedData",
                    offset: item_offset as u32,
                });
                continue;
            }
            let item_offset = item_offset as usize;

            // Stored size is the gap to the next item's offset; the final
            // item runs to the end of the stream.
            let mut item_size: i64 = match meta.data_offset(index + 1) {
                Some(next) => i64::from(next) - item_offset as i64,
                None => (stream.len() - item_offset) as i64,
            };

            if item_size == 0 {
                item_size = min_size as i64;
            }

            let available = stream.len() - item_offset;
            if item_size < 0 || item_size > available as i64 {
                let clamped = if max_expected == 0 {
                    available
                } else {
                    max_expected.min(available)
                };
                warnings.push(DecodeWarning::LengthClamped {
                    stream: "FixedData",
                    index,
                    stored: item_size as i32,
                    clamped,
                });
                item_size = clamped as i64;
            }

            let mut item_size = item_size as usize;
            if max_expected != 0 && item_size > max_expected {
                item_size = max_expected;
            }

            if item_size > 0 {
                items[index] = Some(stream.slice(item_offset..item_offset + item_size));
                offsets[index] = item_offset as i32;
            }
        }

        Self { items, offsets }
    }

    /// Decode assuming every item has the supplied size, ignoring the sizes
    /// implied by the metadata offsets. Used where the metadata is known to
    /// be inconsistent.
    pub fn with_item_size(
        meta: &FixedMeta,
        stream: Bytes,
        item_size: usize,
        warnings: &mut WarningSink,
    ) -> Self {
        let item_count = meta.item_count();
        let mut items = vec![None; item_count];
        let mut offsets = vec![0i32; item_count];

        for index in 0..item_count {
            let Some(item_offset) = meta.data_offset(index) else {
                continue;
            };
            if item_offset < 0 || item_offset as usize > stream.len() {
                warnings.push(DecodeWarning::OffsetOutOfRange {
                    stream: "FixedData",
                    offset: item_offset as u32,
                });
                continue;
            }
            let item_offset = item_offset as usize;
            let size = item_size.min(stream.len() - item_offset);

            items[index] = Some(stream.slice(item_offset..item_offset + size));
            offsets[index] = item_offset as i32;
        }

        Self { items, offsets }
    }

    /// Decode a bare stream of fixed-size records with no metadata at all.
    ///
    /// `read_remainder` includes a trailing partial record instead of
    /// dropping it.
    pub fn from_stream(stream: Bytes, item_size: usize, read_remainder: bool) -> Self {
        let mut item_count = stream.len() / item_size;
        if read_remainder && stream.len() % item_size != 0 {
            item_count += 1;
        }

        let mut items = Vec::with_capacity(item_count);
        let mut offsets = Vec::with_capacity(item_count);
        let mut offset = 0usize;

        for _ in 0..item_count {
            let end = stream.len().min(offset + item_size);
            items.push(Some(stream.slice(offset..end)));
            offsets.push(offset as i32);
            offset += item_size;
        }

        Self { items, offsets }
    }

    /// The item at `index`, if one was decoded there.
    pub fn item(&self, index: usize) -> Option<&[u8]> {
        self.items.get(index)?.as_deref()
    }

    /// Number of item slots (equal to the metadata item count).
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// True if `offset` is a valid item index for this block.
    pub fn is_valid_offset(&self, offset: i32) -> bool {
        offset >= 0 && (offset as usize) < self.items.len()
    }

    /// Map a stream offset back to the index of the item stored there.
    pub fn index_from_offset(&self, offset: i32) -> Option<usize> {
        self.offsets.iter().position(|&o| o == offset)
    }
}
