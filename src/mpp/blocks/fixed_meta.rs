//! FixedMeta stream reader.
//!
//! A FixedMeta stream holds one fixed-size metadata record per item in a
//! companion FixedData stream. The 16-byte header carries a magic number
//! and a declared item count, but the declared count is unreliable; the
//! true count is always re-derived from the stream length.
use bytes::Bytes;
use zerocopy::{FromBytes, LE, U32};
use zerocopy_derive::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::common::binary::read_i32_le;
use crate::common::error::{DecodeWarning, Error, Result, WarningSink};
use crate::mpp::blocks::BLOCK_MAGIC;

const HEADER_SIZE: usize = 16;

/// The 16-byte stream header.
#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct MetaHeader {
    magic: U32<LE>,
    unknown1: U32<LE>,
    item_count: U32<LE>,
    unknown2: U32<LE>,
}

bitflags::bitflags! {
    /// Per-record flag byte at offset 0 of each metadata record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFlags: u8 {
        /// The record describes a deleted item.
        const DELETED = 0x02;
    }
}

/// How to determine the metadata record size for a FixedMeta stream.
pub enum ItemSize<'a> {
    /// The record size is a known constant.
    Known(usize),

    /// Choose from candidate sizes: a candidate whose derived item count
    /// matches the companion block's item count wins outright, otherwise
    /// the candidate leaving the smallest slack against the declared count
    /// is used.
    Candidates {
        sizes: &'a [usize],
        companion_items: Option<usize>,
    },

    /// Derive the size from the declared item count and the number of bytes
    /// following the header.
    Derive(&'a dyn Fn(u32, usize) -> usize),
}

/// Decoded FixedMeta stream.
pub struct FixedMeta {
    data: Bytes,
    item_size: usize,
    item_count: usize,
}

impl FixedMeta {
    /// Decode a FixedMeta stream.
    ///
    /// Fails only on structural problems: short header or wrong magic.
    /// A declared item count that disagrees with the stream length is
    /// recorded as a warning and replaced by the derived count.
    pub fn new(stream: Bytes, item_size: ItemSize, warnings: &mut WarningSink) -> Result<Self> {
        let Ok((header, _)) = MetaHeader::read_from_prefix(stream.as_ref()) else {
            return Err(Error::Truncated {
                needed: HEADER_SIZE,
                available: stream.len(),
            });
        };
        if header.magic.get() != BLOCK_MAGIC {
            return Err(Error::BadMagic {
                stream: "FixedMeta",
                expected: BLOCK_MAGIC,
                found: header.magic.get(),
            });
        }

        let declared = header.item_count.get();
        let available = stream.len() - HEADER_SIZE;

        let item_size = match item_size {
            ItemSize::Known(size) => size,
            ItemSize::Candidates {
                sizes,
                companion_items,
            } => Self::select_item_size(sizes, companion_items, declared, available)?,
            ItemSize::Derive(f) => f(declared, available),
        };
        if item_size == 0 {
            return Err(Error::InvalidData(
                "FixedMeta item size resolved to zero".to_string(),
            ));
        }

        let item_count = available / item_size;
        if item_count as u64 != u64::from(declared) {
            warnings.push(DecodeWarning::ItemCountAdjusted {
                stream: "FixedMeta",
                declared,
                derived: item_count as u32,
            });
        }

        Ok(Self {
            data: stream.slice(HEADER_SIZE..),
            item_size,
            item_count,
        })
    }

    fn select_item_size(
        sizes: &[usize],
        companion_items: Option<usize>,
        declared: u32,
        available: usize,
    ) -> Result<usize> {
        let mut best: Option<(usize, usize)> = None;
        for &size in sizes {
            if size == 0 {
                continue;
            }
            let derived = available / size;
            if companion_items == Some(derived) {
                return Ok(size);
            }
            let slack = derived.abs_diff(declared as usize);
            if best.map(|(s, _)| slack < s).unwrap_or(true) {
                best = Some((slack, size));
            }
        }
        best.map(|(_, size)| size).ok_or_else(|| {
            Error::InvalidData("no usable FixedMeta item size candidate".to_string())
        })
    }

    /// Number of metadata records, derived from the stream length.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Size in bytes of each metadata record.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// The metadata record at `index`.
    pub fn entry(&self, index: usize) -> Option<&[u8]> {
        if index >= self.item_count {
            return None;
        }
        let start = index * self.item_size;
        Some(&self.data[start..start + self.item_size])
    }

    /// The flag byte of the record at `index`.
    pub fn flags(&self, index: usize) -> RecordFlags {
        self.entry(index)
            .and_then(|e| e.first().copied())
            .map(RecordFlags::from_bits_truncate)
            .unwrap_or(RecordFlags::empty())
    }

    /// The companion FixedData offset stored at byte 4 of the record at
    /// `index`.
    pub fn data_offset(&self, index: usize) -> Option<i32> {
        self.entry(index).and_then(|e| read_i32_le(e, 4).ok())
    }
}
