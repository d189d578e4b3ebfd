//! VarMeta stream reader.
//!
//! A VarMeta stream indexes the companion Var2Data stream: each entry maps
//! a (unique id, data type) pair to the offset of a length-prefixed blob.
//! The entry layout grew by four bytes per field across schema generations,
//! so the reader is parameterised over the two widths in use.
use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;

use crate::common::binary::{read_u16_le, read_u32_le};
use crate::common::error::{DecodeWarning, Error, Result, WarningSink};
use crate::mpp::blocks::BLOCK_MAGIC;

const HEADER_SIZE: usize = 16;

/// Decoded VarMeta stream: (unique id, type) → Var2Data offset.
pub struct VarMeta {
    entries: BTreeMap<(u32, u32), u32>,
    offsets: Vec<u32>,
}

impl VarMeta {
    /// Decode the 12-byte entry layout (u32 id, u16 type, u16 flags,
    /// u32 offset) used by the older schema generation.
    pub fn read_narrow(stream: Bytes, warnings: &mut WarningSink) -> Result<Self> {
        Self::read(stream, 12, |data, offset| {
            Ok((
                read_u32_le(data, offset)?,
                u32::from(read_u16_le(data, offset + 4)?),
                read_u32_le(data, offset + 8)?,
            ))
        }, warnings)
    }

    /// Decode the 16-byte entry layout (u32 id, u32 type, u32 flags,
    /// u32 offset) used by later schema generations.
    pub fn read_wide(stream: Bytes, warnings: &mut WarningSink) -> Result<Self> {
        Self::read(stream, 16, |data, offset| {
            Ok((
                read_u32_le(data, offset)?,
                read_u32_le(data, offset + 4)?,
                read_u32_le(data, offset + 12)?,
            ))
        }, warnings)
    }

    fn read(
        stream: Bytes,
        entry_size: usize,
        decode_entry: impl Fn(&[u8], usize) -> Result<(u32, u32, u32)>,
        warnings: &mut WarningSink,
    ) -> Result<Self> {
        if stream.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                needed: HEADER_SIZE,
                available: stream.len(),
            });
        }

        let magic = read_u32_le(&stream, 0)?;
        if magic != BLOCK_MAGIC {
            return Err(Error::BadMagic {
                stream: "VarMeta",
                expected: BLOCK_MAGIC,
                found: magic,
            });
        }

        let declared = read_u32_le(&stream, 4)?;
        let available = stream.len() - HEADER_SIZE;
        let item_count = (available / entry_size).min(declared as usize);
        if item_count != declared as usize {
            warnings.push(DecodeWarning::ItemCountAdjusted {
                stream: "VarMeta",
                declared,
                derived: item_count as u32,
            });
        }

        let mut entries = BTreeMap::new();
        let mut offsets = Vec::with_capacity(item_count);
        for index in 0..item_count {
            let (id, data_type, offset) = decode_entry(&stream, HEADER_SIZE + index * entry_size)?;
            entries.insert((id, data_type), offset);
            offsets.push(offset);
        }

        Ok(Self { entries, offsets })
    }

    /// The Var2Data offset for the given unique id and data type.
    pub fn offset(&self, id: u32, data_type: u32) -> Option<u32> {
        self.entries.get(&(id, data_type)).copied()
    }

    /// All Var2Data offsets, in entry order.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// The distinct unique ids present, in ascending order.
    pub fn unique_ids(&self) -> Vec<u32> {
        let ids: BTreeSet<u32> = self.entries.keys().map(|&(id, _)| id).collect();
        ids.into_iter().collect()
    }

    /// The data types recorded for one unique id, in ascending order.
    pub fn types_for(&self, id: u32) -> Vec<u32> {
        self.entries
            .range((id, 0)..=(id, u32::MAX))
            .map(|(&(_, t), _)| t)
            .collect()
    }

    /// Number of index entries decoded.
    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn narrow_stream(entries: &[(u32, u16, u32)]) -> Bytes {
        let mut data = Vec::new();
        data.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        for &(id, data_type, offset) in entries {
            data.extend_from_slice(&id.to_le_bytes());
            data.extend_from_slice(&data_type.to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes());
            data.extend_from_slice(&offset.to_le_bytes());
        }
        Bytes::from(data)
    }

    #[test]
    fn test_narrow_entries() {
        let stream = narrow_stream(&[(1, 4, 0), (1, 7, 20), (3, 4, 44)]);
        let mut warnings = WarningSink::new();
        let meta = VarMeta::read_narrow(stream, &mut warnings).unwrap();

        assert_eq!(meta.offset(1, 4), Some(0));
        assert_eq!(meta.offset(1, 7), Some(20));
        assert_eq!(meta.offset(3, 4), Some(44));
        assert_eq!(meta.offset(2, 4), None);
        assert_eq!(meta.unique_ids(), vec![1, 3]);
        assert_eq!(meta.types_for(1), vec![4, 7]);
        assert_eq!(meta.offsets(), &[0, 20, 44]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_wide_entries() {
        let mut data = Vec::new();
        data.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&9u32.to_le_bytes());
        data.extend_from_slice(&200u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&64u32.to_le_bytes());

        let mut warnings = WarningSink::new();
        let meta = VarMeta::read_wide(Bytes::from(data), &mut warnings).unwrap();
        assert_eq!(meta.offset(9, 200), Some(64));
    }

    #[test]
    fn test_declared_count_truncated_to_available() {
        let mut stream = narrow_stream(&[(1, 4, 0)]).to_vec();
        // Claim three entries while only one is present.
        stream[4..8].copy_from_slice(&3u32.to_le_bytes());
        let mut warnings = WarningSink::new();
        let meta = VarMeta::read_narrow(Bytes::from(stream), &mut warnings).unwrap();
        assert_eq!(meta.entry_count(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_bad_magic() {
        let mut stream = narrow_stream(&[]).to_vec();
        stream[3] = 0x00;
        let mut warnings = WarningSink::new();
        assert!(matches!(
            VarMeta::read_narrow(Bytes::from(stream), &mut warnings),
            Err(Error::BadMagic { .. })
        ));
    }
}
