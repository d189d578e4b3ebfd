//! FixDeferFix stream reader.
//!
//! The stream is a sequence of 1024-byte blocks. The final four bytes of
//! each block hold the i32 offset of the continuation block (−1 ends the
//! chain); the remaining 1020 bytes are payload. An item starts at an
//! arbitrary offset inside a block with an i32 total size, and its data
//! fills the rest of that block and then each continuation block in turn.
use std::collections::HashSet;

use bytes::Bytes;

use crate::common::binary::read_i32_le;
use crate::common::error::{DecodeWarning, WarningSink};

const BLOCK_SIZE: usize = 1024;
const BLOCK_PAYLOAD: usize = BLOCK_SIZE - 4;

/// Decoded FixDeferFix stream.
pub struct FixDeferFix {
    data: Bytes,
}

impl FixDeferFix {
    /// Wrap a FixDeferFix stream for item extraction.
    pub fn new(stream: Bytes) -> Self {
        Self { data: stream }
    }

    /// Assemble the item starting at `offset`.
    ///
    /// Returns `None` when the offset or the size prefix is unusable. A
    /// chain that revisits a block or runs off the stream stops early and
    /// yields the bytes assembled so far, recording a warning.
    pub fn byte_array(&self, offset: i32, warnings: &mut WarningSink) -> Option<Vec<u8>> {
        if offset < 0 {
            return None;
        }
        let offset = offset as usize;
        let size = read_i32_le(&self.data, offset).ok()?;
        if size < 0 {
            return None;
        }
        let size = size as usize;

        let mut result = Vec::with_capacity(size);
        let mut visited: HashSet<usize> = HashSet::new();

        let mut block_start = (offset / BLOCK_SIZE) * BLOCK_SIZE;
        let mut cursor = offset + 4;

        while result.len() < size {
            if !visited.insert(block_start) {
                warnings.push(DecodeWarning::ChainCycle {
                    offset: block_start as u32,
                });
                break;
            }

            let payload_end = (block_start + BLOCK_PAYLOAD).min(self.data.len());
            if cursor < payload_end {
                let take = (size - result.len()).min(payload_end - cursor);
                result.extend_from_slice(&self.data[cursor..cursor + take]);
            }
            if result.len() >= size {
                break;
            }

            // Follow the continuation pointer in the block trailer.
            let Ok(next) = read_i32_le(&self.data, block_start + BLOCK_PAYLOAD) else {
                break;
            };
            if next < 0 || next as usize + BLOCK_SIZE > self.data.len() {
                break;
            }
            block_start = next as usize;
            cursor = block_start;
        }

        Some(result)
    }
}
