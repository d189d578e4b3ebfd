//! Props stream reader.
//!
//! A Props stream is a property bag: u32 keys mapped to raw values. The
//! header and the per-item alignment differ between schema generations,
//! but the resulting map and its typed accessors are shared.
use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::common::binary::{self, read_f64_le, read_u16_le, read_u32_le, read_u8};
use crate::common::dates;
use crate::common::error::{DecodeWarning, Error, Result, WarningSink};
use crate::common::guid::Guid;

/// Well-known property keys.
///
/// Only the keys the decode layer consumes are declared here; the key space
/// is much larger.
pub mod keys {
    /// Scheduled project start date (timestamp).
    pub const PROJECT_START_DATE: u32 = 37_748_738;
    /// Scheduled project finish date (timestamp).
    pub const PROJECT_FINISH_DATE: u32 = 37_748_739;
    /// Name of the default calendar.
    pub const DEFAULT_CALENDAR_NAME: u32 = 37_748_750;
    /// Working minutes in a standard day.
    pub const MINUTES_PER_DAY: u32 = 37_748_765;
    /// Status date (timestamp).
    pub const STATUS_DATE: u32 = 37_748_805;
    /// Default weekly working hours pattern.
    pub const DEFAULT_CALENDAR_HOURS: u32 = 37_753_736;
    /// Custom task field aliases.
    pub const TASK_FIELD_NAME_ALIASES: u32 = 1_048_577;
    /// Custom resource field aliases.
    pub const RESOURCE_FIELD_NAME_ALIASES: u32 = 1_048_578;
    /// Per-column task field attributes (graphical indicators, older
    /// custom field metadata).
    pub const TASK_FIELD_ATTRIBUTES: u32 = 37_753_744;
    /// Custom field definition block (later schema generations).
    pub const CUSTOM_FIELDS: u32 = 71_303_169;
    /// Non-zero when the file carries password protection.
    pub const PASSWORD_FLAG: u32 = 893_386_752;
    /// Hash of the read-protection password.
    pub const PROTECTION_PASSWORD_HASH: u32 = 893_386_756;
    /// Hash of the write-reservation password.
    pub const WRITE_RESERVATION_PASSWORD_HASH: u32 = 893_386_757;
    /// Byte combined with 0xFF to form the stream decryption mask.
    pub const ENCRYPTION_CODE: u32 = 893_386_759;
    /// Saved auto-filter definitions.
    pub const AUTO_FILTER: u32 = 893_386_767;
}

/// Decoded property bag.
#[derive(Debug, Default)]
pub struct Props {
    map: BTreeMap<u32, Bytes>,
}

impl Props {
    /// Decode the oldest layout: a bare u16 item count followed by items
    /// aligned to 2 bytes.
    pub fn read8(stream: Bytes, warnings: &mut WarningSink) -> Result<Self> {
        let count = read_u16_le(&stream, 0)?;
        Self::read_items(stream, 2, u32::from(count), 2, 0, warnings)
    }

    /// Decode the layout with a 16-byte header, u16 item count and 2-byte
    /// item alignment.
    pub fn read9(stream: Bytes, warnings: &mut WarningSink) -> Result<Self> {
        if stream.len() < 20 {
            return Err(Error::Truncated {
                needed: 20,
                available: stream.len(),
            });
        }
        let count = read_u16_le(&stream, 16)?;
        Self::read_items(stream, 20, u32::from(count), 2, 0, warnings)
    }

    /// Decode the layout with a 24-byte header, u32 item count and 4-byte
    /// item alignment.
    pub fn read12(stream: Bytes, warnings: &mut WarningSink) -> Result<Self> {
        if stream.len() < 28 {
            return Err(Error::Truncated {
                needed: 28,
                available: stream.len(),
            });
        }
        let count = read_u32_le(&stream, 24)?;
        Self::read_items(stream, 28, count, 4, 0, warnings)
    }

    /// As [`Props::read12`], with a 4-byte trailer after each item.
    pub fn read14(stream: Bytes, warnings: &mut WarningSink) -> Result<Self> {
        if stream.len() < 28 {
            return Err(Error::Truncated {
                needed: 28,
                available: stream.len(),
            });
        }
        let count = read_u32_le(&stream, 24)?;
        Self::read_items(stream, 28, count, 4, 4, warnings)
    }

    fn read_items(
        stream: Bytes,
        mut offset: usize,
        count: u32,
        align: usize,
        trailer: usize,
        warnings: &mut WarningSink,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();

        for index in 0..count {
            let (Ok(key), Ok(size)) = (
                read_u32_le(&stream, offset),
                read_u32_le(&stream, offset + 4),
            ) else {
                warnings.push(DecodeWarning::EntrySkipped {
                    stream: "Props",
                    detail: format!("item {index} of {count} truncated"),
                });
                break;
            };
            offset += 8;

            let size = size as usize;
            if offset + size > stream.len() {
                warnings.push(DecodeWarning::EntrySkipped {
                    stream: "Props",
                    detail: format!("value for key {key} overruns stream"),
                });
                break;
            }

            map.insert(key, stream.slice(offset..offset + size));
            offset += size.next_multiple_of(align) + trailer;
        }

        Ok(Self { map })
    }

    /// The raw value bytes for a key.
    pub fn byte_array(&self, key: u32) -> Option<&[u8]> {
        self.map.get(&key).map(|b| b.as_ref())
    }

    /// A byte value, defaulting to 0.
    pub fn byte(&self, key: u32) -> u8 {
        self.map
            .get(&key)
            .and_then(|data| read_u8(data, 0).ok())
            .unwrap_or(0)
    }

    /// A u16 value, defaulting to 0.
    pub fn short(&self, key: u32) -> u16 {
        self.map
            .get(&key)
            .and_then(|data| read_u16_le(data, 0).ok())
            .unwrap_or(0)
    }

    /// An i32 value, defaulting to 0.
    pub fn int(&self, key: u32) -> i32 {
        self.map
            .get(&key)
            .and_then(|data| binary::read_i32_le(data, 0).ok())
            .unwrap_or(0)
    }

    /// An f64 value, defaulting to 0.
    pub fn double(&self, key: u32) -> f64 {
        self.map
            .get(&key)
            .and_then(|data| read_f64_le(data, 0).ok())
            .unwrap_or(0.0)
    }

    /// A boolean value: a non-zero u16.
    pub fn boolean(&self, key: u32) -> bool {
        self.short(key) != 0
    }

    /// A NUL-terminated UTF-16 string value.
    pub fn unicode_string(&self, key: u32) -> Option<String> {
        self.map
            .get(&key)
            .map(|data| binary::unicode_string(data, 0))
    }

    /// A time-of-day value.
    pub fn time(&self, key: u32) -> Option<NaiveTime> {
        self.map.get(&key).and_then(|data| dates::time(data, 0))
    }

    /// A timestamp value.
    pub fn timestamp(&self, key: u32) -> Option<NaiveDateTime> {
        self.map.get(&key).and_then(|data| dates::timestamp(data, 0))
    }

    /// A date value.
    pub fn date(&self, key: u32) -> Option<NaiveDate> {
        self.map.get(&key).and_then(|data| dates::date(data, 0))
    }

    /// A GUID value.
    pub fn guid(&self, key: u32) -> Option<Guid> {
        self.map.get(&key).and_then(|data| Guid::read(data, 0))
    }

    /// All keys present, in ascending order.
    pub fn key_set(&self) -> impl Iterator<Item = u32> + '_ {
        self.map.keys().copied()
    }
}
