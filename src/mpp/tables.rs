//! Column table decoding.
//!
//! Tables live in their own directory under the view data directory: a
//! fixed record per table carrying the id and name, and a variable data
//! blob describing the columns. Custom column titles sit in a text area
//! after the column records, addressed by per-column offsets.
use crate::common::binary::{read_u16_le, read_u32_le, read_u8, unicode_string};
use crate::common::error::{Result, WarningSink};
use crate::model::fields::FieldRef;
use crate::model::views::{Column, Table};
use crate::mpp::blocks::{FixDeferFix, FixedData, FixedMeta, ItemSize, Var2Data};
use crate::mpp::chained_offset;
use crate::mpp::crypto::StreamFactory;
use crate::mpp::schema::SchemaVersion;
use crate::storage::{names, CompoundDirectory};

/// Metadata record size in the table directory.
const META_RECORD_SIZE: usize = 10;
/// Variable data type of the column blob.
const COLUMN_VAR_TYPE: u32 = 1;

/// Size of the column blob header.
const COLUMN_HEADER_SIZE: usize = 4;
/// Size of one column record.
const COLUMN_RECORD_SIZE: usize = 12;
/// Title offset marking a column without a custom title.
const NO_TITLE: u16 = 0xFFFF;

/// Fixed record size of a first-generation table.
const CHAINED_RECORD_SIZE: usize = 126;
/// Offset of the trailer pointer within that record.
const CHAINED_TRAILER_OFFSET: usize = 122;
/// Trailer offset of the column blob pointer.
const CHAINED_COLUMN_OFFSET: usize = 8;
/// First column record offset in a first-generation column blob.
const CHAINED_COLUMN_START: usize = 8;

/// Decodes the table directory of one file.
pub struct TableReader<'a> {
    version: SchemaVersion,
    streams: &'a StreamFactory,
}

impl<'a> TableReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { version, streams }
    }

    /// Read every table definition under `view_dir`.
    pub fn read(
        &self,
        view_dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Result<Vec<Table>> {
        if !view_dir.has_directory(names::TABLE_DIR) {
            return Ok(Vec::new());
        }
        let dir = view_dir.directory(names::TABLE_DIR)?;
        if self.version == SchemaVersion::Mpp8 {
            return self.read_chained(dir, warnings);
        }

        let meta = FixedMeta::new(
            self.streams.stream(dir, names::FIXED_META)?,
            ItemSize::Known(META_RECORD_SIZE),
            warnings,
        )?;
        let fixed = FixedData::from_meta(&meta, self.streams.stream(dir, names::FIXED_DATA)?, warnings);
        let var_meta = self
            .version
            .read_var_meta(self.streams.stream(dir, names::VAR_META)?, warnings)?;
        let var = Var2Data::new(&var_meta, self.streams.stream(dir, names::VAR2_DATA)?, warnings);

        let mut tables = Vec::new();
        for index in 0..fixed.item_count() {
            let Some(item) = fixed.item(index) else {
                continue;
            };
            let Ok(id) = read_u32_le(item, 0) else {
                continue;
            };

            let mut table = Table {
                id,
                name: crate::mpp::clean_name(unicode_string(item, 4)),
                ..Default::default()
            };
            if let Some(blob) = var.byte_array(id, COLUMN_VAR_TYPE) {
                table.resource = read_u8(blob, 2).unwrap_or(0) != 0;
                table.columns = read_columns(blob);
            }
            tables.push(table);
        }
        Ok(tables)
    }

    /// Read first-generation table records: a bare fixed stream with the
    /// id and name inline, and the column blob reached through a keyed
    /// trailer in the chained deferred stream.
    fn read_chained(
        &self,
        dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Result<Vec<Table>> {
        let fixed = FixedData::from_stream(
            self.streams.stream(dir, names::FIX_FIX)?,
            CHAINED_RECORD_SIZE,
            false,
        );
        let defer = FixDeferFix::new(self.streams.stream(dir, names::FIX_DEFER_FIX)?);

        let mut tables = Vec::new();
        for index in 0..fixed.item_count() {
            let Some(record) = fixed.item(index) else {
                continue;
            };
            let Ok(id) = read_u32_le(record, 0) else {
                continue;
            };

            let mut table = Table {
                id,
                name: crate::mpp::clean_name(unicode_string(record, 4)),
                ..Default::default()
            };
            if let Some(trailer) =
                defer.byte_array(chained_offset(record, CHAINED_TRAILER_OFFSET), warnings)
            {
                if let Some(blob) =
                    defer.byte_array(chained_offset(&trailer, CHAINED_COLUMN_OFFSET), warnings)
                {
                    read_chained_columns(&blob, &mut table);
                }
            }
            tables.push(table);
        }
        Ok(tables)
    }
}

/// Decode the first-generation column records: a count stored one short
/// at offset 4, then 12-byte records. Custom title offsets address the
/// blob directly, with zero meaning no title; the first column's low
/// field word doubles as the resource flag.
fn read_chained_columns(blob: &[u8], table: &mut Table) {
    let Ok(stored) = read_u16_le(blob, 4) else {
        return;
    };
    let count = usize::from(stored) + 1;
    for index in 0..count {
        let base = CHAINED_COLUMN_START + index * COLUMN_RECORD_SIZE;
        if base + COLUMN_RECORD_SIZE > blob.len() {
            break;
        }
        let Ok(raw) = read_u32_le(blob, base) else {
            break;
        };
        if index == 0 {
            table.resource = read_u16_le(blob, base).unwrap_or(0) == 0;
        }

        let title_offset = usize::from(read_u16_le(blob, base + 6).unwrap_or(0));
        let title = if title_offset == 0 || title_offset >= blob.len() {
            None
        } else {
            let text = unicode_string(blob, title_offset);
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        };

        table.columns.push(Column {
            field: FieldRef::from_raw(raw),
            width: read_u8(blob, base + 4).unwrap_or(0),
            title,
            align_title: read_u8(blob, base + 8).unwrap_or(0),
            align_data: read_u8(blob, base + 10).unwrap_or(0),
        });
    }
}

/// Decode the column records of one table blob.
fn read_columns(blob: &[u8]) -> Vec<Column> {
    let count = usize::from(read_u16_le(blob, 0).unwrap_or(0));
    let text_start = COLUMN_HEADER_SIZE + count * COLUMN_RECORD_SIZE;
    let mut columns = Vec::new();
    for index in 0..count {
        let base = COLUMN_HEADER_SIZE + index * COLUMN_RECORD_SIZE;
        if base + COLUMN_RECORD_SIZE > blob.len() {
            break;
        }
        let Ok(raw) = read_u32_le(blob, base) else {
            break;
        };

        let title_offset = read_u16_le(blob, base + 8).unwrap_or(NO_TITLE);
        let title = if title_offset == NO_TITLE {
            None
        } else {
            let start = text_start + usize::from(title_offset);
            if start < blob.len() {
                let text = unicode_string(blob, start);
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            } else {
                None
            }
        };

        columns.push(Column {
            field: FieldRef::from_raw(raw),
            width: read_u8(blob, base + 4).unwrap_or(0),
            title,
            align_title: read_u8(blob, base + 5).unwrap_or(0),
            align_data: read_u8(blob, base + 6).unwrap_or(0),
        });
    }
    columns
}
