//! View, view state and Gantt bar style decoding.
//!
//! Views live in their own directory under the view data directory. The
//! fixed record carries the id and view type; the display name and the
//! bar style blob hang off the variable data. The saved view state (the
//! active view and the visible rows) lives in a separate single-entry
//! directory.
use std::collections::HashSet;

use crate::common::binary::{
    read_i32_le, read_u16_le, read_u32_le, read_u8, unicode_string, unicode_string_capped,
};
use crate::common::error::{Result, WarningSink};
use crate::model::fields::FieldRef;
use crate::model::views::{GanttBarStyle, View, ViewState};
use crate::mpp::blocks::{FixedData, FixedMeta, ItemSize, Var2Data};
use crate::mpp::crypto::StreamFactory;
use crate::mpp::schema::SchemaVersion;
use crate::storage::{names, CompoundDirectory};

/// Metadata record size in the view directory.
const META_RECORD_SIZE: usize = 10;
/// Variable data type of the view display name.
const NAME_VAR_TYPE: u32 = 1;
/// Variable data type of the Gantt bar style blob.
const BAR_STYLE_VAR_TYPE: u32 = 2;

/// Size of one bar style record.
const STYLE_RECORD_SIZE: usize = 58;
/// Offset of the style name within a record; the name fills the record
/// remainder.
const STYLE_NAME_OFFSET: usize = 16;
/// Offset of the first style record within the blob.
const STYLE_START: usize = 4;

/// Variable data id and type of the saved view state blob.
const VIEW_STATE_ID: u32 = 1;
const VIEW_STATE_VAR_TYPE: u32 = 1;

/// Fixed record size of a first-generation view; the id and name sit
/// inline and nothing hangs off variable data.
const CHAINED_RECORD_SIZE: usize = 138;

/// Views plus the bar styles of the Gantt chart view.
#[derive(Debug, Default)]
pub struct ViewSet {
    pub views: Vec<View>,
    pub bar_styles: Vec<GanttBarStyle>,
}

/// Decodes the view directory of one file.
pub struct ViewReader<'a> {
    version: SchemaVersion,
    streams: &'a StreamFactory,
}

impl<'a> ViewReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { version, streams }
    }

    /// Read every view definition under `view_dir`.
    pub fn read(
        &self,
        view_dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Result<ViewSet> {
        if !view_dir.has_directory(names::VIEW_DIR) {
            return Ok(ViewSet::default());
        }
        let dir = view_dir.directory(names::VIEW_DIR)?;
        if self.version == SchemaVersion::Mpp8 {
            return self.read_chained(dir);
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

        let mut set = ViewSet::default();
        // Deleted views leave behind metadata records pointing at the
        // same data offset; only the first wins.
        let mut seen_offsets: HashSet<i32> = HashSet::new();
        for index in 0..meta.item_count() {
            let Some(offset) = meta.data_offset(index) else {
                continue;
            };
            if !seen_offsets.insert(offset) {
                continue;
            }
            let Some(item) = fixed
                .index_from_offset(offset)
                .and_then(|i| fixed.item(i))
            else {
                continue;
            };
            let Ok(id) = read_u32_le(item, 0) else {
                continue;
            };

            set.views.push(View {
                id,
                view_type: read_u16_le(item, 4).unwrap_or(0),
                name: var
                    .unicode_string(id, NAME_VAR_TYPE)
                    .and_then(crate::mpp::clean_name),
            });
            if set.bar_styles.is_empty() {
                if let Some(blob) = var.byte_array(id, BAR_STYLE_VAR_TYPE) {
                    set.bar_styles = read_bar_styles(blob);
                }
            }
        }
        Ok(set)
    }

    /// Read first-generation view records. Bar styles are stored with the
    /// chart formatting rather than the view record, so none are decoded
    /// here.
    fn read_chained(&self, dir: &dyn CompoundDirectory) -> Result<ViewSet> {
        let fixed = FixedData::from_stream(
            self.streams.stream(dir, names::FIX_FIX)?,
            CHAINED_RECORD_SIZE,
            false,
        );

        let mut set = ViewSet::default();
        for index in 0..fixed.item_count() {
            let Some(record) = fixed.item(index) else {
                continue;
            };
            let Ok(id) = read_u32_le(record, 0) else {
                continue;
            };
            set.views.push(View {
                id,
                view_type: 0,
                name: crate::mpp::clean_name(unicode_string(record, 4)),
            });
        }
        Ok(set)
    }
}

/// Decode a bar style blob: a u16 style count, then one fixed record per
/// style.
pub fn read_bar_styles(data: &[u8]) -> Vec<GanttBarStyle> {
    let count = usize::from(read_u16_le(data, 0).unwrap_or(0));
    let mut styles = Vec::new();
    for index in 0..count {
        let base = STYLE_START + index * STYLE_RECORD_SIZE;
        if base + STYLE_RECORD_SIZE > data.len() {
            break;
        }
        let record = &data[base..base + STYLE_RECORD_SIZE];
        let name = unicode_string_capped(record, STYLE_NAME_OFFSET, STYLE_RECORD_SIZE - STYLE_NAME_OFFSET);
        styles.push(GanttBarStyle {
            name: if name.is_empty() { None } else { Some(name) },
            from_field: field_at(record, 8),
            to_field: field_at(record, 12),
            row: read_u8(record, 7).unwrap_or(0),
            middle_shape: read_u8(record, 0).unwrap_or(0),
            middle_pattern: read_u8(record, 1).unwrap_or(0),
            middle_color: read_u8(record, 2).unwrap_or(0),
            start_shape: read_u8(record, 3).unwrap_or(0),
            start_type: read_u8(record, 4).unwrap_or(0),
            end_shape: read_u8(record, 5).unwrap_or(0),
            end_type: read_u8(record, 6).unwrap_or(0),
        });
    }
    styles
}

fn field_at(record: &[u8], offset: usize) -> Option<FieldRef> {
    let raw = read_u32_le(record, offset).ok()?;
    if raw == 0 {
        None
    } else {
        Some(FieldRef::from_raw(raw))
    }
}

/// Decodes the saved view state directory of one file.
pub struct ViewStateReader<'a> {
    version: SchemaVersion,
    streams: &'a StreamFactory,
}

impl<'a> ViewStateReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { version, streams }
    }

    /// Read the saved view state, absent when the file carries none.
    pub fn read(
        &self,
        view_dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Result<Option<ViewState>> {
        if !view_dir.has_directory(names::EDL_DIR) {
            return Ok(None);
        }
        let dir = view_dir.directory(names::EDL_DIR)?;
        let var_meta = self
            .version
            .read_var_meta(self.streams.stream(dir, names::VAR_META)?, warnings)?;
        let var = Var2Data::new(&var_meta, self.streams.stream(dir, names::VAR2_DATA)?, warnings);

        let Some(data) = var.byte_array(VIEW_STATE_ID, VIEW_STATE_VAR_TYPE) else {
            return Ok(None);
        };

        let mut state = ViewState::default();
        if let Ok(top) = read_i32_le(data, 0) {
            if top > 0 {
                state.top_view_id = Some(top as u32);
            }
        }
        // The visible rows follow as i32 unique ids; a negative value
        // terminates the list.
        let mut offset = 4;
        while let Ok(id) = read_i32_le(data, offset) {
            if id < 0 {
                break;
            }
            state.visible_unique_ids.push(id as u32);
            offset += 4;
        }
        Ok(Some(state))
    }
}
