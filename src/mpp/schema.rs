//! Schema generations and their offset tables.
//!
//! Successive file-format generations moved fields around inside otherwise
//! identical record shapes. Each generation is described by plain data
//! tables; a decode pass picks the table for its version once and never
//! mixes generations.
use bytes::Bytes;

use crate::common::error::{Result, WarningSink};
use crate::model::fields::{DataType, FieldClass, FieldRef};
use crate::mpp::blocks::{Props, VarMeta};

/// A supported file-format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    Mpp8,
    Mpp9,
    Mpp12,
    Mpp14,
}

impl SchemaVersion {
    /// Name of the project data directory under the container root.
    pub fn project_directory(self) -> &'static str {
        match self {
            SchemaVersion::Mpp8 => "   1",
            SchemaVersion::Mpp9 => "   19",
            SchemaVersion::Mpp12 => "   112",
            SchemaVersion::Mpp14 => "   114",
        }
    }

    /// Name of the view data directory under the container root.
    pub fn view_directory(self) -> &'static str {
        match self {
            SchemaVersion::Mpp8 => "   2",
            SchemaVersion::Mpp9 => "   29",
            SchemaVersion::Mpp12 => "   212",
            SchemaVersion::Mpp14 => "   214",
        }
    }

    /// Name of the root property stream inside the project directory.
    pub fn props_stream(self) -> &'static str {
        match self {
            SchemaVersion::Mpp8 => "Props",
            SchemaVersion::Mpp9 => "Props9",
            SchemaVersion::Mpp12 => "Props12",
            SchemaVersion::Mpp14 => "Props14",
        }
    }

    /// Decode a property stream in this generation's layout.
    pub fn read_props(self, stream: Bytes, warnings: &mut WarningSink) -> Result<Props> {
        match self {
            SchemaVersion::Mpp8 => Props::read8(stream, warnings),
            SchemaVersion::Mpp9 => Props::read9(stream, warnings),
            SchemaVersion::Mpp12 => Props::read12(stream, warnings),
            SchemaVersion::Mpp14 => Props::read14(stream, warnings),
        }
    }

    /// Decode a VarMeta stream in this generation's entry layout.
    pub fn read_var_meta(self, stream: Bytes, warnings: &mut WarningSink) -> Result<VarMeta> {
        match self {
            SchemaVersion::Mpp8 | SchemaVersion::Mpp9 => VarMeta::read_narrow(stream, warnings),
            SchemaVersion::Mpp12 | SchemaVersion::Mpp14 => VarMeta::read_wide(stream, warnings),
        }
    }

    /// Calendar record offsets, absent for generations that store
    /// calendars elsewhere.
    pub fn calendar_layout(self) -> Option<&'static CalendarLayout> {
        match self {
            SchemaVersion::Mpp8 => None,
            SchemaVersion::Mpp9 => Some(&CALENDAR_LAYOUT_9),
            SchemaVersion::Mpp12 | SchemaVersion::Mpp14 => Some(&CALENDAR_LAYOUT_12),
        }
    }

    /// Criteria block offsets for filter and auto-filter decoding.
    pub fn criteria_layout(self) -> Option<&'static CriteriaLayout> {
        match self {
            SchemaVersion::Mpp8 => None,
            SchemaVersion::Mpp9 => Some(&CRITERIA_LAYOUT_9),
            SchemaVersion::Mpp12 | SchemaVersion::Mpp14 => Some(&CRITERIA_LAYOUT_12),
        }
    }

    /// Custom field value record offsets for the shared lookup reader.
    pub fn custom_field_layout(self) -> Option<&'static CustomFieldLayout> {
        match self {
            SchemaVersion::Mpp12 => Some(&CUSTOM_FIELD_LAYOUT_12),
            SchemaVersion::Mpp14 => Some(&CUSTOM_FIELD_LAYOUT_14),
            _ => None,
        }
    }
}

/// Offsets within a 12-byte calendar index record, plus the variable-data
/// type codes for the calendar name and data blobs.
pub struct CalendarLayout {
    pub calendar_id_offset: usize,
    pub base_id_offset: usize,
    pub resource_id_offset: usize,
    /// Offset of the first weekday sub-block within the calendar data
    /// blob.
    pub hours_offset: usize,
    pub name_var_type: u32,
    pub data_var_type: u32,
    /// Whether the calendar data blob carries a work week section after
    /// the exceptions.
    pub work_weeks: bool,
}

static CALENDAR_LAYOUT_9: CalendarLayout = CalendarLayout {
    calendar_id_offset: 0,
    base_id_offset: 4,
    resource_id_offset: 8,
    hours_offset: 4,
    name_var_type: 1,
    data_var_type: 3,
    work_weeks: false,
};

static CALENDAR_LAYOUT_12: CalendarLayout = CalendarLayout {
    calendar_id_offset: 0,
    base_id_offset: 4,
    resource_id_offset: 8,
    hours_offset: 0,
    name_var_type: 1,
    data_var_type: 8,
    work_weeks: true,
};

/// Offsets describing criteria block records inside a filter definition.
pub struct CriteriaLayout {
    /// Offset of the first criteria block within the definition record.
    pub criteria_start: usize,
    pub block_size: usize,
    /// Offset of the u16 marking where criteria text begins.
    pub criteria_text_start_offset: usize,
    /// Offset of the u32 field identifier within a block.
    pub field_offset: usize,
    /// Offset of the u16 child-block pointer within a block.
    pub child_offset: usize,
    /// Offset of the u16 next-sibling pointer within a block.
    pub list_next_offset: usize,
    /// Offset of a constant operand's value within a block.
    pub value_offset: usize,
    /// Offset of a duration constant's time unit within a block.
    pub time_units_offset: usize,
    /// Offset of the u16 offset into the text area for string constants.
    pub text_offset: usize,
    /// Offset of the u16 offset into the text area for prompt text.
    pub prompt_offset: usize,
}

static CRITERIA_LAYOUT_9: CriteriaLayout = CriteriaLayout {
    criteria_start: 20,
    block_size: 80,
    criteria_text_start_offset: 16,
    field_offset: 8,
    child_offset: 4,
    list_next_offset: 6,
    value_offset: 32,
    time_units_offset: 42,
    text_offset: 44,
    prompt_offset: 44,
};

static CRITERIA_LAYOUT_12: CriteriaLayout = CriteriaLayout {
    criteria_start: 24,
    block_size: 80,
    criteria_text_start_offset: 20,
    field_offset: 8,
    child_offset: 4,
    list_next_offset: 6,
    value_offset: 32,
    time_units_offset: 42,
    text_offset: 44,
    prompt_offset: 44,
};

/// Offsets within a custom field value record for the shared lookup
/// reader, plus the variable-data type codes for value and description
/// blobs.
pub struct CustomFieldLayout {
    /// Minimum record length worth decoding.
    pub min_record_size: usize,
    pub unique_id_offset: usize,
    pub parent_offset: usize,
    pub type_offset: usize,
    pub guid_offset: usize,
    pub field_offset: usize,
    pub value_var_type: u32,
    pub description_var_type: u32,
}

static CUSTOM_FIELD_LAYOUT_12: CustomFieldLayout = CustomFieldLayout {
    min_record_size: 32,
    unique_id_offset: 0,
    parent_offset: 4,
    type_offset: 8,
    guid_offset: 12,
    field_offset: 28,
    value_var_type: 22,
    description_var_type: 8,
};

static CUSTOM_FIELD_LAYOUT_14: CustomFieldLayout = CustomFieldLayout {
    min_record_size: 36,
    unique_id_offset: 0,
    parent_offset: 8,
    type_offset: 14,
    guid_offset: 16,
    field_offset: 32,
    value_var_type: 27,
    description_var_type: 8,
};

/// Value type of a field, used to decode typed constants compared against
/// it.
///
/// This is a compact mapping of the commonly referenced field indices;
/// anything unmapped reads as text, which matches how unrecognised fields
/// behave in the original application's filter dialog.
pub fn field_data_type(field: FieldRef) -> DataType {
    match field.class {
        FieldClass::Task => match field.index {
            20 | 29 => DataType::Duration,          // work, duration
            32 => DataType::Percentage,             // % complete
            35 | 36 => DataType::Date,              // start, finish
            37 => DataType::Currency,               // cost
            51..=60 => DataType::Text,              // text1-10
            87..=96 => DataType::Numeric,           // number1-10
            103..=105 => DataType::Duration,        // duration1-3
            106..=115 => DataType::Currency,        // cost1-10
            120..=139 => DataType::Boolean,         // flag1-20
            158..=167 => DataType::Date,            // date1-10
            _ => DataType::Text,
        },
        FieldClass::Resource => match field.index {
            12 => DataType::Duration,               // work
            21 => DataType::Currency,               // cost
            51..=60 => DataType::Text,              // text1-10
            87..=96 => DataType::Numeric,           // number1-10
            106..=115 => DataType::Currency,        // cost1-10
            120..=139 => DataType::Boolean,         // flag1-20
            158..=167 => DataType::Date,            // date1-10
            _ => DataType::Text,
        },
        _ => DataType::Unknown,
    }
}
