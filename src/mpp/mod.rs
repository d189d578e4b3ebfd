//! Decoders for the project-file binary container.
//!
//! The decode layer is organised around a small set of recurring stream
//! shapes (`blocks`), per-schema offset tables (`schema`), and component
//! readers that turn stream contents into model objects.

pub mod blocks;
pub mod calendar;
pub mod criteria;
pub mod crypto;
pub mod custom_fields;
pub mod filters;
pub mod groups;
pub mod indicators;
pub mod reader;
pub mod schema;
pub mod tables;
pub mod timephased;
pub mod views;

pub use reader::{ProjectData, ProjectReader};
pub use schema::SchemaVersion;

/// Strip menu accelerator markers from a stored definition name.
pub(crate) fn clean_name(raw: String) -> Option<String> {
    let cleaned: String = raw.chars().filter(|&c| c != '&').collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Read a chained-stream offset stored in a first-generation fixed
/// record. Offsets are stored one's-complemented; anything unreadable
/// maps to an invalid (negative) offset.
pub(crate) fn chained_offset(data: &[u8], offset: usize) -> i32 {
    match crate::common::binary::read_i32_le(data, offset) {
        Ok(value) => !value,
        Err(_) => -1,
    }
}
