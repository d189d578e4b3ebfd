//! Custom field definitions, lookup tables and their values.
use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::common::guid::Guid;
use crate::model::fields::{FieldRef, TimeUnit};
use crate::model::views::GraphicalIndicator;

/// A decoded custom field or lookup value.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Text(String),
    Cost(f64),
    Number(f64),
    Date(Option<NaiveDateTime>),
    Duration { minutes: f64, unit: TimeUnit },
    Flag(bool),
    /// A type tag this decoder does not recognise; raw bytes preserved.
    Raw(Vec<u8>),
}

/// One entry in a lookup table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomFieldValueItem {
    pub unique_id: u32,
    pub guid: Option<Guid>,
    pub parent_unique_id: Option<u32>,
    pub value: Option<CustomValue>,
    pub description: Option<String>,
}

/// An ordered lookup table owned by a custom field.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    pub guid: Option<Guid>,
    items: Vec<CustomFieldValueItem>,
}

impl LookupTable {
    /// Add an item. An item with the same unique id replaces the existing
    /// entry in place, keeping table order stable.
    pub fn add(&mut self, item: CustomFieldValueItem) {
        match self
            .items
            .iter()
            .position(|existing| existing.unique_id == item.unique_id)
        {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    /// The items in table order.
    pub fn items(&self) -> &[CustomFieldValueItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find an item by unique id.
    pub fn get(&self, unique_id: u32) -> Option<&CustomFieldValueItem> {
        self.items.iter().find(|item| item.unique_id == unique_id)
    }
}

/// Configuration attached to one custom field.
#[derive(Debug, Clone, Default)]
pub struct CustomField {
    pub alias: Option<String>,
    pub lookup_table: LookupTable,
    pub indicator: Option<GraphicalIndicator>,
}

/// All custom field configuration discovered in a file, plus the flat
/// registry of lookup values by unique id.
#[derive(Debug, Default)]
pub struct CustomFieldRegistry {
    fields: BTreeMap<u32, CustomField>,
    values: BTreeMap<u32, CustomFieldValueItem>,
}

impl CustomFieldRegistry {
    /// The configuration for a field, created on first touch.
    pub fn get_or_create(&mut self, field: FieldRef) -> &mut CustomField {
        self.fields.entry(field.to_raw()).or_default()
    }

    /// The configuration for a field, if any was decoded.
    pub fn get(&self, field: FieldRef) -> Option<&CustomField> {
        self.fields.get(&field.to_raw())
    }

    /// Register a value in the flat unique-id index. Re-registration
    /// replaces the previous entry.
    pub fn register_value(&mut self, item: CustomFieldValueItem) {
        self.values.insert(item.unique_id, item);
    }

    /// Look up a registered value by unique id.
    pub fn value(&self, unique_id: u32) -> Option<&CustomFieldValueItem> {
        self.values.get(&unique_id)
    }

    /// Iterate configured fields.
    pub fn fields(&self) -> impl Iterator<Item = (FieldRef, &CustomField)> {
        self.fields
            .iter()
            .map(|(&raw, field)| (FieldRef::from_raw(raw), field))
    }

    /// Number of configured fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of registered lookup values.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}
