//! Custom field configuration: aliases, lookup tables and their values.
//!
//! Three sources feed the registry. Field aliases come from two property
//! blobs holding packed strings. Value lists for the older generation are
//! embedded in the field attributes property, with outline code values in
//! their own data directory. Later generations keep every lookup value in
//! the outline code directory, one fixed record per value with the raw
//! value blob in the variable data.
use crate::common::binary::{read_i32_le, read_u16_le, read_u32_le, unicode_string};
use crate::common::dates;
use crate::common::error::{DecodeWarning, Result, WarningSink};
use crate::common::guid::Guid;
use crate::model::custom_fields::{CustomFieldRegistry, CustomFieldValueItem, CustomValue};
use crate::model::fields::{DataType, FieldClass, FieldRef, TimeUnit};
use crate::mpp::blocks::{keys, FixedData, FixedMeta, ItemSize, Props, Var2Data};
use crate::mpp::crypto::StreamFactory;
use crate::mpp::schema::{field_data_type, SchemaVersion};
use crate::storage::{names, CompoundDirectory};

/// Metadata record size in the outline code directory.
const OUTLINE_META_RECORD_SIZE: usize = 10;
/// Minimum outline code record carrying a field mapping.
const OUTLINE_RECORD_MIN: usize = 18;

/// Variable data types of outline code values in the older generation.
const OUTLINE_VALUE_TYPE: u32 = 1;
const OUTLINE_DESCRIPTION_TYPE: u32 = 2;

/// Field indices that can carry an alias, in the order the alias blobs
/// store them: text, number, duration, cost, flag and date custom fields.
fn alias_field_indices() -> impl Iterator<Item = u16> {
    (51..=60)
        .chain(87..=96)
        .chain(103..=105)
        .chain(106..=115)
        .chain(120..=139)
        .chain(158..=167)
}

/// Decodes custom field configuration for one file.
pub struct CustomFieldReader<'a> {
    version: SchemaVersion,
    streams: &'a StreamFactory,
}

impl<'a> CustomFieldReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { version, streams }
    }

    /// Populate `registry` from the property bag and the outline code
    /// directory.
    pub fn read(
        &self,
        project_dir: &dyn CompoundDirectory,
        props: &Props,
        registry: &mut CustomFieldRegistry,
        warnings: &mut WarningSink,
    ) -> Result<()> {
        read_aliases(props, keys::TASK_FIELD_NAME_ALIASES, FieldClass::Task, registry);
        read_aliases(
            props,
            keys::RESOURCE_FIELD_NAME_ALIASES,
            FieldClass::Resource,
            registry,
        );

        match self.version.custom_field_layout() {
            Some(_) => self.read_value_records(project_dir, registry, warnings)?,
            None => {
                read_embedded_value_lists(props, registry, warnings);
                self.read_outline_codes(project_dir, registry, warnings)?;
            }
        }
        Ok(())
    }

    /// Older generation: outline code values in their own directory,
    /// mapped to fields by the fixed records.
    fn read_outline_codes(
        &self,
        project_dir: &dyn CompoundDirectory,
        registry: &mut CustomFieldRegistry,
        warnings: &mut WarningSink,
    ) -> Result<()> {
        if !project_dir.has_directory(names::OUTLINE_CODE_DIR) {
            return Ok(());
        }
        let dir = project_dir.directory(names::OUTLINE_CODE_DIR)?;

        let meta = FixedMeta::new(
            self.streams.stream(dir, names::FIXED_META)?,
            ItemSize::Known(OUTLINE_META_RECORD_SIZE),
            warnings,
        )?;
        let fixed = FixedData::from_meta(&meta, self.streams.stream(dir, names::FIXED_DATA)?, warnings);
        let var_meta = self
            .version
            .read_var_meta(self.streams.stream(dir, names::VAR_META)?, warnings)?;
        let var = Var2Data::new(&var_meta, self.streams.stream(dir, names::VAR2_DATA)?, warnings);

        for index in 0..fixed.item_count() {
            let Some(record) = fixed.item(index) else {
                continue;
            };
            if record.len() < OUTLINE_RECORD_MIN {
                continue;
            }
            let value_id = u32::from(read_u16_le(record, 0).unwrap_or(0));
            let field = FieldRef::from_raw(read_u32_le(record, 12).unwrap_or(0));
            if value_id == 0 {
                continue;
            }

            let value = var
                .unicode_string(value_id, OUTLINE_VALUE_TYPE)
                .map(CustomValue::Text);
            if value.is_none() {
                continue;
            }
            let item = CustomFieldValueItem {
                unique_id: value_id,
                value,
                description: var.unicode_string(value_id, OUTLINE_DESCRIPTION_TYPE),
                ..Default::default()
            };
            registry.register_value(item.clone());
            registry.get_or_create(field).lookup_table.add(item);
        }
        Ok(())
    }

    /// Later generations: one fixed record per lookup value, raw value
    /// blobs in the variable data, typed by a tag in the record.
    fn read_value_records(
        &self,
        project_dir: &dyn CompoundDirectory,
        registry: &mut CustomFieldRegistry,
        warnings: &mut WarningSink,
    ) -> Result<()> {
        let Some(layout) = self.version.custom_field_layout() else {
            return Ok(());
        };
        if !project_dir.has_directory(names::OUTLINE_CODE_DIR) {
            return Ok(());
        }
        let dir = project_dir.directory(names::OUTLINE_CODE_DIR)?;

        let meta = FixedMeta::new(
            self.streams.stream(dir, names::FIXED2_META)?,
            ItemSize::Known(OUTLINE_META_RECORD_SIZE),
            warnings,
        )?;
        let fixed = FixedData::from_meta(&meta, self.streams.stream(dir, names::FIXED2_DATA)?, warnings);
        let var_meta = self
            .version
            .read_var_meta(self.streams.stream(dir, names::VAR_META)?, warnings)?;
        let var = Var2Data::new(&var_meta, self.streams.stream(dir, names::VAR2_DATA)?, warnings);

        for index in 0..fixed.item_count() {
            let Some(record) = fixed.item(index) else {
                continue;
            };
            if record.len() < layout.min_record_size {
                warnings.push(DecodeWarning::EntrySkipped {
                    stream: "Fixed2Data",
                    detail: format!("lookup value record {index} too short"),
                });
                continue;
            }

            let unique_id = read_u32_le(record, layout.unique_id_offset).unwrap_or(0);
            if unique_id == 0 {
                continue;
            }
            let parent = read_u32_le(record, layout.parent_offset).unwrap_or(0);
            let type_tag = read_u16_le(record, layout.type_offset).unwrap_or(0);
            let field = FieldRef::from_raw(read_u32_le(record, layout.field_offset).unwrap_or(0));

            let item = CustomFieldValueItem {
                unique_id,
                guid: Guid::read(record, layout.guid_offset),
                parent_unique_id: (parent != 0).then_some(parent),
                value: var
                    .byte_array(unique_id, layout.value_var_type)
                    .map(|raw| decode_tagged_value(type_tag, raw)),
                description: var.unicode_string(unique_id, layout.description_var_type),
            };
            registry.register_value(item.clone());
            registry.get_or_create(field).lookup_table.add(item);
        }
        Ok(())
    }
}

/// Decode the packed alias strings of one property blob.
///
/// The blob is a sequence of NUL-terminated strings, one slot per
/// aliasable field in a fixed order; empty strings mean no alias.
fn read_aliases(props: &Props, key: u32, class: FieldClass, registry: &mut CustomFieldRegistry) {
    let Some(data) = props.byte_array(key) else {
        return;
    };

    let mut offset = 0;
    for index in alias_field_indices() {
        if offset >= data.len() {
            break;
        }
        let alias = unicode_string(data, offset);
        offset += (alias.encode_utf16().count() + 1) * 2;
        if alias.is_empty() {
            continue;
        }
        registry.get_or_create(FieldRef::new(class, index)).alias = Some(alias);
    }
}

/// Older generation: per-field value lists embedded in the field
/// attributes property, alongside the indicator definitions.
fn read_embedded_value_lists(
    props: &Props,
    registry: &mut CustomFieldRegistry,
    warnings: &mut WarningSink,
) {
    let Some(data) = props.byte_array(keys::TASK_FIELD_ATTRIBUTES) else {
        return;
    };
    let (Ok(length), Ok(list_count)) = (read_i32_le(data, 0), read_i32_le(data, 4)) else {
        return;
    };
    let length = (length.max(0) as usize).min(data.len());

    let mut next_unique_id = 1u32;
    let mut header_offset = 8;
    for _ in 0..list_count.max(0) {
        if header_offset + 8 > length {
            break;
        }
        let (Ok(raw_field), Ok(list_offset)) = (
            read_i32_le(data, header_offset),
            read_i32_le(data, header_offset + 4),
        ) else {
            break;
        };
        header_offset += 8;
        if list_offset < 0 {
            continue;
        }
        let list_offset = list_offset as usize;
        if list_offset + 20 > data.len() {
            warnings.push(DecodeWarning::OffsetOutOfRange {
                stream: "Props",
                offset: list_offset as u32,
            });
            continue;
        }

        let field = FieldRef::from_raw(raw_field as u32);
        read_value_list(data, list_offset, field, &mut next_unique_id, registry);
    }
}

/// Decode one embedded value list: packed typed values followed by packed
/// descriptions, delimited by offsets stored in the definition region.
fn read_value_list(
    data: &[u8],
    list_offset: usize,
    field: FieldRef,
    next_unique_id: &mut u32,
    registry: &mut CustomFieldRegistry,
) {
    let region = |at: usize| -> Option<usize> {
        let stored = read_i32_le(data, at).ok()?;
        if stored < 0 {
            return None;
        }
        Some((list_offset + stored as usize).min(data.len()))
    };
    let Some(values_start) = region(list_offset + 8) else {
        return;
    };
    let Some(values_end) = region(list_offset + 12) else {
        return;
    };
    let Some(descriptions_end) = region(list_offset + 16) else {
        return;
    };

    let data_type = field_data_type(field);
    let mut values = Vec::new();
    let mut pos = values_start;
    while pos < values_end {
        let Some((value, next)) = decode_packed_value(data, pos, data_type) else {
            break;
        };
        values.push(value);
        pos = next;
    }

    let mut descriptions = Vec::new();
    let mut pos = values_end;
    while pos < descriptions_end {
        let text = unicode_string(data, pos);
        pos += (text.encode_utf16().count() + 1) * 2;
        descriptions.push(text);
    }

    for (index, value) in values.into_iter().enumerate() {
        let item = CustomFieldValueItem {
            unique_id: *next_unique_id,
            value: Some(value),
            description: descriptions.get(index).filter(|d| !d.is_empty()).cloned(),
            ..Default::default()
        };
        *next_unique_id += 1;
        registry.register_value(item.clone());
        registry.get_or_create(field).lookup_table.add(item);
    }
}

/// Decode one packed value of an embedded list, returning the value and
/// the position after it.
fn decode_packed_value(
    data: &[u8],
    pos: usize,
    data_type: DataType,
) -> Option<(CustomValue, usize)> {
    match data_type {
        DataType::Text => {
            let text = unicode_string(data, pos);
            let advance = (text.encode_utf16().count() + 1) * 2;
            Some((CustomValue::Text(text), pos + advance))
        }
        DataType::Currency => {
            let value = crate::common::binary::read_f64_le(data, pos).ok()?;
            Some((CustomValue::Cost(value / 100.0), pos + 8))
        }
        DataType::Numeric | DataType::Percentage => {
            let value = crate::common::binary::read_f64_le(data, pos).ok()?;
            Some((CustomValue::Number(value), pos + 8))
        }
        DataType::Date => Some((CustomValue::Date(dates::timestamp(data, pos)), pos + 4)),
        DataType::Duration => {
            let tenths = read_i32_le(data, pos).ok()?;
            let unit = TimeUnit::from_raw(read_u16_le(data, pos + 4).ok()?);
            Some((
                CustomValue::Duration {
                    minutes: f64::from(tenths) / 10.0,
                    unit,
                },
                pos + 6,
            ))
        }
        DataType::Boolean => {
            let value = read_u16_le(data, pos).ok()?;
            Some((CustomValue::Flag(value == 1), pos + 2))
        }
        DataType::Unknown => None,
    }
}

/// Decode a raw lookup value blob by its record type tag.
fn decode_tagged_value(tag: u16, raw: &[u8]) -> CustomValue {
    match tag {
        1 => CustomValue::Text(unicode_string(raw, 0)),
        2 => crate::common::binary::read_f64_le(raw, 0)
            .map(|v| CustomValue::Cost(v / 100.0))
            .unwrap_or_else(|_| CustomValue::Raw(raw.to_vec())),
        3 => crate::common::binary::read_f64_le(raw, 0)
            .map(CustomValue::Number)
            .unwrap_or_else(|_| CustomValue::Raw(raw.to_vec())),
        4 => CustomValue::Date(dates::timestamp(raw, 0)),
        5 => match (read_i32_le(raw, 0), read_u16_le(raw, 4)) {
            (Ok(tenths), Ok(unit)) => CustomValue::Duration {
                minutes: f64::from(tenths) / 10.0,
                unit: TimeUnit::from_raw(unit),
            },
            _ => CustomValue::Raw(raw.to_vec()),
        },
        6 => read_u16_le(raw, 0)
            .map(|v| CustomValue::Flag(v == 1))
            .unwrap_or_else(|_| CustomValue::Raw(raw.to_vec())),
        _ => CustomValue::Raw(raw.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::mpp::blocks::BLOCK_MAGIC;
    use crate::storage::MemoryDirectory;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .chain([0, 0])
            .collect()
    }

    fn props9(items: &[(u32, &[u8])]) -> Props {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&(items.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        for &(key, value) in items {
            data.extend_from_slice(&key.to_le_bytes());
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
            data.extend_from_slice(value);
            if value.len() % 2 != 0 {
                data.push(0);
            }
        }
        let mut warnings = WarningSink::new();
        Props::read9(Bytes::from(data), &mut warnings).unwrap()
    }

    #[test]
    fn test_aliases_in_slot_order() {
        // Slot 0 is text1 (index 51), slot 1 text2; an empty slot leaves
        // the field untouched.
        let mut blob = Vec::new();
        blob.extend_from_slice(&utf16("Phase"));
        blob.extend_from_slice(&utf16(""));
        blob.extend_from_slice(&utf16("Region"));
        let props = props9(&[(keys::TASK_FIELD_NAME_ALIASES, &blob)]);

        let mut registry = CustomFieldRegistry::default();
        read_aliases(&props, keys::TASK_FIELD_NAME_ALIASES, FieldClass::Task, &mut registry);

        assert_eq!(
            registry
                .get(FieldRef::new(FieldClass::Task, 51))
                .unwrap()
                .alias
                .as_deref(),
            Some("Phase")
        );
        assert!(registry.get(FieldRef::new(FieldClass::Task, 52)).is_none());
        assert_eq!(
            registry
                .get(FieldRef::new(FieldClass::Task, 53))
                .unwrap()
                .alias
                .as_deref(),
            Some("Region")
        );
    }

    #[test]
    fn test_embedded_text_value_list() {
        // One list for task text1 with two values and two descriptions.
        let field = FieldRef::new(FieldClass::Task, 51);
        let list_offset = 16usize;

        let mut list = vec![0u8; 20];
        let values: Vec<u8> = [utf16("red"), utf16("green")].concat();
        let descriptions: Vec<u8> = [utf16("stop"), utf16("go")].concat();
        list[8..12].copy_from_slice(&20i32.to_le_bytes());
        list[12..16].copy_from_slice(&((20 + values.len()) as i32).to_le_bytes());
        list[16..20]
            .copy_from_slice(&((20 + values.len() + descriptions.len()) as i32).to_le_bytes());
        list.extend_from_slice(&values);
        list.extend_from_slice(&descriptions);

        let mut blob = vec![0u8; 8];
        blob.extend_from_slice(&(field.to_raw() as i32).to_le_bytes());
        blob.extend_from_slice(&(list_offset as i32).to_le_bytes());
        blob.extend_from_slice(&list);
        blob[4..8].copy_from_slice(&1i32.to_le_bytes());
        let total = blob.len() as i32;
        blob[0..4].copy_from_slice(&total.to_le_bytes());

        let props = props9(&[(keys::TASK_FIELD_ATTRIBUTES, &blob)]);
        let mut registry = CustomFieldRegistry::default();
        let mut warnings = WarningSink::new();
        read_embedded_value_lists(&props, &mut registry, &mut warnings);

        let table = &registry.get(field).unwrap().lookup_table;
        assert_eq!(table.items().len(), 2);
        assert_eq!(
            table.items()[0].value,
            Some(CustomValue::Text("red".to_string()))
        );
        assert_eq!(table.items()[0].description.as_deref(), Some("stop"));
        assert_eq!(
            table.items()[1].value,
            Some(CustomValue::Text("green".to_string()))
        );
        // Values are registered with sequential unique ids.
        assert_eq!(registry.value(1).unwrap().description.as_deref(), Some("stop"));
        assert_eq!(registry.value_count(), 2);
    }

    #[test]
    fn test_embedded_duration_values() {
        let field = FieldRef::new(FieldClass::Task, 103);
        let list_offset = 16usize;

        let mut list = vec![0u8; 20];
        let mut values = Vec::new();
        values.extend_from_slice(&4800i32.to_le_bytes());
        values.extend_from_slice(&0x05u16.to_le_bytes());
        list[8..12].copy_from_slice(&20i32.to_le_bytes());
        list[12..16].copy_from_slice(&((20 + values.len()) as i32).to_le_bytes());
        list[16..20].copy_from_slice(&((20 + values.len()) as i32).to_le_bytes());
        list.extend_from_slice(&values);

        let mut blob = vec![0u8; 8];
        blob.extend_from_slice(&(field.to_raw() as i32).to_le_bytes());
        blob.extend_from_slice(&(list_offset as i32).to_le_bytes());
        blob.extend_from_slice(&list);
        blob[4..8].copy_from_slice(&1i32.to_le_bytes());
        let total = blob.len() as i32;
        blob[0..4].copy_from_slice(&total.to_le_bytes());

        let props = props9(&[(keys::TASK_FIELD_ATTRIBUTES, &blob)]);
        let mut registry = CustomFieldRegistry::default();
        let mut warnings = WarningSink::new();
        read_embedded_value_lists(&props, &mut registry, &mut warnings);

        let table = &registry.get(field).unwrap().lookup_table;
        assert_eq!(
            table.items()[0].value,
            Some(CustomValue::Duration {
                minutes: 480.0,
                unit: TimeUnit::Hours
            })
        );
    }

    fn outline_dir(records: &[Vec<u8>], var_entries: &[(u32, u16, u32)], var_data: &[u8]) -> MemoryDirectory {
        let mut fixed_data = Vec::new();
        let mut meta = Vec::new();
        meta.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        meta.extend_from_slice(&0u32.to_le_bytes());
        meta.extend_from_slice(&(records.len() as u32).to_le_bytes());
        meta.extend_from_slice(&0u32.to_le_bytes());
        for record in records {
            let mut entry = vec![0u8; OUTLINE_META_RECORD_SIZE];
            entry[4..8].copy_from_slice(&(fixed_data.len() as i32).to_le_bytes());
            meta.extend_from_slice(&entry);
            fixed_data.extend_from_slice(record);
        }

        let mut var_meta = Vec::new();
        var_meta.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        var_meta.extend_from_slice(&(var_entries.len() as u32).to_le_bytes());
        var_meta.extend_from_slice(&0u32.to_le_bytes());
        var_meta.extend_from_slice(&0u32.to_le_bytes());
        for &(id, data_type, offset) in var_entries {
            var_meta.extend_from_slice(&id.to_le_bytes());
            var_meta.extend_from_slice(&data_type.to_le_bytes());
            var_meta.extend_from_slice(&0u16.to_le_bytes());
            var_meta.extend_from_slice(&offset.to_le_bytes());
        }

        let mut root = MemoryDirectory::new();
        let dir = root.directory_mut(names::OUTLINE_CODE_DIR);
        dir.insert_stream(names::FIXED_META, meta);
        dir.insert_stream(names::FIXED_DATA, fixed_data);
        dir.insert_stream(names::VAR_META, var_meta);
        dir.insert_stream(names::VAR2_DATA, var_data.to_vec());
        root
    }

    fn blob(payload: &[u8]) -> Vec<u8> {
        let mut data = (payload.len() as i32).to_le_bytes().to_vec();
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_outline_code_values() {
        let field = FieldRef::new(FieldClass::Task, 51);
        let mut record = vec![0u8; OUTLINE_RECORD_MIN];
        record[0..2].copy_from_slice(&7u16.to_le_bytes());
        record[12..16].copy_from_slice(&field.to_raw().to_le_bytes());

        let mut var_data = Vec::new();
        let value_offset = var_data.len() as u32;
        var_data.extend_from_slice(&blob(&utf16("Engineering")));
        let description_offset = var_data.len() as u32;
        var_data.extend_from_slice(&blob(&utf16("Engineering department")));

        let root = outline_dir(
            &[record],
            &[(7, 1, value_offset), (7, 2, description_offset)],
            &var_data,
        );

        let streams = StreamFactory::passthrough();
        let reader = CustomFieldReader::new(SchemaVersion::Mpp9, &streams);
        let mut registry = CustomFieldRegistry::default();
        let mut warnings = WarningSink::new();
        reader
            .read(&root, &Props::default(), &mut registry, &mut warnings)
            .unwrap();

        let item = registry.value(7).unwrap();
        assert_eq!(item.value, Some(CustomValue::Text("Engineering".to_string())));
        assert_eq!(item.description.as_deref(), Some("Engineering department"));
        assert_eq!(
            registry.get(field).unwrap().lookup_table.get(7).unwrap().unique_id,
            7
        );
    }

    #[test]
    fn test_value_records_layout() {
        let layout = SchemaVersion::Mpp12.custom_field_layout().unwrap();
        let field = FieldRef::new(FieldClass::Task, 51);

        let mut record = vec![0u8; layout.min_record_size];
        record[layout.unique_id_offset..layout.unique_id_offset + 4]
            .copy_from_slice(&11u32.to_le_bytes());
        record[layout.parent_offset..layout.parent_offset + 4]
            .copy_from_slice(&5u32.to_le_bytes());
        record[layout.type_offset..layout.type_offset + 2].copy_from_slice(&1u16.to_le_bytes());
        record[layout.guid_offset] = 0x01;
        record[layout.field_offset..layout.field_offset + 4]
            .copy_from_slice(&field.to_raw().to_le_bytes());

        let mut var_data = Vec::new();
        let value_offset = var_data.len() as u32;
        var_data.extend_from_slice(&blob(&utf16("North")));

        // Wide variable index entries for the later generation.
        let mut var_meta = Vec::new();
        var_meta.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        var_meta.extend_from_slice(&1u32.to_le_bytes());
        var_meta.extend_from_slice(&0u32.to_le_bytes());
        var_meta.extend_from_slice(&0u32.to_le_bytes());
        var_meta.extend_from_slice(&11u32.to_le_bytes());
        var_meta.extend_from_slice(&layout.value_var_type.to_le_bytes());
        var_meta.extend_from_slice(&0u32.to_le_bytes());
        var_meta.extend_from_slice(&value_offset.to_le_bytes());

        let mut meta = Vec::new();
        meta.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        meta.extend_from_slice(&0u32.to_le_bytes());
        meta.extend_from_slice(&1u32.to_le_bytes());
        meta.extend_from_slice(&0u32.to_le_bytes());
        let mut entry = vec![0u8; OUTLINE_META_RECORD_SIZE];
        entry[4..8].copy_from_slice(&0i32.to_le_bytes());
        meta.extend_from_slice(&entry);

        let mut root = MemoryDirectory::new();
        let dir = root.directory_mut(names::OUTLINE_CODE_DIR);
        dir.insert_stream(names::FIXED2_META, meta);
        dir.insert_stream(names::FIXED2_DATA, record);
        dir.insert_stream(names::VAR_META, var_meta);
        dir.insert_stream(names::VAR2_DATA, var_data);

        let streams = StreamFactory::passthrough();
        let reader = CustomFieldReader::new(SchemaVersion::Mpp12, &streams);
        let mut registry = CustomFieldRegistry::default();
        let mut warnings = WarningSink::new();
        reader
            .read(&root, &Props::default(), &mut registry, &mut warnings)
            .unwrap();

        let item = registry.value(11).unwrap();
        assert_eq!(item.value, Some(CustomValue::Text("North".to_string())));
        assert_eq!(item.parent_unique_id, Some(5));
        assert!(item.guid.is_some());
        assert!(registry.get(field).unwrap().lookup_table.get(11).is_some());
    }

    #[test]
    fn test_tagged_value_decoding() {
        assert_eq!(
            decode_tagged_value(3, &2.5f64.to_le_bytes()),
            CustomValue::Number(2.5)
        );
        assert_eq!(
            decode_tagged_value(2, &150.0f64.to_le_bytes()),
            CustomValue::Cost(1.5)
        );
        assert_eq!(
            decode_tagged_value(6, &1u16.to_le_bytes()),
            CustomValue::Flag(true)
        );
        assert_eq!(
            decode_tagged_value(99, &[0xAB]),
            CustomValue::Raw(vec![0xAB])
        );
    }
}
