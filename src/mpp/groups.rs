//! Group definition decoding.
//!
//! Groups live in their own directory under the view data directory: a
//! fixed record per group carrying the id and name, and a variable data
//! blob listing the ordering clauses. Each clause stores the grouped
//! field and an ascending flag; the trailing font and colour styling
//! bytes are not decoded.
use crate::common::binary::{read_u16_le, read_u32_le, read_u8, unicode_string};
use crate::common::error::{Result, WarningSink};
use crate::model::fields::FieldRef;
use crate::model::views::{Group, GroupClause};
use crate::mpp::blocks::{FixedData, FixedMeta, ItemSize, Var2Data};
use crate::mpp::crypto::StreamFactory;
use crate::mpp::schema::SchemaVersion;
use crate::storage::{names, CompoundDirectory};

/// Metadata record size in the group directory.
const META_RECORD_SIZE: usize = 10;
/// Variable data type of the group definition blob.
const DEFINITION_VAR_TYPE: u32 = 1;
/// Offset of the first clause within the definition blob.
const CLAUSE_START: usize = 4;
/// Stored size of one ordering clause.
const CLAUSE_SIZE: usize = 8;
/// Upper bound on stored clauses, matching the grouping dialog.
const MAX_CLAUSES: usize = 10;

/// Decodes the group directory of one file.
pub struct GroupReader<'a> {
    streams: &'a StreamFactory,
    version: SchemaVersion,
}

impl<'a> GroupReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { streams, version }
    }

    /// Read every group definition under `view_dir`.
    pub fn read(
        &self,
        view_dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Result<Vec<Group>> {
        if !view_dir.has_directory(names::GROUP_DIR) {
            return Ok(Vec::new());
        }
        let dir = view_dir.directory(names::GROUP_DIR)?;

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

        let mut groups = Vec::new();
        for index in 0..fixed.item_count() {
            let Some(item) = fixed.item(index) else {
                continue;
            };
            let Ok(id) = read_u32_le(item, 0) else {
                continue;
            };
            let Some(blob) = var.byte_array(id, DEFINITION_VAR_TYPE) else {
                continue;
            };

            groups.push(Group {
                id,
                name: crate::mpp::clean_name(unicode_string(item, 4)),
                show_summary_tasks: read_u8(blob, 2).unwrap_or(0) != 0,
                clauses: read_clauses(blob),
            });
        }
        Ok(groups)
    }
}

fn read_clauses(blob: &[u8]) -> Vec<GroupClause> {
    let count = usize::from(read_u16_le(blob, 0).unwrap_or(0)).min(MAX_CLAUSES);
    let mut clauses = Vec::with_capacity(count);
    for index in 0..count {
        let offset = CLAUSE_START + index * CLAUSE_SIZE;
        let Ok(raw) = read_u32_le(blob, offset) else {
            break;
        };
        clauses.push(GroupClause {
            field: FieldRef::from_raw(raw),
            ascending: read_u16_le(blob, offset + 4).unwrap_or(0) == 1,
        });
    }
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fields::FieldClass;
    use crate::mpp::blocks::BLOCK_MAGIC;
    use crate::storage::MemoryDirectory;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .chain([0, 0])
            .collect()
    }

    fn fixed_meta_stream(offsets: &[i32]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        for &offset in offsets {
            let mut record = vec![0u8; META_RECORD_SIZE];
            record[4..8].copy_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&record);
        }
        data
    }

    fn var_meta_stream(entries: &[(u32, u16, u32)]) -> Vec<u8> {
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
        data
    }

    fn definition_blob(show_summary: bool, clauses: &[(FieldRef, bool)]) -> Vec<u8> {
        let mut blob = vec![0u8; CLAUSE_START + clauses.len() * CLAUSE_SIZE];
        blob[0..2].copy_from_slice(&(clauses.len() as u16).to_le_bytes());
        blob[2] = u8::from(show_summary);
        for (index, &(field, ascending)) in clauses.iter().enumerate() {
            let offset = CLAUSE_START + index * CLAUSE_SIZE;
            blob[offset..offset + 4].copy_from_slice(&field.to_raw().to_le_bytes());
            blob[offset + 4..offset + 6].copy_from_slice(&u16::from(ascending).to_le_bytes());
        }
        blob
    }

    fn build_root(groups: &[(u32, &str, Vec<u8>)]) -> MemoryDirectory {
        let mut fixed_data = Vec::new();
        let mut offsets = Vec::new();
        let mut var_entries = Vec::new();
        let mut var_data = Vec::new();
        for (id, name, blob) in groups {
            offsets.push(fixed_data.len() as i32);
            fixed_data.extend_from_slice(&id.to_le_bytes());
            fixed_data.extend_from_slice(&utf16(name));

            var_entries.push((*id, DEFINITION_VAR_TYPE as u16, var_data.len() as u32));
            var_data.extend_from_slice(&(blob.len() as i32).to_le_bytes());
            var_data.extend_from_slice(blob);
        }

        let mut root = MemoryDirectory::new();
        let dir = root.directory_mut(names::GROUP_DIR);
        dir.insert_stream(names::FIXED_META, fixed_meta_stream(&offsets));
        dir.insert_stream(names::FIXED_DATA, fixed_data);
        dir.insert_stream(names::VAR_META, var_meta_stream(&var_entries));
        dir.insert_stream(names::VAR2_DATA, var_data);
        root
    }

    fn read(root: &MemoryDirectory) -> Vec<Group> {
        let streams = StreamFactory::passthrough();
        let reader = GroupReader::new(SchemaVersion::Mpp9, &streams);
        let mut warnings = WarningSink::new();
        reader.read(root, &mut warnings).unwrap()
    }

    #[test]
    fn test_group_with_two_clauses() {
        let duration = FieldRef::new(FieldClass::Task, 29);
        let cost = FieldRef::new(FieldClass::Task, 37);
        let blob = definition_blob(true, &[(duration, true), (cost, false)]);
        let root = build_root(&[(5, "By &Duration", blob)]);

        let groups = read(&root);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.name.as_deref(), Some("By Duration"));
        assert!(group.show_summary_tasks);
        assert_eq!(group.clauses.len(), 2);
        assert_eq!(group.clauses[0].field, duration);
        assert!(group.clauses[0].ascending);
        assert_eq!(group.clauses[1].field, cost);
        assert!(!group.clauses[1].ascending);
    }

    #[test]
    fn test_clause_count_capped_by_blob_length() {
        // Count claims four clauses but only one fits.
        let mut blob = definition_blob(false, &[(FieldRef::new(FieldClass::Resource, 1), true)]);
        blob[0..2].copy_from_slice(&4u16.to_le_bytes());
        let root = build_root(&[(2, "Short", blob)]);

        let groups = read(&root);
        assert_eq!(groups[0].clauses.len(), 1);
    }

    #[test]
    fn test_missing_directory_yields_no_groups() {
        assert!(read(&MemoryDirectory::new()).is_empty());
    }
}
