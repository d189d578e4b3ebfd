//! Filter definition decoding.
//!
//! Filters live in their own directory under the view data directory:
//! a fixed record per filter carrying the id and name, and a variable
//! data blob carrying the display flags and the criteria expression.
use crate::common::binary::{read_u8, read_u32_le, unicode_string};
use crate::common::error::{Result, WarningSink};
use crate::model::views::Filter;
use crate::mpp::blocks::{FixedData, FixedMeta, ItemSize, Var2Data};
use crate::mpp::criteria;
use crate::mpp::crypto::StreamFactory;
use crate::mpp::schema::SchemaVersion;
use crate::storage::{names, CompoundDirectory};

/// Metadata record size in the filter directory.
const META_RECORD_SIZE: usize = 10;
/// Variable data type of the filter definition blob.
const DEFINITION_VAR_TYPE: u32 = 1;
/// Offset of the related-summary-rows flag within the definition blob.
const SHOW_SUMMARY_OFFSET: usize = 4;

/// Decodes the filter directory of one file.
pub struct FilterReader<'a> {
    version: SchemaVersion,
    streams: &'a StreamFactory,
}

impl<'a> FilterReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { version, streams }
    }

    /// Read every filter definition under `view_dir`.
    pub fn read(
        &self,
        view_dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Result<Vec<Filter>> {
        let Some(layout) = self.version.criteria_layout() else {
            return Ok(Vec::new());
        };
        if !view_dir.has_directory(names::FILTER_DIR) {
            return Ok(Vec::new());
        }
        let dir = view_dir.directory(names::FILTER_DIR)?;

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

        let mut filters = Vec::new();
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

            let decoded = criteria::decode(layout, blob, 0, warnings);
            filters.push(Filter {
                id,
                name: crate::mpp::clean_name(unicode_string(item, 4)),
                is_task_filter: decoded.is_task,
                show_related_summary_rows: read_u8(blob, SHOW_SUMMARY_OFFSET).unwrap_or(0) != 0,
                criteria: decoded.criteria,
                prompts: decoded.prompts,
            });
        }
        Ok(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::criteria::{CriteriaNode, CriteriaValue, TestOperator};
    use crate::model::fields::{FieldClass, FieldRef};
    use crate::mpp::blocks::BLOCK_MAGIC;
    use crate::storage::MemoryDirectory;

    const BLOCK: usize = 80;
    const START: usize = 20;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .chain([0, 0])
            .collect()
    }

    /// Definition blob with a header, criteria blocks and a text area.
    struct BlobBuilder {
        header: Vec<u8>,
        blocks: Vec<Vec<u8>>,
        text: Vec<u8>,
    }

    impl BlobBuilder {
        fn new() -> Self {
            Self {
                header: vec![0u8; START],
                blocks: Vec::new(),
                text: Vec::new(),
            }
        }

        fn block(&mut self) -> u16 {
            let key = (START + self.blocks.len() * BLOCK) as u16;
            self.blocks.push(vec![0u8; BLOCK]);
            key
        }

        fn at(&mut self, key: u16) -> &mut Vec<u8> {
            let index = (usize::from(key) - START) / BLOCK;
            &mut self.blocks[index]
        }

        fn set_u16(&mut self, key: u16, offset: usize, value: u16) {
            self.at(key)[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }

        fn set_u32(&mut self, key: u16, offset: usize, value: u32) {
            self.at(key)[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        /// Wire a single comparison: leaf at the start key, field block and
        /// one constant operand chained behind it.
        fn comparison(&mut self, field: FieldRef, operator: TestOperator) -> (u16, u16) {
            let leaf = self.block();
            let left = self.block();
            let right = self.block();
            self.set_u16(leaf, 0, 0x3E7 + operator as u16);
            self.set_u16(leaf, 4, left);
            self.set_u32(left, 8, field.to_raw());
            self.set_u16(left, 6, right);
            self.at(right)[0] = 0x01;
            (leaf, right)
        }

        fn build(mut self, show_summary: bool) -> Vec<u8> {
            let text_start = (START + self.blocks.len() * BLOCK) as u16;
            self.header[SHOW_SUMMARY_OFFSET] = u8::from(show_summary);
            self.header[16..18].copy_from_slice(&text_start.to_le_bytes());
            let mut data = self.header;
            for block in self.blocks {
                data.extend_from_slice(&block);
            }
            data.extend_from_slice(&self.text);
            data
        }
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

    fn build_root(filters: &[(u32, &str, Vec<u8>)]) -> MemoryDirectory {
        let mut fixed_data = Vec::new();
        let mut offsets = Vec::new();
        let mut var_entries = Vec::new();
        let mut var_data = Vec::new();
        for (id, name, blob) in filters {
            offsets.push(fixed_data.len() as i32);
            fixed_data.extend_from_slice(&id.to_le_bytes());
            fixed_data.extend_from_slice(&utf16(name));

            var_entries.push((*id, DEFINITION_VAR_TYPE as u16, var_data.len() as u32));
            var_data.extend_from_slice(&(blob.len() as i32).to_le_bytes());
            var_data.extend_from_slice(blob);
        }

        let mut root = MemoryDirectory::new();
        let dir = root.directory_mut(names::FILTER_DIR);
        dir.insert_stream(names::FIXED_META, fixed_meta_stream(&offsets));
        dir.insert_stream(names::FIXED_DATA, fixed_data);
        dir.insert_stream(names::VAR_META, var_meta_stream(&var_entries));
        dir.insert_stream(names::VAR2_DATA, var_data);
        root
    }

    fn read(root: &MemoryDirectory) -> Vec<Filter> {
        let streams = StreamFactory::passthrough();
        let reader = FilterReader::new(SchemaVersion::Mpp9, &streams);
        let mut warnings = WarningSink::new();
        reader.read(root, &mut warnings).unwrap()
    }

    #[test]
    fn test_filter_with_numeric_comparison() {
        let mut blob = BlobBuilder::new();
        let field = FieldRef::new(FieldClass::Task, 90);
        let (_, right) = blob.comparison(field, TestOperator::IsGreaterThan);
        blob.at(right)[32..40].copy_from_slice(&5.0f64.to_le_bytes());

        let root = build_root(&[(1, "&Big Numbers", blob.build(true))]);
        let filters = read(&root);

        assert_eq!(filters.len(), 1);
        let filter = &filters[0];
        assert_eq!(filter.name.as_deref(), Some("Big Numbers"));
        assert!(filter.is_task_filter);
        assert!(filter.show_related_summary_rows);
        assert_eq!(
            filter.criteria,
            Some(CriteriaNode::Comparison {
                field,
                operator: TestOperator::IsGreaterThan,
                operands: [Some(CriteriaValue::Number(5.0)), None],
            })
        );
    }

    #[test]
    fn test_resource_filter_classification() {
        let mut blob = BlobBuilder::new();
        let field = FieldRef::new(FieldClass::Resource, 1);
        blob.comparison(field, TestOperator::IsAnyValue);

        let root = build_root(&[(3, "All Resources", blob.build(false))]);
        let filters = read(&root);

        assert_eq!(filters.len(), 1);
        assert!(!filters[0].is_task_filter);
        assert!(!filters[0].show_related_summary_rows);
    }

    #[test]
    fn test_filter_without_definition_blob_is_skipped() {
        let mut root = MemoryDirectory::new();
        {
            let dir = root.directory_mut(names::FILTER_DIR);
            let mut fixed_data = vec![];
            fixed_data.extend_from_slice(&9u32.to_le_bytes());
            fixed_data.extend_from_slice(&utf16("Orphan"));
            dir.insert_stream(names::FIXED_META, fixed_meta_stream(&[0]));
            dir.insert_stream(names::FIXED_DATA, fixed_data);
            dir.insert_stream(names::VAR_META, var_meta_stream(&[]));
            dir.insert_stream(names::VAR2_DATA, Vec::<u8>::new());
        }
        assert!(read(&root).is_empty());
    }

    #[test]
    fn test_missing_directory_yields_no_filters() {
        let root = MemoryDirectory::new();
        assert!(read(&root).is_empty());
    }
}
