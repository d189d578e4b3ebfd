//! Criteria expression decoding.
//!
//! Filter and auto-filter definitions store their expressions as a graph
//! of fixed-size blocks: each block carries a tag byte, a child pointer
//! and a next-sibling pointer, both pointers being offsets of other
//! blocks in the same record. Comparison leaves reference three further
//! blocks for the left-hand field and up to two right-hand operands.
//! String operands live in a text area following the block region.
use std::collections::{BTreeMap, HashSet};

use crate::common::binary::{
    read_f64_le, read_i32_le, read_u16_le, read_u32_le, unicode_string,
};
use crate::common::dates;
use crate::common::error::{DecodeWarning, WarningSink};
use crate::model::criteria::{CriteriaNode, CriteriaValue, LogicalOperator, Prompt, TestOperator};
use crate::model::fields::{DataType, FieldClass, FieldRef, TimeUnit};
use crate::mpp::schema::{field_data_type, CriteriaLayout};

/// Block values above this threshold encode a comparison operator.
const OPERATOR_BASE: u16 = 0x3E7;

/// Tag byte meanings of non-leaf blocks.
const TAG_CHILD: u8 = 0x0B;
const TAG_NEXT: u8 = 0x06;
const TAG_LEAF: u8 = 0xED;
const TAG_AND_A: u8 = 0x19;
const TAG_AND_B: u8 = 0x1B;
const TAG_OR_A: u8 = 0x1A;
const TAG_OR_B: u8 = 0x1C;

/// Operand tag bytes inside a comparison leaf.
const OPERAND_PROMPT: u8 = 0x00;
const OPERAND_CONSTANT: u8 = 0x01;
const OPERAND_FIELD: u8 = 0x07;

/// Result of decoding one criteria record.
#[derive(Debug, Default)]
pub struct CriteriaDecode {
    /// The expression tree, absent when the record held no criteria.
    pub criteria: Option<CriteriaNode>,
    /// Prompts encountered, in decode order.
    pub prompts: Vec<Prompt>,
    /// True when the criteria compare task fields; resolved from the last
    /// comparison decoded, defaulting to true.
    pub is_task: bool,
}

/// Decode the criteria expression of one definition record.
///
/// `data` is the whole record; `data_offset` is where the criteria region
/// starts within it.
pub fn decode(
    layout: &CriteriaLayout,
    data: &[u8],
    data_offset: usize,
    warnings: &mut WarningSink,
) -> CriteriaDecode {
    let mut result = CriteriaDecode {
        is_task: true,
        ..Default::default()
    };

    let Ok(text_start) = read_u16_le(data, data_offset + layout.criteria_text_start_offset) else {
        return result;
    };
    let text_start = usize::from(text_start);

    let mut blocks = BTreeMap::new();
    let mut offset = layout.criteria_start;
    while offset + layout.block_size <= text_start {
        let start = data_offset + offset;
        if start + layout.block_size > data.len() {
            break;
        }
        blocks.insert(offset as u16, &data[start..start + layout.block_size]);
        offset += layout.block_size;
    }

    let mut walker = Walker {
        layout,
        data,
        data_offset,
        text_start,
        blocks,
        visited: HashSet::new(),
        prompts: Vec::new(),
        last_field: None,
        warnings,
    };

    let mut list = Vec::new();
    walker.process_block(&mut list, layout.criteria_start as u16);

    result.prompts = walker.prompts;
    if let Some(field) = walker.last_field {
        result.is_task = field.class != FieldClass::Resource;
    }
    result.criteria = match list.len() {
        0 => None,
        1 => list.into_iter().next(),
        _ => Some(CriteriaNode::Logical {
            operator: LogicalOperator::And,
            children: list,
        }),
    };
    result
}

struct Walker<'a, 'w> {
    layout: &'a CriteriaLayout,
    data: &'a [u8],
    data_offset: usize,
    text_start: usize,
    blocks: BTreeMap<u16, &'a [u8]>,
    /// Blocks already traversed structurally; the sibling chains of a
    /// logical block and its children legitimately overlap, so revisits
    /// are skipped without comment.
    visited: HashSet<u16>,
    prompts: Vec<Prompt>,
    last_field: Option<FieldRef>,
    warnings: &'w mut WarningSink,
}

impl<'a> Walker<'a, '_> {
    fn process_block(&mut self, list: &mut Vec<CriteriaNode>, key: u16) {
        if !self.visited.insert(key) {
            return;
        }
        let Some(block) = self.blocks.get(&key).copied() else {
            return;
        };

        if read_u16_le(block, 0).unwrap_or(0) > OPERATOR_BASE - 1 {
            self.add_comparison(list, key, block);
            return;
        }

        match block[0] {
            TAG_CHILD => self.process_block(list, self.child_key(block)),
            TAG_NEXT => self.process_block(list, self.next_key(block)),
            TAG_LEAF => self.add_comparison(list, key, block),
            TAG_AND_A | TAG_AND_B => self.add_logical(list, block, LogicalOperator::And),
            TAG_OR_A | TAG_OR_B => self.add_logical(list, block, LogicalOperator::Or),
            tag => self.warnings.push(DecodeWarning::UnrecognisedTag {
                offset: u32::from(key),
                tag,
            }),
        }
    }

    fn add_logical(&mut self, list: &mut Vec<CriteriaNode>, block: &[u8], operator: LogicalOperator) {
        let first_child = self.next_key(block);
        let mut children = Vec::new();
        self.process_block(&mut children, first_child);
        list.push(CriteriaNode::Logical { operator, children });

        if let Some(child_block) = self.blocks.get(&first_child).copied() {
            let continuation = self.next_key(child_block);
            self.process_block(list, continuation);
        }
    }

    fn add_comparison(&mut self, list: &mut Vec<CriteriaNode>, key: u16, block: &[u8]) {
        let stored = i32::from(read_u16_le(block, 0).unwrap_or(0)) - i32::from(OPERATOR_BASE);
        let operator = if stored < 0 {
            Some(TestOperator::IsAnyValue)
        } else {
            TestOperator::from_ordinal(stored)
        };
        let Some(operator) = operator else {
            self.warnings.push(DecodeWarning::UnrecognisedTag {
                offset: u32::from(key),
                tag: block[0],
            });
            self.process_block(list, self.next_key(block));
            return;
        };

        let left_key = self.child_key(block);
        let Some(left_block) = self.blocks.get(&left_key).copied() else {
            self.warnings.push(DecodeWarning::EntrySkipped {
                stream: "CFilter",
                detail: format!("comparison at block {key} has no field block"),
            });
            self.process_block(list, self.next_key(block));
            return;
        };

        let field =
            FieldRef::from_raw(read_u32_le(left_block, self.layout.field_offset).unwrap_or(0));
        let data_type = field_data_type(field);
        self.last_field = Some(field);

        let right1_key = self.next_key(left_block);
        let right1 = self.blocks.get(&right1_key).copied();
        let right2 = right1
            .map(|b| self.next_key(b))
            .and_then(|k| self.blocks.get(&k).copied());

        let operands = [
            right1.and_then(|b| self.operand(data_type, b, key)),
            right2.and_then(|b| self.operand(data_type, b, key)),
        ];

        list.push(CriteriaNode::Comparison {
            field,
            operator,
            operands,
        });
        self.process_block(list, self.next_key(block));
    }

    fn operand(&mut self, data_type: DataType, block: &[u8], key: u16) -> Option<CriteriaValue> {
        match block[0] {
            OPERAND_FIELD => Some(CriteriaValue::Field(FieldRef::from_raw(
                read_u32_le(block, self.layout.field_offset).ok()?,
            ))),
            OPERAND_CONSTANT => self.constant(data_type, block),
            OPERAND_PROMPT => {
                let text_offset = read_u16_le(block, self.layout.prompt_offset).ok()?;
                let prompt = Prompt {
                    data_type,
                    text: self.text_at(usize::from(text_offset)),
                };
                self.prompts.push(prompt.clone());
                Some(CriteriaValue::Prompt(prompt))
            }
            tag => {
                self.warnings.push(DecodeWarning::UnrecognisedTag {
                    offset: u32::from(key),
                    tag,
                });
                None
            }
        }
    }

    fn constant(&self, data_type: DataType, block: &[u8]) -> Option<CriteriaValue> {
        let value_offset = self.layout.value_offset;
        match data_type {
            DataType::Duration => Some(CriteriaValue::Duration {
                minutes: f64::from(read_i32_le(block, value_offset).ok()?) / 10.0,
                unit: TimeUnit::from_raw(
                    read_u16_le(block, self.layout.time_units_offset).unwrap_or(0),
                ),
            }),
            DataType::Numeric => Some(CriteriaValue::Number(read_f64_le(block, value_offset).ok()?)),
            DataType::Percentage => Some(CriteriaValue::Percentage(f64::from(
                read_u16_le(block, value_offset).ok()?,
            ))),
            DataType::Currency => Some(CriteriaValue::Currency(
                read_f64_le(block, value_offset).ok()? / 100.0,
            )),
            DataType::Text => {
                let text_offset = read_u16_le(block, self.layout.text_offset).ok()?;
                Some(CriteriaValue::Text(self.text_at(usize::from(text_offset))))
            }
            DataType::Boolean => Some(CriteriaValue::Boolean(
                read_u16_le(block, value_offset).ok()? == 1,
            )),
            DataType::Date => Some(CriteriaValue::Date(dates::timestamp(block, value_offset))),
            DataType::Unknown => None,
        }
    }

    /// Read a NUL-terminated string from the record's text area.
    fn text_at(&self, text_offset: usize) -> String {
        let start = self.data_offset + self.text_start + text_offset;
        if start >= self.data.len() {
            return String::new();
        }
        unicode_string(self.data, start)
    }

    fn child_key(&self, block: &[u8]) -> u16 {
        read_u16_le(block, self.layout.child_offset).unwrap_or(0)
    }

    fn next_key(&self, block: &[u8]) -> u16 {
        read_u16_le(block, self.layout.list_next_offset).unwrap_or(0)
    }
}
