//! Graphical indicator decoding.
//!
//! Indicator definitions live in one property blob: a header listing the
//! customised fields and, per field, a definition region holding three
//! consecutive criteria lists (non-summary rows, summary rows, project
//! summary). Criteria records are variable length because constant
//! operands are encoded inline, sized by the field's value type.
use crate::common::binary::{read_f64_le, read_i32_le, read_u16_le, read_u8, unicode_string};
use crate::common::dates;
use crate::common::error::{DecodeWarning, WarningSink};
use crate::model::criteria::{CriteriaValue, TestOperator};
use crate::model::custom_fields::CustomFieldRegistry;
use crate::model::fields::{DataType, FieldRef, TimeUnit};
use crate::model::views::{GraphicalIndicator, IndicatorCriteria};
use crate::mpp::blocks::{keys, Props};
use crate::mpp::schema::field_data_type;

/// Definition flag bits.
const FLAG_TOOLTIPS: u8 = 0x01;
const FLAG_DISPLAY: u8 = 0x02;
const FLAG_SUMMARY_INHERITS: u8 = 0x04;
const FLAG_PROJECT_SUMMARY_INHERITS: u8 = 0x08;

/// Stored region end offsets carry this bias.
const REGION_OFFSET_BIAS: i32 = 36;

/// Operator values above zero encode `value - 0x3E7`; zero is "is any
/// value".
const OPERATOR_BASE: i32 = 0x3E7;

/// Decode the indicator definitions from the field attributes property
/// and attach them to the customised fields.
pub fn process(props: &Props, registry: &mut CustomFieldRegistry, warnings: &mut WarningSink) {
    let Some(data) = props.byte_array(keys::TASK_FIELD_ATTRIBUTES) else {
        return;
    };
    let Ok(columns) = read_i32_le(data, 4) else {
        return;
    };

    let mut header_offset = 8;
    for _ in 0..columns.max(0) {
        let (Ok(raw_field), Ok(definition_offset)) = (
            read_i32_le(data, header_offset),
            read_i32_le(data, header_offset + 4),
        ) else {
            warnings.push(DecodeWarning::EntrySkipped {
                stream: "Props",
                detail: "indicator header truncated".to_string(),
            });
            break;
        };
        header_offset += 8;

        if definition_offset < 0 || definition_offset as usize >= data.len() {
            warnings.push(DecodeWarning::OffsetOutOfRange {
                stream: "Props",
                offset: definition_offset as u32,
            });
            continue;
        }

        let field = FieldRef::from_raw(raw_field as u32);
        if let Some(indicator) =
            read_definition(data, definition_offset as usize, field, warnings)
        {
            registry.get_or_create(field).indicator = Some(indicator);
        }
    }
}

/// Decode one field's definition region.
fn read_definition(
    data: &[u8],
    offset: usize,
    field: FieldRef,
    warnings: &mut WarningSink,
) -> Option<GraphicalIndicator> {
    let flags = read_u8(data, offset).ok()?;
    if flags & FLAG_DISPLAY == 0 {
        return None;
    }

    let mut pos = offset + 20;
    let non_summary_end = region_end(data, offset, pos)?;
    let summary_end = region_end(data, offset, pos + 4)?;
    let project_summary_end = region_end(data, offset, pos + 8)?;
    pos += 16;

    let mut indicator = GraphicalIndicator {
        display_indicators: true,
        show_data_values_in_tooltips: flags & FLAG_TOOLTIPS != 0,
        summary_rows_inherit_from_non_summary_rows: flags & FLAG_SUMMARY_INHERITS != 0,
        project_summary_inherits_from_summary_rows: flags & FLAG_PROJECT_SUMMARY_INHERITS != 0,
        ..Default::default()
    };

    let data_type = field_data_type(field);
    pos = read_criteria_list(
        data,
        pos,
        non_summary_end,
        data_type,
        &mut indicator.non_summary_row_criteria,
        warnings,
    );
    pos = read_criteria_list(
        data,
        pos,
        summary_end,
        data_type,
        &mut indicator.summary_row_criteria,
        warnings,
    );
    read_criteria_list(
        data,
        pos,
        project_summary_end,
        data_type,
        &mut indicator.project_summary_criteria,
        warnings,
    );

    Some(indicator)
}

/// A stored region end: relative to the definition start, biased.
fn region_end(data: &[u8], definition_offset: usize, at: usize) -> Option<usize> {
    let stored = read_i32_le(data, at).ok()?;
    let relative = stored - REGION_OFFSET_BIAS;
    if relative < 0 {
        return Some(definition_offset);
    }
    Some((definition_offset + relative as usize).min(data.len()))
}

/// Decode criteria records until `end`, returning the position reached.
fn read_criteria_list(
    data: &[u8],
    mut pos: usize,
    end: usize,
    data_type: DataType,
    into: &mut Vec<IndicatorCriteria>,
    warnings: &mut WarningSink,
) -> usize {
    while pos + 2 < end {
        let (Ok(indicator), Ok(operator_value)) =
            (read_i32_le(data, pos), read_i32_le(data, pos + 4))
        else {
            warnings.push(DecodeWarning::EntrySkipped {
                stream: "Props",
                detail: "indicator criteria truncated".to_string(),
            });
            return end;
        };
        pos += 8;

        let operator = if operator_value == 0 {
            TestOperator::IsAnyValue
        } else {
            match TestOperator::from_ordinal(operator_value - OPERATOR_BASE) {
                Some(operator) => operator,
                None => {
                    warnings.push(DecodeWarning::UnrecognisedTag {
                        offset: pos as u32 - 4,
                        tag: (operator_value & 0xFF) as u8,
                    });
                    return end;
                }
            }
        };

        let mut operands = [None, None];
        let (first, next) = read_operand(data, pos, data_type);
        operands[0] = first;
        pos = next;
        if operator.is_range() {
            let (second, next) = read_operand(data, pos, data_type);
            operands[1] = second;
            pos = next;
        }

        into.push(IndicatorCriteria {
            indicator: indicator.max(0) as u32,
            operator,
            operands,
        });
    }
    end.max(pos)
}

/// Decode one operand, returning the value and the position after it.
fn read_operand(data: &[u8], pos: usize, data_type: DataType) -> (Option<CriteriaValue>, usize) {
    let Ok(value_flag) = read_i32_le(data, pos) else {
        return (None, data.len());
    };
    let pos = pos + 4;

    if value_flag != 1 {
        // A field reference rather than an inline constant.
        let value = read_i32_le(data, pos)
            .ok()
            .map(|raw| CriteriaValue::Field(FieldRef::from_raw(raw as u32)));
        return (value, pos + 4);
    }

    // Constants repeat the value type as a u16 before the payload.
    let pos = pos + 2;
    match data_type {
        DataType::Duration => {
            let value = read_i32_le(data, pos).ok().map(|tenths| CriteriaValue::Duration {
                minutes: f64::from(tenths) / 10.0,
                unit: TimeUnit::from_raw(read_u16_le(data, pos + 4).unwrap_or(0)),
            });
            (value, pos + 6)
        }
        DataType::Numeric => (
            read_f64_le(data, pos).ok().map(CriteriaValue::Number),
            pos + 8,
        ),
        DataType::Currency => (
            read_f64_le(data, pos)
                .ok()
                .map(|v| CriteriaValue::Currency(v / 100.0)),
            pos + 8,
        ),
        DataType::Text => {
            let text = unicode_string(data, pos);
            let advance = (text.encode_utf16().count() + 1) * 2;
            (Some(CriteriaValue::Text(text)), pos + advance)
        }
        DataType::Percentage => (
            read_u16_le(data, pos)
                .ok()
                .map(|v| CriteriaValue::Percentage(f64::from(v))),
            pos + 2,
        ),
        DataType::Boolean => (
            read_u16_le(data, pos)
                .ok()
                .map(|v| CriteriaValue::Boolean(v == 1)),
            pos + 2,
        ),
        DataType::Date => (
            Some(CriteriaValue::Date(dates::timestamp(data, pos))),
            pos + 4,
        ),
        DataType::Unknown => (None, pos),
    }
}
