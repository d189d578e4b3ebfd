//! Views, tables, filters, groups and presentation styling.
use crate::model::criteria::{CriteriaNode, Prompt, TestOperator};
use crate::model::fields::FieldRef;

/// A saved view definition.
#[derive(Debug, Clone, Default)]
pub struct View {
    pub id: u32,
    pub view_type: u16,
    pub name: Option<String>,
}

/// The saved UI state: which view was active and which rows were visible.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub top_view_id: Option<u32>,
    pub visible_unique_ids: Vec<u32>,
}

/// One column of a table definition.
#[derive(Debug, Clone)]
pub struct Column {
    pub field: FieldRef,
    pub width: u8,
    pub title: Option<String>,
    pub align_title: u8,
    pub align_data: u8,
}

/// A saved column table.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub id: u32,
    pub name: Option<String>,
    /// True for resource tables, false for task tables.
    pub resource: bool,
    pub columns: Vec<Column>,
}

/// A saved filter definition.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub id: u32,
    pub name: Option<String>,
    /// True when the filter applies to tasks, false for resources.
    /// Derived from the last comparison in the criteria, best effort.
    pub is_task_filter: bool,
    pub show_related_summary_rows: bool,
    pub criteria: Option<CriteriaNode>,
    pub prompts: Vec<Prompt>,
}

/// One ordering clause of a group definition.
#[derive(Debug, Clone)]
pub struct GroupClause {
    pub field: FieldRef,
    pub ascending: bool,
}

/// A saved group definition.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub id: u32,
    pub name: Option<String>,
    pub show_summary_tasks: bool,
    pub clauses: Vec<GroupClause>,
}

/// One Gantt bar style definition.
#[derive(Debug, Clone, Default)]
pub struct GanttBarStyle {
    pub name: Option<String>,
    /// Field supplying the bar start date.
    pub from_field: Option<FieldRef>,
    /// Field supplying the bar finish date.
    pub to_field: Option<FieldRef>,
    pub row: u8,
    pub middle_shape: u8,
    pub middle_pattern: u8,
    pub middle_color: u8,
    pub start_shape: u8,
    pub start_type: u8,
    pub end_shape: u8,
    pub end_type: u8,
}

/// One criteria row of a graphical indicator definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorCriteria {
    pub indicator: u32,
    pub operator: TestOperator,
    pub operands: [Option<crate::model::criteria::CriteriaValue>; 2],
}

/// A graphical indicator attached to a custom field.
#[derive(Debug, Clone, Default)]
pub struct GraphicalIndicator {
    pub display_indicators: bool,
    pub show_data_values_in_tooltips: bool,
    pub summary_rows_inherit_from_non_summary_rows: bool,
    pub project_summary_inherits_from_summary_rows: bool,
    pub non_summary_row_criteria: Vec<IndicatorCriteria>,
    pub summary_row_criteria: Vec<IndicatorCriteria>,
    pub project_summary_criteria: Vec<IndicatorCriteria>,
}
