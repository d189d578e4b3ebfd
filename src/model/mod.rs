//! Output object model.
//!
//! These types are the sink the decode layer writes into. They carry no
//! decode logic of their own, with one exception: [`Calendar`] answers the
//! working-time queries the timephased normalisers depend on.

pub mod calendar;
pub mod criteria;
pub mod custom_fields;
pub mod fields;
pub mod timephased;
pub mod views;

pub use calendar::{
    Calendar, CalendarDay, CalendarException, DayType, RecurrencePattern, RecurrenceType,
    TimeRange, WorkWeek,
};
pub use criteria::{CriteriaNode, CriteriaValue, LogicalOperator, Prompt, TestOperator};
pub use custom_fields::{
    CustomField, CustomFieldRegistry, CustomFieldValueItem, CustomValue, LookupTable,
};
pub use fields::{DataType, FieldClass, FieldRef, TimeUnit};
pub use timephased::{AmountUnit, TimephasedSpan};
pub use views::{
    Column, Filter, GanttBarStyle, Group, GroupClause, GraphicalIndicator, IndicatorCriteria,
    Table, View, ViewState,
};
