//! Timephased amount spans.
use chrono::NaiveDateTime;

/// Unit of the amounts carried by a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountUnit {
    /// Work in minutes.
    Minutes,
    /// Work in hours.
    Hours,
    /// A currency amount.
    Currency,
}

/// A contiguous span of timephased work or cost.
#[derive(Debug, Clone, PartialEq)]
pub struct TimephasedSpan {
    pub start: NaiveDateTime,
    pub finish: NaiveDateTime,
    /// Total amount over the span.
    pub total: f64,
    /// Amount per working day.
    pub per_day: f64,
    pub unit: AmountUnit,
    /// Set when the span was edited rather than scheduled.
    pub modified: bool,
}

impl TimephasedSpan {
    /// A zero-amount placeholder span.
    pub fn zero(start: NaiveDateTime, finish: NaiveDateTime, unit: AmountUnit) -> Self {
        Self {
            start,
            finish,
            total: 0.0,
            per_day: 0.0,
            unit,
            modified: false,
        }
    }
}
