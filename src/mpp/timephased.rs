//! Timephased span decoding and normalisation.
//!
//! Timephased amounts are stored as cumulative records: a short header,
//! then fixed-size records each carrying a time offset from the
//! assignment start (in tenths of a minute) and the cumulative amount
//! reached at that offset. The first record is the opening boundary and
//! a trailing zero-delta record repeats the finish; neither yields a
//! span. Raw spans can cover many days, so consumers normalise them
//! into day-aligned spans before use.
use chrono::{Days, Duration, NaiveDateTime, NaiveTime};

use crate::common::binary::{read_f64_le, read_i32_le, read_u16_le};
use crate::model::calendar::Calendar;
use crate::model::timephased::{AmountUnit, TimephasedSpan};

/// Two amounts within this delta of each other count as equal when
/// merging spans.
pub const EQUALITY_DELTA: f64 = 0.2;

/// Minutes of a nominal working day; stored per-day rates are scaled
/// against this when a calendar day is shorter or longer.
const PRO_RATA_DAY_MINUTES: f64 = 8.0 * 60.0;

/// Size of one cumulative record.
const RECORD_SIZE: usize = 20;

/// Header sizes of the four cumulative encodings.
const WORK_HEADER_SIZE: usize = 32;
const PLANNED_WORK_HEADER_SIZE: usize = 40;
const BASELINE_WORK_HEADER_SIZE: usize = 24;
const BASELINE_COST_HEADER_SIZE: usize = 20;

/// Cumulative work values are stored in tenths of a minute.
const WORK_DIVISOR: f64 = 10.0;
/// Cumulative cost values are stored in hundredths of a currency unit.
const COST_DIVISOR: f64 = 100.0;

/// Decode the actual-work span blob of one assignment.
pub fn read_work_spans(start: NaiveDateTime, data: &[u8]) -> Vec<TimephasedSpan> {
    read_cumulative_spans(start, data, WORK_HEADER_SIZE, AmountUnit::Minutes, WORK_DIVISOR)
}

/// Decode the planned-work span blob of one assignment.
pub fn read_planned_work_spans(start: NaiveDateTime, data: &[u8]) -> Vec<TimephasedSpan> {
    read_cumulative_spans(
        start,
        data,
        PLANNED_WORK_HEADER_SIZE,
        AmountUnit::Minutes,
        WORK_DIVISOR,
    )
}

/// Decode the baseline-work span blob of one assignment.
pub fn read_baseline_work_spans(start: NaiveDateTime, data: &[u8]) -> Vec<TimephasedSpan> {
    read_cumulative_spans(
        start,
        data,
        BASELINE_WORK_HEADER_SIZE,
        AmountUnit::Minutes,
        WORK_DIVISOR,
    )
}

/// Decode the baseline-cost span blob of one assignment.
pub fn read_baseline_cost_spans(start: NaiveDateTime, data: &[u8]) -> Vec<TimephasedSpan> {
    read_cumulative_spans(
        start,
        data,
        BASELINE_COST_HEADER_SIZE,
        AmountUnit::Currency,
        COST_DIVISOR,
    )
}

/// Walk the cumulative records of a span blob, emitting one span per
/// adjacent record pair.
///
/// A record holds the span boundary offset in tenths of a minute (i32 at
/// 0), the cumulative amount reached there (f64 at 4), the per-day rate
/// of the span ending there (i32 at 12, same scale as the amount) and a
/// manual-edit flag (u16 at 16).
fn read_cumulative_spans(
    start: NaiveDateTime,
    data: &[u8],
    header_size: usize,
    unit: AmountUnit,
    divisor: f64,
) -> Vec<TimephasedSpan> {
    let count = usize::from(read_u16_le(data, 0).unwrap_or(0));
    let mut spans = Vec::new();
    let mut previous_offset = 0i32;
    let mut previous_cumulative = 0.0;

    for index in 0..count {
        let base = header_size + index * RECORD_SIZE;
        if base + RECORD_SIZE > data.len() {
            break;
        }
        let offset = read_i32_le(data, base).unwrap_or(0);
        let cumulative = read_f64_le(data, base + 4).unwrap_or(0.0);
        if index == 0 {
            // Opening boundary record.
            previous_offset = offset;
            previous_cumulative = cumulative;
            continue;
        }

        let span_start = offset_to_datetime(start, previous_offset);
        let span_finish = offset_to_datetime(start, offset);
        if span_finish > span_start {
            spans.push(TimephasedSpan {
                start: span_start,
                finish: span_finish,
                total: (cumulative - previous_cumulative) / divisor,
                per_day: f64::from(read_i32_le(data, base + 12).unwrap_or(0)) / divisor,
                unit,
                modified: read_u16_le(data, base + 16).unwrap_or(0) != 0,
            });
        }
        previous_offset = offset;
        previous_cumulative = cumulative;
    }

    // A closing record repeating the final cumulative value leaves a
    // zero-amount tail.
    if let Some(last) = spans.last() {
        if !last.modified && last.total.abs() < EQUALITY_DELTA {
            spans.pop();
        }
    }
    spans
}

fn offset_to_datetime(start: NaiveDateTime, tenths: i32) -> NaiveDateTime {
    start + Duration::seconds(i64::from(tenths) * 6)
}

/// Normalise actual or planned work spans into day-aligned hour spans.
pub fn normalise_work(calendar: &Calendar, spans: &mut Vec<TimephasedSpan>) {
    split_days(calendar, spans);
    merge_same_day(calendar, spans, false);
    merge_uniform_spans(spans);
    convert_to_hours(spans);
}

/// Normalise baseline work spans into day-aligned hour spans. Baseline
/// days carry their own totals, so the per-day rate is not re-derived
/// from the calendar.
pub fn normalise_baseline_work(calendar: &Calendar, spans: &mut Vec<TimephasedSpan>) {
    split_days(calendar, spans);
    merge_same_day(calendar, spans, true);
    merge_uniform_spans(spans);
    convert_to_hours(spans);
}

/// Normalise cost spans into day-aligned spans. Costs stay in currency
/// units.
pub fn normalise_cost(calendar: &Calendar, spans: &mut Vec<TimephasedSpan>) {
    split_days(calendar, spans);
    merge_same_day(calendar, spans, true);
    merge_uniform_spans(spans);
}

/// Split multi-day spans at working-day boundaries.
///
/// Each pass peels the first day off the span pro-rata against the
/// stored per-day rate and restarts the remainder at the next working
/// instant, so the stored total is carried rather than re-derived. A
/// single-day span whose total still exceeds its pro-rata day amount by
/// more than [`EQUALITY_DELTA`] keeps the excess in a one-day span
/// appended after it; the next input span then starts one day later.
fn split_days(calendar: &Calendar, spans: &mut Vec<TimephasedSpan>) {
    let mut result = Vec::new();
    let mut remainder_inserted = false;

    for mut span in spans.drain(..) {
        if remainder_inserted {
            span.start = (span.start.date() + Days::new(1)).and_time(span.start.time());
            remainder_inserted = false;
        }

        let mut calendar_minutes = calendar.work_minutes_between(span.start, span.finish);
        let mut current = span;
        loop {
            let start_day = current.start.date();
            // A midnight finish belongs to the day before it.
            let finish_day = if current.finish.time() == NaiveTime::MIN {
                current.finish.date() - Days::new(1)
            } else {
                current.finish.date()
            };

            if start_day == finish_day {
                let day_amount = pro_rata_day_amount(calendar, &current);
                if current.total - day_amount > EQUALITY_DELTA {
                    let excess = current.total - day_amount;
                    let mut first = current.clone();
                    first.total = day_amount;
                    result.push(first);
                    result.push(TimephasedSpan {
                        start: (finish_day + Days::new(1)).and_time(NaiveTime::MIN),
                        finish: (finish_day + Days::new(2)).and_time(NaiveTime::MIN),
                        total: excess,
                        ..current
                    });
                    remainder_inserted = true;
                } else {
                    result.push(current);
                }
                break;
            }

            let (first, remainder) = split_first_day(calendar, &current, calendar_minutes);
            if let Some(first) = first {
                calendar_minutes -= calendar.work_minutes_between(first.start, first.finish);
                result.push(first);
            }
            match remainder {
                Some(remainder) if remainder != current => current = remainder,
                _ => break,
            }
        }
    }
    *spans = result;
}

/// The share of the stored per-day rate the day a span starts on can
/// hold, scaled against the nominal working day.
fn pro_rata_day_amount(calendar: &Calendar, span: &TimephasedSpan) -> f64 {
    match calendar.finish_on(span.start.date()) {
        Some(day_finish) => {
            span.per_day * calendar.work_minutes_between(span.start, day_finish)
                / PRO_RATA_DAY_MINUTES
        }
        None => 0.0,
    }
}

/// Peel the first day off a multi-day span.
///
/// The first-day piece exists only when the span starts on a working
/// date. The remainder restarts at the next working instant and carries
/// whatever total the first day did not take; it is absent once that
/// instant falls past the span finish. A span with no working time at
/// all yields neither piece.
fn split_first_day(
    calendar: &Calendar,
    span: &TimephasedSpan,
    calendar_minutes: f64,
) -> (Option<TimephasedSpan>, Option<TimephasedSpan>) {
    if calendar_minutes == 0.0 {
        return (None, None);
    }

    let start_date = span.start.date();
    let (first, split_finish, split_amount) = match calendar.finish_on(start_date) {
        Some(day_finish) if calendar.is_working_date(start_date) => {
            let amount = span.per_day * calendar.work_minutes_between(span.start, day_finish)
                / PRO_RATA_DAY_MINUTES;
            let first = TimephasedSpan {
                finish: day_finish,
                total: amount,
                ..span.clone()
            };
            (Some(first), day_finish, amount)
        }
        _ => (None, span.start, 0.0),
    };

    let next_start = calendar.next_work_start(split_finish);
    if next_start > span.finish {
        return (first, None);
    }
    let remainder = TimephasedSpan {
        start: next_start,
        total: span.total - split_amount,
        ..span.clone()
    };
    (first, Some(remainder))
}

/// Merge consecutive spans falling on the same day, then settle each
/// one-day span's per-day rate.
///
/// Work spans get two extra rules: a zero-amount filler next to a real
/// span on the same day is skipped rather than merged, and a day with
/// neither working time nor an amount is dropped outright. Baseline and
/// cost spans merge unconditionally.
fn merge_same_day(calendar: &Calendar, spans: &mut Vec<TimephasedSpan>, per_day_from_total: bool) {
    let mut merged: Vec<TimephasedSpan> = Vec::new();
    for mut span in spans.drain(..) {
        let same_day = merged
            .last()
            .map(|last| last.start.date() == span.start.date())
            .unwrap_or(false);
        if same_day {
            if !per_day_from_total
                && span.total == 0.0
                && merged.last().map(|last| last.total != 0.0).unwrap_or(false)
            {
                continue;
            }
            if let Some(last) = merged.pop() {
                if per_day_from_total || (last.total != 0.0 && span.total != 0.0) {
                    span.start = last.start;
                    span.total += last.total;
                    span.modified |= last.modified;
                } else if span.total == 0.0 {
                    // Both empty; the earlier boundaries win.
                    span = last;
                }
            }
        }
        merged.push(span);
    }

    for mut span in merged {
        if per_day_from_total {
            span.per_day = span.total;
        } else {
            let day_minutes = calendar.working_minutes_on(span.start.date());
            span.per_day = if day_minutes > 0.0 {
                span.total * PRO_RATA_DAY_MINUTES / day_minutes
            } else {
                0.0
            };
            if span.total == 0.0 && calendar.work_minutes_between(span.start, span.finish) == 0.0 {
                continue;
            }
        }
        spans.push(span);
    }
}

/// Merge runs of consecutive scheduled spans carrying the same per-day
/// amount.
fn merge_uniform_spans(spans: &mut Vec<TimephasedSpan>) {
    let mut result: Vec<TimephasedSpan> = Vec::new();
    for span in spans.drain(..) {
        if let Some(last) = result.last_mut() {
            if !last.modified
                && !span.modified
                && (last.per_day - span.per_day).abs() < EQUALITY_DELTA
            {
                last.finish = span.finish;
                last.total += span.total;
                continue;
            }
        }
        result.push(span);
    }
    *spans = result;
}

fn convert_to_hours(spans: &mut [TimephasedSpan]) {
    for span in spans {
        span.total /= 60.0;
        span.per_day /= 60.0;
        span.unit = AmountUnit::Hours;
    }
}
