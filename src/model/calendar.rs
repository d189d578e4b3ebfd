//! Calendars, exceptions, work weeks and working-time queries.
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use smallvec::SmallVec;

use crate::common::guid::Guid;

/// Minutes in a day; ranges ending at midnight are held as 1440.
const DAY_MINUTES: u32 = 24 * 60;

/// A working period within one day.
///
/// `end` equal to `start` means an empty range; an `end` of midnight is
/// represented as 00:00 and interpreted as the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Start of the range as minutes from midnight.
    pub fn start_minutes(&self) -> u32 {
        self.start.hour() * 60 + self.start.minute()
    }

    /// End of the range as minutes from midnight, with a midnight end
    /// mapped to 1440.
    pub fn end_minutes(&self) -> u32 {
        let minutes = self.end.hour() * 60 + self.end.minute();
        if minutes <= self.start_minutes() && self.end != self.start {
            DAY_MINUTES
        } else {
            minutes
        }
    }

    /// Length of the range in minutes.
    pub fn minutes(&self) -> u32 {
        self.end_minutes().saturating_sub(self.start_minutes())
    }
}

/// Working status of a weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayType {
    Working,
    #[default]
    NonWorking,
    /// Inherit from the base calendar.
    Default,
}

/// One weekday's working pattern.
#[derive(Debug, Clone, Default)]
pub struct CalendarDay {
    pub day_type: DayType,
    pub ranges: SmallVec<[TimeRange; 4]>,
}

impl CalendarDay {
    /// A working day with the given hours.
    pub fn working(ranges: impl IntoIterator<Item = TimeRange>) -> Self {
        Self {
            day_type: DayType::Working,
            ranges: ranges.into_iter().collect(),
        }
    }

    /// A non-working day.
    pub fn non_working() -> Self {
        Self::default()
    }
}

/// Recurrence shape of a recurring calendar exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A recurring exception pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrencePattern {
    pub recurrence: RecurrenceType,
    /// Positional ("second Tuesday") rather than absolute ("the 14th").
    pub relative: bool,
    pub occurrences: u16,
    pub frequency: u16,
    /// Active weekdays for weekly patterns, Sunday first.
    pub weekly_days: [bool; 7],
    pub day_of_week: Option<chrono::Weekday>,
    pub day_number: u8,
    pub month_number: u8,
}

/// A calendar exception covering a date range.
#[derive(Debug, Clone, Default)]
pub struct CalendarException {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub name: Option<String>,
    /// Working hours on exception days; empty means non-working.
    pub ranges: Vec<TimeRange>,
    pub recurring: Option<RecurrencePattern>,
}

impl CalendarException {
    /// True if `date` falls inside the exception's date envelope.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => date >= from && date <= to,
            (Some(from), None) => date == from,
            _ => false,
        }
    }
}

/// A dated override of the default weekly pattern.
#[derive(Debug, Clone, Default)]
pub struct WorkWeek {
    pub name: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub days: [CalendarDay; 7],
}

impl WorkWeek {
    /// True if `date` falls inside the work week's date range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if date >= from && date <= to)
    }
}

/// A calendar: default weekly pattern plus exceptions and work weeks.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub unique_id: u32,
    pub name: Option<String>,
    pub guid: Option<Guid>,
    /// Unique id of the base calendar for derived calendars.
    pub base_calendar_id: Option<u32>,
    /// Resource this calendar belongs to, for resource calendars.
    pub resource_id: Option<u32>,
    /// Weekly pattern, Sunday first.
    pub days: [CalendarDay; 7],
    pub exceptions: Vec<CalendarException>,
    pub work_weeks: Vec<WorkWeek>,
}

/// Search horizon for the next working instant. Beyond this a calendar is
/// treated as having no working time at all.
const MAX_SEARCH_DAYS: u32 = 2 * 365;

impl Calendar {
    /// Array index of a weekday, Sunday first.
    pub fn day_index(day: chrono::Weekday) -> usize {
        day.num_days_from_sunday() as usize
    }

    /// The working ranges in effect on `date`: exceptions first, then work
    /// weeks, then the weekly pattern. Unresolved `Default` days answer as
    /// non-working.
    pub fn ranges_on(&self, date: NaiveDate) -> Vec<TimeRange> {
        if let Some(exception) = self.exceptions.iter().find(|e| e.contains(date)) {
            return exception.ranges.clone();
        }
        let index = Self::day_index(date.weekday());
        if let Some(week) = self.work_weeks.iter().find(|w| w.contains(date)) {
            let day = &week.days[index];
            if day.day_type != DayType::Default {
                return day.ranges.to_vec();
            }
        }
        let day = &self.days[index];
        match day.day_type {
            DayType::Working => day.ranges.to_vec(),
            _ => Vec::new(),
        }
    }

    /// True if any working time exists on `date`.
    pub fn is_working_date(&self, date: NaiveDate) -> bool {
        self.ranges_on(date).iter().any(|r| r.minutes() > 0)
    }

    /// Total working minutes on `date`.
    pub fn working_minutes_on(&self, date: NaiveDate) -> f64 {
        self.ranges_on(date).iter().map(|r| f64::from(r.minutes())).sum()
    }

    /// Start of the first working range on `date`, in minutes from
    /// midnight.
    pub fn start_minutes_on(&self, date: NaiveDate) -> Option<u32> {
        self.ranges_on(date)
            .iter()
            .filter(|r| r.minutes() > 0)
            .map(TimeRange::start_minutes)
            .min()
    }

    /// End of the last working range on `date`, in minutes from midnight
    /// (1440 for a midnight finish).
    pub fn finish_minutes_on(&self, date: NaiveDate) -> Option<u32> {
        self.ranges_on(date)
            .iter()
            .filter(|r| r.minutes() > 0)
            .map(TimeRange::end_minutes)
            .max()
    }

    /// The instant the working day on `date` ends, rolling a midnight
    /// finish into the next day.
    pub fn finish_on(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        self.finish_minutes_on(date)
            .map(|minutes| datetime_at_minutes(date, minutes))
    }

    /// Working minutes between two instants, honouring exceptions and
    /// work weeks.
    pub fn work_minutes_between(&self, start: NaiveDateTime, finish: NaiveDateTime) -> f64 {
        if finish <= start {
            return 0.0;
        }

        let mut total = 0.0;
        let mut date = start.date();
        while date <= finish.date() {
            let window_start = if date == start.date() {
                minutes_of(start.time())
            } else {
                0
            };
            let window_end = if date == finish.date() {
                minutes_of(finish.time())
            } else {
                DAY_MINUTES
            };

            for range in self.ranges_on(date) {
                let s = range.start_minutes().max(window_start);
                let e = range.end_minutes().min(window_end);
                if e > s {
                    total += f64::from(e - s);
                }
            }
            let Some(next) = date.checked_add_days(Days::new(1)) else {
                break;
            };
            date = next;
        }
        total
    }

    /// The next instant at or after `from` when work can occur.
    ///
    /// Falls back to `from` unchanged if no working time exists within the
    /// search horizon.
    pub fn next_work_start(&self, from: NaiveDateTime) -> NaiveDateTime {
        let mut date = from.date();
        for day in 0..MAX_SEARCH_DAYS {
            let threshold = if day == 0 { minutes_of(from.time()) } else { 0 };
            let mut candidates: Vec<&TimeRange> = Vec::new();
            let ranges = self.ranges_on(date);
            for range in &ranges {
                if range.minutes() > 0 && range.end_minutes() > threshold {
                    candidates.push(range);
                }
            }
            if let Some(range) = candidates.iter().min_by_key(|r| r.start_minutes()) {
                let start = range.start_minutes().max(threshold);
                return datetime_at_minutes(date, start);
            }
            match date.checked_add_days(Days::new(1)) {
                Some(next) => date = next,
                None => break,
            }
        }
        from
    }
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Build an instant from a date and minutes-from-midnight, rolling 1440
/// over into the next day.
pub fn datetime_at_minutes(date: NaiveDate, minutes: u32) -> NaiveDateTime {
    if minutes >= DAY_MINUTES {
        let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
        return next.and_time(NaiveTime::MIN);
    }
    let time = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}
