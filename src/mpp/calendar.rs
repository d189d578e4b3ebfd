//! Calendar reconstruction.
//!
//! Calendars live in their own data directory as fixed records indexing
//! variable-length data blobs. Each fixed item can pack several 12-byte
//! index records back to back, so the reader walks every 12-byte window
//! rather than trusting one record per item. The data blob holds the
//! seven weekday blocks, then the exception records, then (in later
//! generations) the work week records.
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveTime;

use crate::common::binary::{
    read_i32_le, read_u16_le, read_u8, unicode_string, unicode_string_capped,
};
use crate::common::dates;
use crate::common::error::{DecodeWarning, Result, WarningSink};
use crate::common::guid::Guid;
use crate::model::calendar::{
    Calendar, CalendarDay, CalendarException, DayType, RecurrencePattern, RecurrenceType,
    TimeRange, WorkWeek,
};
use crate::mpp::blocks::{
    keys, ExtendedData, FixDeferFix, FixedData, FixedMeta, ItemSize, Props, Var2Data,
};
use crate::mpp::chained_offset;
use crate::mpp::crypto::StreamFactory;
use crate::mpp::schema::{CalendarLayout, SchemaVersion};
use crate::storage::{names, CompoundDirectory};

/// Metadata record size in the calendar directory.
const META_RECORD_SIZE: usize = 10;
/// Maximum useful size of a fixed data item.
const DATA_ITEM_MAX: usize = 12;
/// One calendar index record inside a fixed data item.
const INDEX_RECORD_SIZE: usize = 12;
/// Metadata record size of the secondary (GUID) streams.
const GUID_META_RECORD_SIZE: usize = 9;
/// Maximum useful size of a secondary fixed data item.
const GUID_ITEM_MAX: usize = 48;

/// One weekday block inside a calendar data blob.
const DAY_BLOCK_SIZE: usize = 60;
/// Working periods that fit in a weekday or work week day block.
const MAX_PERIODS: usize = 5;
/// Size of one exception record, excluding its trailing name.
const EXCEPTION_RECORD_SIZE: usize = 92;

/// Fixed record size of a first-generation calendar.
const CHAINED_RECORD_SIZE: usize = 36;
/// Offsets of the name and trailer pointers in that record.
const CHAINED_NAME_OFFSET: usize = 20;
const CHAINED_TRAILER_OFFSET: usize = 32;
/// Trailer key holding the calendar data blob offset.
const CHAINED_DATA_KEY: i32 = 8;
/// One weekday block inside a first-generation calendar blob.
const CHAINED_DAY_BLOCK_SIZE: usize = 40;
/// Working periods that fit in a first-generation day block.
const CHAINED_MAX_PERIODS: usize = 4;
/// Size of one first-generation exception record.
const CHAINED_EXCEPTION_SIZE: usize = 44;

/// Recurrence shape by stored exception type code.
const RECURRENCE_TYPES: [Option<(RecurrenceType, bool)>; 8] = [
    None,
    Some((RecurrenceType::Daily, false)),
    Some((RecurrenceType::Yearly, false)),
    Some((RecurrenceType::Yearly, true)),
    Some((RecurrenceType::Monthly, false)),
    Some((RecurrenceType::Monthly, true)),
    Some((RecurrenceType::Weekly, false)),
    Some((RecurrenceType::Daily, false)),
];

/// Weekday bits of a weekly recurrence mask, Sunday first.
const DAY_MASKS: [u8; 7] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40];

/// All calendars decoded from one file.
#[derive(Debug, Default)]
pub struct CalendarSet {
    calendars: Vec<Calendar>,
    /// Unique id of the project default calendar, resolved by name.
    pub default_calendar_id: Option<u32>,
    resource_map: BTreeMap<u32, u32>,
}

impl CalendarSet {
    /// The decoded calendars in file order.
    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    /// Find a calendar by unique id.
    pub fn get(&self, unique_id: u32) -> Option<&Calendar> {
        self.calendars.iter().find(|c| c.unique_id == unique_id)
    }

    /// Find a calendar by name.
    pub fn by_name(&self, name: &str) -> Option<&Calendar> {
        self.calendars.iter().find(|c| c.name.as_deref() == Some(name))
    }

    /// The calendar assigned to a resource, if any.
    pub fn calendar_for_resource(&self, resource_id: u32) -> Option<&Calendar> {
        self.resource_map
            .get(&resource_id)
            .and_then(|&id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }
}

/// Decodes the calendar directory of one file.
pub struct CalendarReader<'a> {
    version: SchemaVersion,
    streams: &'a StreamFactory,
}

impl<'a> CalendarReader<'a> {
    pub fn new(version: SchemaVersion, streams: &'a StreamFactory) -> Self {
        Self { version, streams }
    }

    /// Read every calendar under `project_dir` and link derived calendars
    /// to their bases.
    pub fn read(
        &self,
        project_dir: &dyn CompoundDirectory,
        props: &Props,
        warnings: &mut WarningSink,
    ) -> Result<CalendarSet> {
        if !project_dir.has_directory(names::CALENDAR_DIR) {
            return Ok(CalendarSet::default());
        }
        let dir = project_dir.directory(names::CALENDAR_DIR)?;

        let mut set = match self.version.calendar_layout() {
            Some(layout) => self.read_indexed(layout, dir, props, warnings)?,
            None => self.read_chained(dir, props, warnings)?,
        };

        link_bases(&mut set, warnings);
        set.default_calendar_id = props
            .unicode_string(keys::DEFAULT_CALENDAR_NAME)
            .and_then(|name| set.by_name(&name).map(|c| c.unique_id));
        Ok(set)
    }

    /// Read the indexed layout: fixed index records addressing the name
    /// and data blobs through the variable data streams.
    fn read_indexed(
        &self,
        layout: &CalendarLayout,
        dir: &dyn CompoundDirectory,
        props: &Props,
        warnings: &mut WarningSink,
    ) -> Result<CalendarSet> {
        let meta = FixedMeta::new(
            self.streams.stream(dir, names::FIXED_META)?,
            ItemSize::Known(META_RECORD_SIZE),
            warnings,
        )?;
        let fixed = FixedData::with_limits(
            &meta,
            self.streams.stream(dir, names::FIXED_DATA)?,
            DATA_ITEM_MAX,
            0,
            warnings,
        );
        let var_meta = self
            .version
            .read_var_meta(self.streams.stream(dir, names::VAR_META)?, warnings)?;
        let var = Var2Data::new(&var_meta, self.streams.stream(dir, names::VAR2_DATA)?, warnings);
        let guids = self.read_guids(dir, warnings);

        let mut set = CalendarSet::default();
        let mut seen: HashSet<u32> = HashSet::new();

        for index in 0..fixed.item_count() {
            let Some(item) = fixed.item(index) else {
                continue;
            };
            // Multiple index records can share one fixed data item.
            let mut record_offset = 0;
            while record_offset + INDEX_RECORD_SIZE <= item.len() {
                let record = &item[record_offset..record_offset + INDEX_RECORD_SIZE];
                record_offset += INDEX_RECORD_SIZE;
                if let Some(calendar) =
                    self.read_calendar(layout, record, props, &var, &mut seen, &mut set, warnings)
                {
                    let position = set.calendars.len();
                    let mut calendar = calendar;
                    calendar.guid = guids.get(position).copied().flatten();
                    set.calendars.push(calendar);
                }
            }
        }
        Ok(set)
    }

    /// Read the first-generation layout: a bare stream of 36-byte fixed
    /// records whose name, keyed trailer and data blob all live in the
    /// chained deferred stream.
    fn read_chained(
        &self,
        dir: &dyn CompoundDirectory,
        props: &Props,
        warnings: &mut WarningSink,
    ) -> Result<CalendarSet> {
        let fixed = FixedData::from_stream(
            self.streams.stream(dir, names::FIX_FIX)?,
            CHAINED_RECORD_SIZE,
            false,
        );
        let defer = FixDeferFix::new(self.streams.stream(dir, names::FIX_DEFER_FIX)?);

        let mut set = CalendarSet::default();
        let mut seen: HashSet<u32> = HashSet::new();
        for index in 0..fixed.item_count() {
            let Some(record) = fixed.item(index) else {
                continue;
            };
            let id = read_i32_le(record, 0).unwrap_or(-1);
            if id <= 0 || !seen.insert(id as u32) {
                continue;
            }
            let base = read_i32_le(record, 4).unwrap_or(0);
            let is_base = base <= 0 || base == id;

            let mut calendar = Calendar {
                unique_id: id as u32,
                ..Default::default()
            };
            if !is_base {
                calendar.base_calendar_id = Some(base as u32);
            }
            if let Some(name) =
                defer.byte_array(chained_offset(record, CHAINED_NAME_OFFSET), warnings)
            {
                let name = unicode_string(&name, 0);
                if !name.is_empty() {
                    calendar.name = Some(name);
                }
            }

            let trailer = defer
                .byte_array(chained_offset(record, CHAINED_TRAILER_OFFSET), warnings)
                .map(|data| ExtendedData::new(&data))
                .unwrap_or_default();
            // The stored value is one's-complemented like the record
            // offsets; a missing key reads as offset −1.
            let data_offset = !trailer.int(CHAINED_DATA_KEY);
            match defer.byte_array(data_offset, warnings) {
                Some(data) => read_chained_data(&data, is_base, &mut calendar),
                None if is_base => calendar.days = self.default_days(props),
                None => {
                    for day in &mut calendar.days {
                        day.day_type = DayType::Default;
                    }
                }
            }
            set.calendars.push(calendar);
        }
        Ok(set)
    }

    #[allow(clippy::too_many_arguments)]
    fn read_calendar(
        &self,
        layout: &CalendarLayout,
        record: &[u8],
        props: &Props,
        var: &Var2Data,
        seen: &mut HashSet<u32>,
        set: &mut CalendarSet,
        warnings: &mut WarningSink,
    ) -> Option<Calendar> {
        let id = read_i32_le(record, layout.calendar_id_offset).ok()?;
        if id <= 0 {
            return None;
        }
        let id = id as u32;
        if !seen.insert(id) {
            return None;
        }

        let base = read_i32_le(record, layout.base_id_offset).unwrap_or(0);
        let resource = read_i32_le(record, layout.resource_id_offset).unwrap_or(0);
        let is_base = base <= 0 || base as u32 == id;

        let mut calendar = Calendar {
            unique_id: id,
            name: var.unicode_string(id, layout.name_var_type),
            ..Default::default()
        };
        if !is_base {
            calendar.base_calendar_id = Some(base as u32);
        }
        if resource > 0 {
            calendar.resource_id = Some(resource as u32);
            set.resource_map.insert(resource as u32, id);
        }

        match var.byte_array(id, layout.data_var_type) {
            Some(data) if !data.is_empty() => {
                self.read_calendar_data(layout, data, is_base, &mut calendar, warnings);
            }
            _ if is_base => calendar.days = self.default_days(props),
            _ => {
                for day in &mut calendar.days {
                    day.day_type = DayType::Default;
                }
            }
        }

        Some(calendar)
    }

    /// Weekday pattern for a base calendar with no data blob: the project
    /// default hours property when present, otherwise the standard week.
    fn default_days(&self, props: &Props) -> [CalendarDay; 7] {
        let mut days: [CalendarDay; 7] = Default::default();
        match props.byte_array(keys::DEFAULT_CALENDAR_HOURS) {
            Some(data) => read_weekday_hours(data, 0, true, &mut days),
            None => days = default_week(),
        }
        days
    }

    fn read_calendar_data(
        &self,
        layout: &CalendarLayout,
        data: &[u8],
        is_base: bool,
        calendar: &mut Calendar,
        warnings: &mut WarningSink,
    ) {
        read_weekday_hours(data, layout.hours_offset, is_base, &mut calendar.days);

        let exceptions_offset = layout.hours_offset + 7 * DAY_BLOCK_SIZE;
        if data.len() <= exceptions_offset + 2 {
            return;
        }
        let after = read_exceptions(data, exceptions_offset, calendar, warnings);

        if layout.work_weeks {
            read_work_weeks(data, after, calendar);
        }
    }

    /// Per-calendar GUIDs from the secondary fixed streams, in item order.
    /// Both streams are optional.
    fn read_guids(
        &self,
        dir: &dyn CompoundDirectory,
        warnings: &mut WarningSink,
    ) -> Vec<Option<Guid>> {
        if !dir.has_stream(names::FIXED2_META) || !dir.has_stream(names::FIXED2_DATA) {
            return Vec::new();
        }
        let Ok(meta_stream) = self.streams.stream(dir, names::FIXED2_META) else {
            return Vec::new();
        };
        let Ok(data_stream) = self.streams.stream(dir, names::FIXED2_DATA) else {
            return Vec::new();
        };
        let Ok(meta) = FixedMeta::new(meta_stream, ItemSize::Known(GUID_META_RECORD_SIZE), warnings)
        else {
            return Vec::new();
        };
        let data = FixedData::with_limits(&meta, data_stream, GUID_ITEM_MAX, 0, warnings);
        (0..data.item_count())
            .map(|index| data.item(index).and_then(|item| Guid::read(item, 0)))
            .collect()
    }
}

/// The standard working week: Monday to Friday, 08:00-12:00 and
/// 13:00-17:00.
pub fn default_week() -> [CalendarDay; 7] {
    let mut days: [CalendarDay; 7] = Default::default();
    for day in days.iter_mut().skip(1).take(5) {
        *day = CalendarDay::working(default_hours());
    }
    days
}

fn default_hours() -> [TimeRange; 2] {
    [
        range_from(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN), 240),
        range_from(NaiveTime::from_hms_opt(13, 0, 0).unwrap_or(NaiveTime::MIN), 240),
    ]
}

/// Decode the seven 60-byte weekday blocks starting at `offset`.
fn read_weekday_hours(data: &[u8], offset: usize, is_base: bool, days: &mut [CalendarDay; 7]) {
    for (day_index, day) in days.iter_mut().enumerate() {
        let block_offset = offset + day_index * DAY_BLOCK_SIZE;
        if block_offset + DAY_BLOCK_SIZE > data.len() {
            break;
        }
        let block = &data[block_offset..block_offset + DAY_BLOCK_SIZE];

        let flag = read_u16_le(block, 0).unwrap_or(0);
        if flag == 1 {
            // The day carries no explicit hours. Base calendars get the
            // standard pattern; derived calendars inherit from their base.
            *day = if is_base {
                CalendarDay::working(default_hours())
            } else {
                CalendarDay {
                    day_type: DayType::Default,
                    ranges: Default::default(),
                }
            };
            continue;
        }

        let period_count = usize::from(read_u16_le(block, 2).unwrap_or(0)).min(MAX_PERIODS);
        if period_count == 0 {
            *day = CalendarDay::non_working();
            continue;
        }

        let mut ranges = Vec::with_capacity(period_count);
        for period in 0..period_count {
            let Some(start) = dates::time(block, 8 + period * 2) else {
                continue;
            };
            let tenths = read_u16_le(block, 20 + period * 4).unwrap_or(0);
            ranges.push(range_from(start, u32::from(tenths) / 10));
        }
        *day = CalendarDay::working(ranges);
    }
}

/// Decode a first-generation calendar blob: an exception count, seven
/// 40-byte weekday blocks, then the exception records. Durations are
/// stored in tenths of a minute like the later layouts, but periods sit
/// at different offsets within the block.
fn read_chained_data(data: &[u8], is_base: bool, calendar: &mut Calendar) {
    for (day_index, day) in calendar.days.iter_mut().enumerate() {
        let block_offset = 4 + day_index * CHAINED_DAY_BLOCK_SIZE;
        if block_offset + CHAINED_DAY_BLOCK_SIZE > data.len() {
            break;
        }
        let block = &data[block_offset..block_offset + CHAINED_DAY_BLOCK_SIZE];

        if read_u16_le(block, 0).unwrap_or(0) == 1 {
            // No explicit hours. A base calendar falls back to the
            // standard week; a derived calendar inherits from its base.
            *day = if !is_base {
                CalendarDay {
                    day_type: DayType::Default,
                    ranges: Default::default(),
                }
            } else if (1..=5).contains(&day_index) {
                CalendarDay::working(default_hours())
            } else {
                CalendarDay::non_working()
            };
            continue;
        }

        let period_count =
            usize::from(read_u16_le(block, 2).unwrap_or(0)).min(CHAINED_MAX_PERIODS);
        if period_count == 0 {
            *day = CalendarDay::non_working();
            continue;
        }
        let mut ranges = Vec::with_capacity(period_count);
        for period in 0..period_count {
            let Some(start) = dates::time(block, 8 + period * 2) else {
                continue;
            };
            let tenths = read_u16_le(block, 16 + period * 4).unwrap_or(0);
            ranges.push(range_from(start, u32::from(tenths) / 10));
        }
        *day = CalendarDay::working(ranges);
    }

    let count = usize::from(read_u16_le(data, 0).unwrap_or(0));
    for index in 0..count {
        let pos = 4 + 7 * CHAINED_DAY_BLOCK_SIZE + index * CHAINED_EXCEPTION_SIZE;
        if pos + CHAINED_EXCEPTION_SIZE > data.len() {
            break;
        }
        let mut exception = CalendarException {
            from: dates::date(data, pos),
            to: dates::date(data, pos + 2),
            ..Default::default()
        };
        let period_count =
            usize::from(read_u16_le(data, pos + 6).unwrap_or(0)).min(CHAINED_MAX_PERIODS);
        for period in 0..period_count {
            let Some(start) = dates::time(data, pos + 12 + period * 2) else {
                continue;
            };
            let tenths = read_u16_le(data, pos + 20 + period * 4).unwrap_or(0);
            exception.ranges.push(range_from(start, u32::from(tenths) / 10));
        }
        calendar.exceptions.push(exception);
    }
}

/// Decode the exception records. Returns the offset just past the last
/// record, where the work week section begins.
fn read_exceptions(
    data: &[u8],
    offset: usize,
    calendar: &mut Calendar,
    warnings: &mut WarningSink,
) -> usize {
    let count = read_u16_le(data, offset).unwrap_or(0);
    let mut pos = offset + 4;

    for index in 0..count {
        if pos + EXCEPTION_RECORD_SIZE > data.len() {
            warnings.push(DecodeWarning::EntrySkipped {
                stream: "Var2Data",
                detail: format!("calendar exception {index} of {count} truncated"),
            });
            break;
        }

        let mut exception = CalendarException {
            from: dates::date(data, pos),
            to: dates::date(data, pos + 2),
            ..Default::default()
        };

        let period_count = usize::from(read_u16_le(data, pos + 14).unwrap_or(0)).min(MAX_PERIODS);
        for period in 0..period_count {
            let Some(start) = dates::time(data, pos + 20 + period * 2) else {
                continue;
            };
            let tenths = read_u16_le(data, pos + 32 + period * 4).unwrap_or(0);
            exception.ranges.push(range_from(start, u32::from(tenths) / 10));
        }

        exception.recurring = read_recurrence(data, pos);

        let name_length = read_i32_le(data, pos + 88).unwrap_or(0).max(0) as usize;
        let padded_name = name_length.next_multiple_of(4);
        if name_length > 0 && pos + EXCEPTION_RECORD_SIZE + padded_name <= data.len() {
            let name = unicode_string_capped(data, pos + EXCEPTION_RECORD_SIZE, padded_name);
            if !name.is_empty() {
                exception.name = Some(name);
            }
        }

        calendar.exceptions.push(exception);
        pos += EXCEPTION_RECORD_SIZE + padded_name;
    }
    pos
}

/// Decode the recurrence pattern of one exception record at `pos`.
///
/// A daily pattern with frequency 1 is how single-range exceptions are
/// stored; those flatten to a plain dated exception.
fn read_recurrence(data: &[u8], pos: usize) -> Option<RecurrencePattern> {
    let type_code = usize::from(read_u16_le(data, pos + 72).ok()?);
    let (recurrence, relative) = (*RECURRENCE_TYPES.get(type_code)?)?;

    let occurrences = read_u16_le(data, pos + 4).unwrap_or(1);
    let mut pattern = RecurrencePattern {
        recurrence,
        relative,
        occurrences,
        frequency: 1,
        weekly_days: [false; 7],
        day_of_week: None,
        day_number: 0,
        month_number: 0,
    };

    match (recurrence, relative) {
        (RecurrenceType::Daily, _) => {
            pattern.frequency = read_u16_le(data, pos + 76).unwrap_or(1);
            if pattern.frequency <= 1 {
                return None;
            }
        }
        (RecurrenceType::Weekly, _) => {
            let mask = read_u8(data, pos + 76).unwrap_or(0);
            for (index, &bit) in DAY_MASKS.iter().enumerate() {
                pattern.weekly_days[index] = mask & bit != 0;
            }
            pattern.frequency = read_u16_le(data, pos + 78).unwrap_or(1);
        }
        (RecurrenceType::Monthly, false) => {
            pattern.day_number = read_u8(data, pos + 76).unwrap_or(0);
            pattern.frequency = u16::from(read_u8(data, pos + 78).unwrap_or(1));
        }
        (RecurrenceType::Monthly, true) => {
            pattern.day_number = read_u8(data, pos + 76).unwrap_or(0).wrapping_add(1);
            pattern.day_of_week =
                weekday_from_index(i32::from(read_u8(data, pos + 77).unwrap_or(2)) - 2);
            pattern.frequency = read_u16_le(data, pos + 78).unwrap_or(1);
        }
        (RecurrenceType::Yearly, false) => {
            pattern.day_number = read_u8(data, pos + 77).unwrap_or(0);
            pattern.month_number = read_u8(data, pos + 76).unwrap_or(0).wrapping_add(1);
        }
        (RecurrenceType::Yearly, true) => {
            pattern.day_number = read_u8(data, pos + 77).unwrap_or(0).wrapping_add(1);
            pattern.day_of_week =
                weekday_from_index(i32::from(read_u8(data, pos + 78).unwrap_or(2)) - 2);
            pattern.month_number = read_u8(data, pos + 76).unwrap_or(0).wrapping_add(1);
        }
    }

    Some(pattern)
}

/// Decode the work week records following the exception section.
fn read_work_weeks(data: &[u8], offset: usize, calendar: &mut Calendar) {
    // Section header.
    let mut pos = offset + 4;
    const RECORD_MIN: usize = 7 * DAY_BLOCK_SIZE + 2 + 2 + 8 + 4;

    while data.len() >= pos + RECORD_MIN {
        let mut week = WorkWeek::default();

        for (day_index, day) in week.days.iter_mut().enumerate() {
            let block = &data[pos + day_index * DAY_BLOCK_SIZE..pos + (day_index + 1) * DAY_BLOCK_SIZE];
            if read_u16_le(block, 0).unwrap_or(0) == 1 {
                day.day_type = DayType::Default;
                continue;
            }
            let range_count = usize::from(read_u16_le(block, 2).unwrap_or(0)).min(MAX_PERIODS);
            if range_count == 0 {
                *day = CalendarDay::non_working();
                continue;
            }
            let mut ranges = Vec::with_capacity(range_count);
            for range in 0..range_count {
                let Some(start) = dates::time(block, 8 + range * 2) else {
                    continue;
                };
                let seconds = read_i32_le(block, 20 + range * 4).unwrap_or(0).max(0);
                ranges.push(range_from(start, (seconds as u32 * 6) / 60));
            }
            *day = CalendarDay::working(ranges);
        }
        pos += 7 * DAY_BLOCK_SIZE;

        week.from = dates::date(data, pos);
        week.to = dates::date(data, pos + 2);
        pos += 4 + 8;

        let name_length = read_i32_le(data, pos).unwrap_or(0).max(0) as usize;
        pos += 4;
        let padded_name = name_length.next_multiple_of(4);
        if name_length > 0 && pos + padded_name <= data.len() {
            let name = unicode_string_capped(data, pos, padded_name);
            if !name.is_empty() {
                week.name = Some(name);
            }
        }
        pos += padded_name;

        calendar.work_weeks.push(week);
    }
}

/// Validate base references, then resolve inherited weekdays down the base
/// chain. A derived calendar whose base is missing is dropped with a
/// warning, and the removal repeats until no calendar dangles.
fn link_bases(set: &mut CalendarSet, warnings: &mut WarningSink) {
    loop {
        let ids: HashSet<u32> = set.calendars.iter().map(|c| c.unique_id).collect();
        let mut dropped = false;
        set.calendars.retain(|calendar| match calendar.base_calendar_id {
            Some(base) if !ids.contains(&base) => {
                warnings.push(DecodeWarning::MissingBaseCalendar {
                    calendar: calendar.unique_id,
                    base,
                });
                dropped = true;
                false
            }
            _ => true,
        });
        if !dropped {
            break;
        }
    }

    let ids: HashSet<u32> = set.calendars.iter().map(|c| c.unique_id).collect();
    set.resource_map.retain(|_, id| ids.contains(id));

    let snapshot: BTreeMap<u32, Calendar> = set
        .calendars
        .iter()
        .map(|c| (c.unique_id, c.clone()))
        .collect();

    for calendar in &mut set.calendars {
        for day_index in 0..7 {
            if calendar.days[day_index].day_type != DayType::Default {
                continue;
            }
            let mut current = calendar.base_calendar_id;
            let mut visited = HashSet::new();
            while let Some(id) = current {
                if !visited.insert(id) {
                    break;
                }
                let Some(base) = snapshot.get(&id) else {
                    break;
                };
                match base.days[day_index].day_type {
                    DayType::Default => current = base.base_calendar_id,
                    _ => {
                        calendar.days[day_index] = base.days[day_index].clone();
                        break;
                    }
                }
            }
        }
    }
}

fn weekday_from_index(index: i32) -> Option<chrono::Weekday> {
    use chrono::Weekday;
    match index.rem_euclid(7) {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        _ => Some(Weekday::Sat),
    }
}

/// Build a range from a start time and a duration in whole minutes,
/// mapping a midnight end back to 00:00.
fn range_from(start: NaiveTime, duration_minutes: u32) -> TimeRange {
    use chrono::Timelike;
    let end_total = start.hour() * 60 + start.minute() + duration_minutes;
    let end = if end_total >= 24 * 60 {
        NaiveTime::MIN
    } else {
        NaiveTime::from_hms_opt(end_total / 60, end_total % 60, 0).unwrap_or(NaiveTime::MIN)
    };
    TimeRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::NaiveDate;

    use crate::mpp::blocks::BLOCK_MAGIC;
    use crate::storage::MemoryDirectory;

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

    fn blob(payload: &[u8]) -> Vec<u8> {
        let mut data = (payload.len() as i32).to_le_bytes().to_vec();
        data.extend_from_slice(payload);
        data
    }

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .chain([0, 0])
            .collect()
    }

    fn index_record(id: i32, base: i32, resource: i32) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&id.to_le_bytes());
        record.extend_from_slice(&base.to_le_bytes());
        record.extend_from_slice(&resource.to_le_bytes());
        record
    }

    /// A 60-byte weekday block with explicit working periods, given as
    /// (start minutes, duration minutes).
    fn day_block(periods: &[(u16, u16)]) -> Vec<u8> {
        let mut block = vec![0u8; DAY_BLOCK_SIZE];
        block[2..4].copy_from_slice(&(periods.len() as u16).to_le_bytes());
        for (index, &(start, duration)) in periods.iter().enumerate() {
            block[8 + index * 2..10 + index * 2].copy_from_slice(&(start * 10).to_le_bytes());
            block[20 + index * 4..22 + index * 4].copy_from_slice(&(duration * 10).to_le_bytes());
        }
        block
    }

    fn inherit_block() -> Vec<u8> {
        let mut block = vec![0u8; DAY_BLOCK_SIZE];
        block[0..2].copy_from_slice(&1u16.to_le_bytes());
        block
    }

    /// Standard week in the data blob layout: Sunday/Saturday non-working,
    /// weekdays 08:00-12:00 and 13:00-17:00.
    fn week_blocks() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&day_block(&[]));
        for _ in 0..5 {
            data.extend_from_slice(&day_block(&[(480, 240), (780, 240)]));
        }
        data.extend_from_slice(&day_block(&[]));
        data
    }

    struct Fixture {
        records: Vec<Vec<u8>>,
        var_entries: Vec<(u32, u16, u32)>,
        var_data: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                records: Vec::new(),
                var_entries: Vec::new(),
                var_data: Vec::new(),
            }
        }

        fn add_calendar(
            &mut self,
            id: i32,
            base: i32,
            resource: i32,
            name: Option<&str>,
            data: Option<&[u8]>,
        ) {
            self.records.push(index_record(id, base, resource));
            if let Some(name) = name {
                self.var_entries.push((id as u32, 1, self.var_data.len() as u32));
                self.var_data.extend_from_slice(&blob(&utf16(name)));
            }
            if let Some(data) = data {
                self.var_entries.push((id as u32, 3, self.var_data.len() as u32));
                self.var_data.extend_from_slice(&blob(data));
            }
        }

        fn build(self) -> MemoryDirectory {
            let mut fixed_data = Vec::new();
            let mut offsets = Vec::new();
            for record in &self.records {
                offsets.push(fixed_data.len() as i32);
                fixed_data.extend_from_slice(record);
            }

            let mut root = MemoryDirectory::new();
            let dir = root.directory_mut(names::CALENDAR_DIR);
            dir.insert_stream(names::FIXED_META, fixed_meta_stream(&offsets));
            dir.insert_stream(names::FIXED_DATA, fixed_data);
            dir.insert_stream(names::VAR_META, var_meta_stream(&self.var_entries));
            dir.insert_stream(names::VAR2_DATA, self.var_data);
            root
        }
    }

    fn read(root: &MemoryDirectory, warnings: &mut WarningSink) -> CalendarSet {
        let streams = StreamFactory::passthrough();
        let reader = CalendarReader::new(SchemaVersion::Mpp9, &streams);
        reader.read(root, &Props::default(), warnings).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_base_calendar_hours() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&week_blocks());

        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("Standard"), Some(&data));
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);

        assert_eq!(set.len(), 1);
        let calendar = set.by_name("Standard").unwrap();
        assert_eq!(calendar.working_minutes_on(d(2024, 1, 1)), 480.0);
        assert!(!calendar.is_working_date(d(2024, 1, 6)));
        assert!(calendar.base_calendar_id.is_none());
    }

    #[test]
    fn test_inherit_flag_on_base_uses_default_hours() {
        let mut data = vec![0u8; 4];
        for _ in 0..7 {
            data.extend_from_slice(&inherit_block());
        }

        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("Standard"), Some(&data));
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);
        let calendar = set.get(1).unwrap();
        // Base calendars resolve the inherit flag to the standard pattern,
        // weekends included.
        assert_eq!(calendar.working_minutes_on(d(2024, 1, 6)), 480.0);
    }

    #[test]
    fn test_derived_calendar_inherits_base_days() {
        let mut base_data = vec![0u8; 4];
        base_data.extend_from_slice(&week_blocks());

        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("Standard"), Some(&base_data));
        // Resource calendar with no data blob at all.
        fixture.add_calendar(2, 1, 7, None, None);
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);

        let derived = set.get(2).unwrap();
        assert_eq!(derived.base_calendar_id, Some(1));
        assert_eq!(derived.working_minutes_on(d(2024, 1, 1)), 480.0);
        assert!(!derived.is_working_date(d(2024, 1, 7)));
        assert_eq!(set.calendar_for_resource(7).unwrap().unique_id, 2);
    }

    #[test]
    fn test_missing_base_dropped_with_warning() {
        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("Standard"), None);
        fixture.add_calendar(2, 99, 0, Some("Orphan"), None);
        // Derives from the orphan, so it dangles once the orphan goes.
        fixture.add_calendar(3, 2, 0, Some("Grandchild"), None);
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);

        assert_eq!(set.len(), 1);
        assert!(set.get(2).is_none());
        assert!(set.get(3).is_none());
        assert!(warnings.iter().any(|w| matches!(
            w,
            DecodeWarning::MissingBaseCalendar { calendar: 2, base: 99 }
        )));
        assert!(warnings.iter().any(|w| matches!(
            w,
            DecodeWarning::MissingBaseCalendar { calendar: 3, base: 2 }
        )));
    }

    #[test]
    fn test_duplicate_and_invalid_ids_skipped() {
        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("First"), None);
        fixture.add_calendar(0, 0, 0, None, None);
        fixture.add_calendar(1, 0, 0, Some("Duplicate"), None);
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(1).unwrap().name.as_deref(), Some("First"));
    }

    #[test]
    fn test_non_working_exception() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&week_blocks());
        // Exception header: one record.
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        let mut record = vec![0u8; EXCEPTION_RECORD_SIZE];
        let holiday = (d(2024, 1, 1) - dates::epoch_date()).num_days() as u16;
        record[0..2].copy_from_slice(&holiday.to_le_bytes());
        record[2..4].copy_from_slice(&holiday.to_le_bytes());
        data.extend_from_slice(&record);

        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("Standard"), Some(&data));
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);
        let calendar = set.get(1).unwrap();

        assert_eq!(calendar.exceptions.len(), 1);
        assert!(!calendar.is_working_date(d(2024, 1, 1)));
        assert!(calendar.is_working_date(d(2024, 1, 2)));
    }

    #[test]
    fn test_exception_with_name_and_hours() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&week_blocks());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let mut record = vec![0u8; EXCEPTION_RECORD_SIZE];
        let day = (d(2024, 7, 5) - dates::epoch_date()).num_days() as u16;
        record[0..2].copy_from_slice(&day.to_le_bytes());
        record[2..4].copy_from_slice(&day.to_le_bytes());
        record[4..6].copy_from_slice(&1u16.to_le_bytes());
        // One half-day period, 08:00 for four hours.
        record[14..16].copy_from_slice(&1u16.to_le_bytes());
        record[20..22].copy_from_slice(&4800u16.to_le_bytes());
        record[32..34].copy_from_slice(&2400u16.to_le_bytes());
        let name = utf16("Half day");
        record[88..92].copy_from_slice(&(name.len() as i32).to_le_bytes());
        data.extend_from_slice(&record);
        data.extend_from_slice(&name);
        data.resize(data.len().next_multiple_of(4), 0);

        let mut fixture = Fixture::new();
        fixture.add_calendar(1, 0, 0, Some("Standard"), Some(&data));
        let root = fixture.build();

        let mut warnings = WarningSink::new();
        let set = read(&root, &mut warnings);
        let calendar = set.get(1).unwrap();

        let exception = &calendar.exceptions[0];
        assert_eq!(exception.name.as_deref(), Some("Half day"));
        assert_eq!(calendar.working_minutes_on(d(2024, 7, 5)), 240.0);
        assert!(exception.recurring.is_none());
    }

    #[test]
    fn test_weekly_recurrence_decoded() {
        let mut record = vec![0u8; EXCEPTION_RECORD_SIZE];
        record[4..6].copy_from_slice(&10u16.to_le_bytes());
        record[72..74].copy_from_slice(&6u16.to_le_bytes());
        record[76] = 0x22; // Monday and Friday
        record[78..80].copy_from_slice(&2u16.to_le_bytes());

        let pattern = read_recurrence(&record, 0).unwrap();
        assert_eq!(pattern.recurrence, RecurrenceType::Weekly);
        assert!(!pattern.relative);
        assert_eq!(pattern.occurrences, 10);
        assert_eq!(pattern.frequency, 2);
        assert!(pattern.weekly_days[1]);
        assert!(pattern.weekly_days[5]);
        assert!(!pattern.weekly_days[0]);
    }

    #[test]
    fn test_monthly_relative_recurrence() {
        let mut record = vec![0u8; EXCEPTION_RECORD_SIZE];
        record[72..74].copy_from_slice(&5u16.to_le_bytes());
        record[76] = 1; // second
        record[77] = 3; // Tuesday
        record[78..80].copy_from_slice(&3u16.to_le_bytes());

        let pattern = read_recurrence(&record, 0).unwrap();
        assert_eq!(pattern.recurrence, RecurrenceType::Monthly);
        assert!(pattern.relative);
        assert_eq!(pattern.day_number, 2);
        assert_eq!(pattern.day_of_week, Some(chrono::Weekday::Tue));
        assert_eq!(pattern.frequency, 3);
    }

    #[test]
    fn test_daily_frequency_one_flattens() {
        let mut record = vec![0u8; EXCEPTION_RECORD_SIZE];
        record[72..74].copy_from_slice(&1u16.to_le_bytes());
        record[76..78].copy_from_slice(&1u16.to_le_bytes());
        assert!(read_recurrence(&record, 0).is_none());
    }

    #[test]
    fn test_work_weeks_decoded() {
        let layout = SchemaVersion::Mpp12.calendar_layout().unwrap();
        assert!(layout.work_weeks);

        let mut data = week_blocks();
        // No exceptions.
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        // Work week section header.
        data.extend_from_slice(&[0u8; 4]);

        // One work week: mornings only on weekdays.
        data.extend_from_slice(&{
            let mut block = vec![0u8; DAY_BLOCK_SIZE];
            block[2..4].copy_from_slice(&0u16.to_le_bytes());
            block
        });
        for _ in 0..5 {
            let mut block = vec![0u8; DAY_BLOCK_SIZE];
            block[2..4].copy_from_slice(&1u16.to_le_bytes());
            block[8..10].copy_from_slice(&4800u16.to_le_bytes());
            // Four hours in 6-second units.
            block[20..24].copy_from_slice(&2400i32.to_le_bytes());
            data.extend_from_slice(&block);
        }
        data.extend_from_slice(&vec![0u8; DAY_BLOCK_SIZE]);

        let from = (d(2024, 1, 8) - dates::epoch_date()).num_days() as u16;
        let to = (d(2024, 1, 12) - dates::epoch_date()).num_days() as u16;
        data.extend_from_slice(&from.to_le_bytes());
        data.extend_from_slice(&to.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&0i32.to_le_bytes());

        let mut calendar = Calendar {
            days: default_week(),
            ..Default::default()
        };
        let after = read_exceptions(&data, 7 * DAY_BLOCK_SIZE, &mut calendar, &mut WarningSink::new());
        read_work_weeks(&data, after, &mut calendar);

        assert_eq!(calendar.work_weeks.len(), 1);
        assert_eq!(calendar.working_minutes_on(d(2024, 1, 8)), 240.0);
        assert_eq!(calendar.working_minutes_on(d(2024, 1, 15)), 480.0);
    }

    /// Append one item to a chained stream under construction, returning
    /// its offset.
    fn defer_item(defer: &mut Vec<u8>, payload: &[u8]) -> i32 {
        let offset = defer.len() as i32;
        defer.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        defer.extend_from_slice(payload);
        offset
    }

    /// Pad a chained stream to one full block with an end-of-chain
    /// trailer.
    fn defer_stream(mut defer: Vec<u8>) -> Vec<u8> {
        defer.resize(1020, 0);
        defer.extend_from_slice(&(-1i32).to_le_bytes());
        defer
    }

    fn chained_record(id: i32, base: i32, name_offset: i32, trailer_offset: i32) -> Vec<u8> {
        let mut record = vec![0u8; CHAINED_RECORD_SIZE];
        record[0..4].copy_from_slice(&id.to_le_bytes());
        record[4..8].copy_from_slice(&base.to_le_bytes());
        record[CHAINED_NAME_OFFSET..CHAINED_NAME_OFFSET + 4]
            .copy_from_slice(&(!name_offset).to_le_bytes());
        record[CHAINED_TRAILER_OFFSET..CHAINED_TRAILER_OFFSET + 4]
            .copy_from_slice(&(!trailer_offset).to_le_bytes());
        record
    }

    fn chained_trailer(data_offset: i32) -> Vec<u8> {
        let mut entry = 12i32.to_le_bytes().to_vec();
        entry.extend_from_slice(&CHAINED_DATA_KEY.to_le_bytes());
        entry.extend_from_slice(&(!data_offset).to_le_bytes());
        entry
    }

    fn chained_day_block(periods: &[(u16, u16)]) -> Vec<u8> {
        let mut block = vec![0u8; CHAINED_DAY_BLOCK_SIZE];
        block[2..4].copy_from_slice(&(periods.len() as u16).to_le_bytes());
        for (index, &(start, duration)) in periods.iter().enumerate() {
            block[8 + index * 2..10 + index * 2].copy_from_slice(&(start * 10).to_le_bytes());
            block[16 + index * 4..20 + index * 4]
                .copy_from_slice(&(u32::from(duration) * 10).to_le_bytes());
        }
        block
    }

    /// Standard week in the first-generation blob layout.
    fn chained_week_blob() -> Vec<u8> {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&chained_day_block(&[]));
        for _ in 0..5 {
            data.extend_from_slice(&chained_day_block(&[(480, 240), (780, 240)]));
        }
        data.extend_from_slice(&chained_day_block(&[]));
        data
    }

    fn chained_root(records: &[Vec<u8>], defer: Vec<u8>) -> MemoryDirectory {
        let mut root = MemoryDirectory::new();
        let dir = root.directory_mut(names::CALENDAR_DIR);
        dir.insert_stream(names::FIX_FIX, records.concat());
        dir.insert_stream(names::FIX_DEFER_FIX, defer_stream(defer));
        root
    }

    fn read_mpp8(root: &MemoryDirectory, warnings: &mut WarningSink) -> CalendarSet {
        let streams = StreamFactory::passthrough();
        let reader = CalendarReader::new(SchemaVersion::Mpp8, &streams);
        reader.read(root, &Props::default(), warnings).unwrap()
    }

    #[test]
    fn test_chained_base_calendar_with_exception() {
        let mut blob = chained_week_blob();
        blob[0..2].copy_from_slice(&1u16.to_le_bytes());
        let mut record = vec![0u8; CHAINED_EXCEPTION_SIZE];
        let holiday = (d(2024, 1, 1) - dates::epoch_date()).num_days() as u16;
        record[0..2].copy_from_slice(&holiday.to_le_bytes());
        record[2..4].copy_from_slice(&holiday.to_le_bytes());
        blob.extend_from_slice(&record);

        let mut defer = Vec::new();
        let name = defer_item(&mut defer, &utf16("Standard"));
        let data = defer_item(&mut defer, &blob);
        let trailer = defer_item(&mut defer, &chained_trailer(data));
        let root = chained_root(&[chained_record(1, 0, name, trailer)], defer);

        let mut warnings = WarningSink::new();
        let set = read_mpp8(&root, &mut warnings);

        assert_eq!(set.len(), 1);
        let calendar = set.by_name("Standard").unwrap();
        assert_eq!(calendar.working_minutes_on(d(2024, 1, 2)), 480.0);
        assert!(!calendar.is_working_date(d(2024, 1, 6)));
        assert_eq!(calendar.exceptions.len(), 1);
        assert!(!calendar.is_working_date(d(2024, 1, 1)));
    }

    #[test]
    fn test_chained_derived_calendar_inherits_base() {
        let mut defer = Vec::new();
        let base_name = defer_item(&mut defer, &utf16("Standard"));
        let base_data = defer_item(&mut defer, &chained_week_blob());
        let base_trailer = defer_item(&mut defer, &chained_trailer(base_data));
        // Empty trailer: no data key, so the derived calendar inherits.
        let derived_name = defer_item(&mut defer, &utf16("Resource"));
        let derived_trailer = defer_item(&mut defer, &[]);
        let root = chained_root(
            &[
                chained_record(1, 0, base_name, base_trailer),
                chained_record(2, 1, derived_name, derived_trailer),
            ],
            defer,
        );

        let mut warnings = WarningSink::new();
        let set = read_mpp8(&root, &mut warnings);

        assert_eq!(set.len(), 2);
        let derived = set.get(2).unwrap();
        assert_eq!(derived.base_calendar_id, Some(1));
        assert_eq!(derived.working_minutes_on(d(2024, 1, 1)), 480.0);
        assert!(!derived.is_working_date(d(2024, 1, 7)));
    }

    #[test]
    fn test_chained_default_flag_keeps_weekend_free() {
        let mut blob = vec![0u8; 4];
        for _ in 0..7 {
            let mut block = vec![0u8; CHAINED_DAY_BLOCK_SIZE];
            block[0..2].copy_from_slice(&1u16.to_le_bytes());
            blob.extend_from_slice(&block);
        }

        let mut defer = Vec::new();
        let name = defer_item(&mut defer, &utf16("Standard"));
        let data = defer_item(&mut defer, &blob);
        let trailer = defer_item(&mut defer, &chained_trailer(data));
        let root = chained_root(
            &[
                // Deleted records carry a negative id.
                chained_record(-1, 0, 0, 0),
                chained_record(1, 0, name, trailer),
            ],
            defer,
        );

        let mut warnings = WarningSink::new();
        let set = read_mpp8(&root, &mut warnings);

        assert_eq!(set.len(), 1);
        let calendar = set.get(1).unwrap();
        assert_eq!(calendar.working_minutes_on(d(2024, 1, 1)), 480.0);
        assert!(!calendar.is_working_date(d(2024, 1, 6)));
    }
}
