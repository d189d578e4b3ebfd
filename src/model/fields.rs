//! Field references and value types.
//!
//! Fields are identified on disk by a u32 whose high 16 bits select the
//! entity class and whose low 16 bits index the field within that class.
use std::fmt;

/// Entity class a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    Task,
    Resource,
    Assignment,
    Constraint,
    Project,
    /// A class prefix this decoder does not recognise.
    Unknown,
}

/// High-word class prefixes of stored field identifiers.
const TASK_FIELD_BASE: u32 = 0x0B40;
const RESOURCE_FIELD_BASE: u32 = 0x0C40;
const CONSTRAINT_FIELD_BASE: u32 = 0x0D40;
const PROJECT_FIELD_BASE: u32 = 0x0E40;
const ASSIGNMENT_FIELD_BASE: u32 = 0x0F40;

/// Reference to a field of some entity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: FieldClass,
    pub index: u16,
}

impl FieldRef {
    /// Construct a reference directly.
    pub fn new(class: FieldClass, index: u16) -> Self {
        Self { class, index }
    }

    /// Decode a stored u32 field identifier.
    pub fn from_raw(raw: u32) -> Self {
        let class = match raw >> 16 {
            TASK_FIELD_BASE => FieldClass::Task,
            RESOURCE_FIELD_BASE => FieldClass::Resource,
            CONSTRAINT_FIELD_BASE => FieldClass::Constraint,
            PROJECT_FIELD_BASE => FieldClass::Project,
            ASSIGNMENT_FIELD_BASE => FieldClass::Assignment,
            _ => FieldClass::Unknown,
        };
        Self {
            class,
            index: (raw & 0xFFFF) as u16,
        }
    }

    /// Re-encode as the stored u32 identifier.
    pub fn to_raw(self) -> u32 {
        let base = match self.class {
            FieldClass::Task => TASK_FIELD_BASE,
            FieldClass::Resource => RESOURCE_FIELD_BASE,
            FieldClass::Constraint => CONSTRAINT_FIELD_BASE,
            FieldClass::Project => PROJECT_FIELD_BASE,
            FieldClass::Assignment => ASSIGNMENT_FIELD_BASE,
            FieldClass::Unknown => 0,
        };
        (base << 16) | u32::from(self.index)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]", self.class, self.index)
    }
}

/// Value type of a field, driving how constants compare against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Duration,
    Numeric,
    Percentage,
    Currency,
    Boolean,
    Date,
    Unknown,
}

/// Display unit attached to a stored duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    ElapsedMinutes,
    Hours,
    ElapsedHours,
    Days,
    ElapsedDays,
    Weeks,
    ElapsedWeeks,
    Months,
    ElapsedMonths,
}

impl TimeUnit {
    /// Decode the stored unit value; unrecognised values fall back to
    /// days, the format's default display unit.
    pub fn from_raw(value: u16) -> Self {
        match value & 0xFF {
            0x03 => TimeUnit::Minutes,
            0x04 => TimeUnit::ElapsedMinutes,
            0x05 => TimeUnit::Hours,
            0x06 => TimeUnit::ElapsedHours,
            0x07 => TimeUnit::Days,
            0x08 => TimeUnit::ElapsedDays,
            0x09 => TimeUnit::Weeks,
            0x0A => TimeUnit::ElapsedWeeks,
            0x0B => TimeUnit::Months,
            0x0C => TimeUnit::ElapsedMonths,
            _ => TimeUnit::Days,
        }
    }
}
