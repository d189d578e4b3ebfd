//! Per-schema decode orchestration.
//!
//! The reader opens the project and view directories for one schema
//! generation, runs the component readers over them and collects every
//! warning raised along the way. Missing optional directories leave
//! their feature empty; only structural failures surface as errors.
use chrono::NaiveDateTime;

use crate::common::error::{DecodeWarning, Result, WarningSink};
use crate::model::custom_fields::CustomFieldRegistry;
use crate::model::views::{Filter, GanttBarStyle, Group, Table, View, ViewState};
use crate::mpp::blocks::keys;
use crate::mpp::calendar::{CalendarReader, CalendarSet};
use crate::mpp::crypto::{require_readable, StreamFactory};
use crate::mpp::custom_fields::CustomFieldReader;
use crate::mpp::filters::FilterReader;
use crate::mpp::groups::GroupReader;
use crate::mpp::indicators;
use crate::mpp::schema::SchemaVersion;
use crate::mpp::tables::TableReader;
use crate::mpp::views::{ViewReader, ViewStateReader};
use crate::storage::CompoundDirectory;

/// Scheduling minutes per day when the file does not say.
const DEFAULT_MINUTES_PER_DAY: i32 = 480;

/// Everything decoded from one file.
#[derive(Debug)]
pub struct ProjectData {
    pub version: SchemaVersion,
    pub start_date: Option<NaiveDateTime>,
    pub finish_date: Option<NaiveDateTime>,
    pub status_date: Option<NaiveDateTime>,
    pub minutes_per_day: i32,
    pub calendars: CalendarSet,
    pub custom_fields: CustomFieldRegistry,
    pub filters: Vec<Filter>,
    pub groups: Vec<Group>,
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub bar_styles: Vec<GanttBarStyle>,
    pub view_state: Option<ViewState>,
    /// Recoverable conditions encountered while decoding.
    pub warnings: Vec<DecodeWarning>,
}

/// Decodes one file of a known schema generation.
pub struct ProjectReader {
    version: SchemaVersion,
}

impl ProjectReader {
    pub fn new(version: SchemaVersion) -> Self {
        Self { version }
    }

    /// Decode the container rooted at `root`.
    pub fn read(&self, root: &dyn CompoundDirectory) -> Result<ProjectData> {
        let mut warnings = WarningSink::new();
        let version = self.version;

        let project_dir = root.directory(version.project_directory())?;
        let props = version.read_props(
            project_dir.stream(version.props_stream())?,
            &mut warnings,
        )?;
        require_readable(&props)?;
        let streams = StreamFactory::new(&props);

        let calendars =
            CalendarReader::new(version, &streams).read(project_dir, &props, &mut warnings)?;

        let mut custom_fields = CustomFieldRegistry::default();
        CustomFieldReader::new(version, &streams).read(
            project_dir,
            &props,
            &mut custom_fields,
            &mut warnings,
        )?;
        indicators::process(&props, &mut custom_fields, &mut warnings);

        let mut data = ProjectData {
            version,
            start_date: props.timestamp(keys::PROJECT_START_DATE),
            finish_date: props.timestamp(keys::PROJECT_FINISH_DATE),
            status_date: props.timestamp(keys::STATUS_DATE),
            minutes_per_day: match props.int(keys::MINUTES_PER_DAY) {
                minutes if minutes > 0 => minutes,
                _ => DEFAULT_MINUTES_PER_DAY,
            },
            calendars,
            custom_fields,
            filters: Vec::new(),
            groups: Vec::new(),
            tables: Vec::new(),
            views: Vec::new(),
            bar_styles: Vec::new(),
            view_state: None,
            warnings: Vec::new(),
        };

        if root.has_directory(version.view_directory()) {
            let view_dir = root.directory(version.view_directory())?;
            data.filters = FilterReader::new(version, &streams).read(view_dir, &mut warnings)?;
            data.groups = GroupReader::new(version, &streams).read(view_dir, &mut warnings)?;
            data.tables = TableReader::new(version, &streams).read(view_dir, &mut warnings)?;
            let views = ViewReader::new(version, &streams).read(view_dir, &mut warnings)?;
            data.views = views.views;
            data.bar_styles = views.bar_styles;
            data.view_state = ViewStateReader::new(version, &streams).read(view_dir, &mut warnings)?;
        }

        data.warnings = warnings.into_vec();
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Error;
    use crate::storage::MemoryDirectory;

    fn props9_stream(items: &[(u32, &[u8])]) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&(items.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        for &(key, value) in items {
            data.extend_from_slice(&key.to_le_bytes());
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
            data.extend_from_slice(value);
            if value.len() % 2 != 0 {
                data.push(0);
            }
        }
        data
    }

    fn minimal_root(props_items: &[(u32, &[u8])]) -> MemoryDirectory {
        let mut root = MemoryDirectory::new();
        root.directory_mut("   19")
            .insert_stream("Props9", props9_stream(props_items));
        root
    }

    #[test]
    fn test_minimal_project() {
        let root = minimal_root(&[(keys::MINUTES_PER_DAY, &450i32.to_le_bytes())]);
        let data = ProjectReader::new(SchemaVersion::Mpp9).read(&root).unwrap();

        assert_eq!(data.version, SchemaVersion::Mpp9);
        assert_eq!(data.minutes_per_day, 450);
        assert!(data.calendars.is_empty());
        assert!(data.filters.is_empty());
        assert!(data.views.is_empty());
        assert!(data.view_state.is_none());
    }

    #[test]
    fn test_minutes_per_day_default() {
        let root = minimal_root(&[]);
        let data = ProjectReader::new(SchemaVersion::Mpp9).read(&root).unwrap();
        assert_eq!(data.minutes_per_day, DEFAULT_MINUTES_PER_DAY);
    }

    #[test]
    fn test_missing_project_directory() {
        let root = MemoryDirectory::new();
        assert!(matches!(
            ProjectReader::new(SchemaVersion::Mpp9).read(&root),
            Err(Error::MissingEntry(_))
        ));
    }

    #[test]
    fn test_password_protected_file() {
        let root = minimal_root(&[(keys::PASSWORD_FLAG, &1u16.to_le_bytes())]);
        assert!(matches!(
            ProjectReader::new(SchemaVersion::Mpp9).read(&root),
            Err(Error::PasswordProtected)
        ));
    }

    #[test]
    fn test_write_reserved_file_still_reads() {
        let root = minimal_root(&[(keys::PASSWORD_FLAG, &2u16.to_le_bytes())]);
        assert!(ProjectReader::new(SchemaVersion::Mpp9).read(&root).is_ok());
    }
}
