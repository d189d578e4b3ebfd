//! Compound-document directory abstraction.
//!
//! The container is a hierarchy of named directories holding named streams.
//! Parsing the container itself (sector chains, FAT, mini-stream) is out of
//! scope here; any compound-file reader can back this trait. A simple
//! in-memory implementation is provided for callers who already hold the
//! stream bytes, and for tests.
use std::collections::HashMap;

use bytes::Bytes;

use crate::common::error::{Error, Result};

/// Well-known stream and directory entry names.
pub mod names {
    /// Record metadata stream paired with [`FIXED_DATA`].
    pub const FIXED_META: &str = "FixedMeta";
    /// Fixed-size record stream.
    pub const FIXED_DATA: &str = "FixedData";
    /// Secondary record metadata stream.
    pub const FIXED2_META: &str = "Fixed2Meta";
    /// Secondary fixed-size record stream.
    pub const FIXED2_DATA: &str = "Fixed2Data";
    /// Variable-data index stream paired with [`VAR2_DATA`].
    pub const VAR_META: &str = "VarMeta";
    /// Variable-length data stream.
    pub const VAR2_DATA: &str = "Var2Data";
    /// Property bag stream inside a data directory.
    pub const PROPS: &str = "Props";
    /// First-generation fixed record stream.
    pub const FIX_FIX: &str = "FixFix   0";
    /// First-generation chained-block stream paired with [`FIX_FIX`].
    pub const FIX_DEFER_FIX: &str = "FixDeferFix   0";

    /// Calendar data directory.
    pub const CALENDAR_DIR: &str = "TBkndCal";
    /// Outline code (lookup value) data directory.
    pub const OUTLINE_CODE_DIR: &str = "TBkndOutlCode";

    /// View definitions directory.
    pub const VIEW_DIR: &str = "CV_iew";
    /// Column table definitions directory.
    pub const TABLE_DIR: &str = "CTable";
    /// Filter definitions directory.
    pub const FILTER_DIR: &str = "CFilter";
    /// Group definitions directory.
    pub const GROUP_DIR: &str = "CGrouping";
    /// Saved view state directory.
    pub const EDL_DIR: &str = "CEdl";
}

/// A directory inside a compound document.
pub trait CompoundDirectory {
    /// Open the named stream, returning its full contents.
    fn stream(&self, name: &str) -> Result<Bytes>;

    /// Open the named child directory.
    fn directory(&self, name: &str) -> Result<&dyn CompoundDirectory>;

    /// True if a stream with this name exists here.
    fn has_stream(&self, name: &str) -> bool;

    /// True if a child directory with this name exists here.
    fn has_directory(&self, name: &str) -> bool;
}

/// In-memory [`CompoundDirectory`] backed by hash maps.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    streams: HashMap<String, Bytes>,
    directories: HashMap<String, MemoryDirectory>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a stream.
    pub fn insert_stream(&mut self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.streams.insert(name.into(), data.into());
    }

    /// Add or replace a child directory.
    pub fn insert_directory(&mut self, name: impl Into<String>, dir: MemoryDirectory) {
        self.directories.insert(name.into(), dir);
    }

    /// Get the named child directory, creating it if absent.
    pub fn directory_mut(&mut self, name: &str) -> &mut MemoryDirectory {
        self.directories.entry(name.to_string()).or_default()
    }
}

impl CompoundDirectory for MemoryDirectory {
    fn stream(&self, name: &str) -> Result<Bytes> {
        match self.streams.get(name) {
            Some(data) => Ok(data.clone()),
            None => {
                if self.directories.contains_key(name) {
                    Err(Error::InvalidData(format!("{name} is a directory")))
                } else {
                    Err(Error::MissingEntry(name.to_string()))
                }
            }
        }
    }

    fn directory(&self, name: &str) -> Result<&dyn CompoundDirectory> {
        match self.directories.get(name) {
            Some(dir) => Ok(dir),
            None => {
                if self.streams.contains_key(name) {
                    Err(Error::NotADirectory(name.to_string()))
                } else {
                    Err(Error::MissingEntry(name.to_string()))
                }
            }
        }
    }

    fn has_stream(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    fn has_directory(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }
}
