//! Planfile - a decoder for legacy Microsoft Project file internals
//!
//! This library decodes the binary record streams of legacy Microsoft
//! Project files (MPP8, MPP9, MPP12 and MPP14): calendars, filter and
//! group definitions, custom field lookup tables, graphical indicators,
//! timephased work and cost spans, and view presentation data.
//!
//! The compound-file container itself is supplied by the caller through
//! the [`storage::CompoundDirectory`] trait; any OLE2/CFB reader can back
//! it, and [`storage::MemoryDirectory`] covers callers who already hold
//! the stream bytes.
//!
//! # Example
//!
//! ```no_run
//! use planfile::mpp::{ProjectReader, SchemaVersion};
//! use planfile::storage::MemoryDirectory;
//!
//! # fn main() -> planfile::common::error::Result<()> {
//! # let root = MemoryDirectory::new();
//! // `root` is the container root, e.g. loaded by an OLE2 reader.
//! let reader = ProjectReader::new(SchemaVersion::Mpp9);
//! let data = reader.read(&root)?;
//!
//! for calendar in data.calendars.calendars() {
//!     println!("calendar: {:?}", calendar.name);
//! }
//! for warning in &data.warnings {
//!     println!("warning: {warning:?}");
//! }
//! # Ok(())
//! # }
//! ```

/// Shared binary decode helpers, dates, GUIDs and the error type.
pub mod common;

/// Output object model: calendars, criteria, filters, views, custom
/// fields and timephased spans.
pub mod model;

/// The decode layer: block readers, schema tables and component readers.
pub mod mpp;

/// Compound-document directory abstraction.
pub mod storage;

pub use common::error::{DecodeWarning, Error, Result};
pub use mpp::{ProjectData, ProjectReader, SchemaVersion};
