//! Common types and utilities shared across the decode layers.
//!
//! This module provides the binary read helpers, date decoding, GUID type
//! and unified error/warning types used by every block reader.

// Submodule declarations
pub mod binary;
pub mod dates;
pub mod error;
pub mod guid;

// Re-exports for convenience
pub use error::{DecodeWarning, Error, Result, WarningSink};
pub use guid::Guid;
