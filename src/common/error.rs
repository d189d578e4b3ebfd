//! Unified error types for the planfile library.
//!
//! Structural problems that make a stream undecodable are reported through
//! [`Error`]. Per-item conditions the decoder can recover from (clamped
//! lengths, skipped offsets, re-derived counts) never abort a decode pass;
//! they are appended to the pass's [`WarningSink`] instead.
use thiserror::Error;

/// Main error type for planfile operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A block stream carried the wrong magic number
    #[error("bad magic in {stream}: expected {expected:#010x}, found {found:#010x}")]
    BadMagic {
        stream: &'static str,
        expected: u32,
        found: u32,
    },

    /// Fewer bytes available than a fixed structure requires
    #[error("truncated data: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// A required stream or directory entry is absent
    #[error("entry not found: {0}")]
    MissingEntry(String),

    /// An entry exists but is a stream where a directory was expected
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Malformed data that cannot be recovered from
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The file is write-reserved or read-protected with a password
    #[error("file is password protected")]
    PasswordProtected,
}

/// Result type for planfile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable condition observed while decoding.
///
/// Warnings record where the decoder clamped, skipped or re-derived values
/// rather than failing, so callers can audit how lossy a decode was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// The declared item count disagreed with the stream length; the derived
    /// count was used instead.
    ItemCountAdjusted {
        stream: &'static str,
        declared: u32,
        derived: u32,
    },

    /// A stored offset pointed beyond the end of its data buffer.
    OffsetOutOfRange {
        stream: &'static str,
        offset: u32,
    },

    /// A stored item length was negative or overran the buffer and was
    /// clamped.
    LengthClamped {
        stream: &'static str,
        index: usize,
        stored: i32,
        clamped: usize,
    },

    /// A record was dropped during decode.
    EntrySkipped {
        stream: &'static str,
        detail: String,
    },

    /// A block chain revisited an offset; traversal stopped early.
    ChainCycle { offset: u32 },

    /// A criteria block carried a tag byte with no known meaning.
    UnrecognisedTag { offset: u32, tag: u8 },

    /// A derived calendar referenced a base calendar that does not exist.
    MissingBaseCalendar { calendar: u32, base: u32 },
}

/// Ordered collection of [`DecodeWarning`] values owned by one decode pass.
#[derive(Debug, Default)]
pub struct WarningSink {
    warnings: Vec<DecodeWarning>,
}

impl WarningSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, warning: DecodeWarning) {
        self.warnings.push(warning);
    }

    /// True if no warnings were recorded.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of warnings recorded so far.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Iterate over recorded warnings in decode order.
    pub fn iter(&self) -> impl Iterator<Item = &DecodeWarning> {
        self.warnings.iter()
    }

    /// Consume the sink, returning the recorded warnings.
    pub fn into_vec(self) -> Vec<DecodeWarning> {
        self.warnings
    }
}
