//! Raw block-stream readers.
//!
//! Every data directory in the container is built from a small number of
//! recurring stream shapes: fixed-size record tables (`FixedMeta` +
//! `FixedData`), keyed variable-length data (`VarMeta` + `Var2Data`),
//! property bags (`Props`) and chained deferred blocks (`FixDeferFix`).
//! The readers here decode those shapes without interpreting the records.

mod extended_data;
mod fix_defer_fix;
mod fixed_data;
mod fixed_meta;
mod props;
mod var2data;
mod var_meta;

pub use extended_data::ExtendedData;
pub use fix_defer_fix::FixDeferFix;
pub use fixed_data::FixedData;
pub use fixed_meta::{FixedMeta, ItemSize, RecordFlags};
pub use props::{keys, Props};
pub use var2data::Var2Data;
pub use var_meta::VarMeta;

/// Magic number carried by FixedMeta and VarMeta stream headers.
pub const BLOCK_MAGIC: u32 = 0xFADF_ADBA;
