//! Stream decryption.
//!
//! Password-flagged files XOR the record streams with a single mask byte
//! derived from the encryption code property. The factory wraps stream
//! opening so component readers stay unaware of whether a transform is in
//! effect.
use bytes::Bytes;

use crate::common::error::{Error, Result};
use crate::mpp::blocks::{keys, Props};
use crate::storage::CompoundDirectory;

/// Bit in the password flag marking read protection.
const READ_PROTECTED: u8 = 0x01;

/// Opens streams, applying the XOR transform when the file is encrypted.
pub struct StreamFactory {
    mask: u8,
}

impl StreamFactory {
    /// Derive the transform from the root property bag.
    ///
    /// The mask is `0xFF - encryption_code`; a zero code (or no password
    /// flag at all) means streams pass through untouched.
    pub fn new(props: &Props) -> Self {
        let code = props.byte(keys::ENCRYPTION_CODE);
        let mask = if props.byte(keys::PASSWORD_FLAG) != 0 && code != 0 {
            0xFF - code
        } else {
            0
        };
        Self { mask }
    }

    /// A factory that never transforms. Used for streams outside the
    /// encrypted set.
    pub fn passthrough() -> Self {
        Self { mask: 0 }
    }

    /// The active mask byte; 0 means passthrough.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Open a stream and apply the transform.
    pub fn stream(&self, dir: &dyn CompoundDirectory, name: &str) -> Result<Bytes> {
        Ok(self.transform(dir.stream(name)?))
    }

    /// Apply the transform to stream contents.
    pub fn transform(&self, data: Bytes) -> Bytes {
        if self.mask == 0 {
            return data;
        }
        let mut bytes = data.to_vec();
        for b in &mut bytes {
            *b ^= self.mask;
        }
        Bytes::from(bytes)
    }
}

/// Fail with [`Error::PasswordProtected`] when the file requires a read
/// password. Write reservation alone does not block decoding.
pub fn require_readable(props: &Props) -> Result<()> {
    if props.byte(keys::PASSWORD_FLAG) & READ_PROTECTED != 0 {
        return Err(Error::PasswordProtected);
    }
    Ok(())
}
