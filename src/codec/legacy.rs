//! Legacy decoder capability.
//!
//! Older saves use a document shape this crate no longer writes. The host
//! supplies a [`LegacyDecoder`] that can still read them; the resolver only
//! calls it when the modern decoder reports a malformed stream.

use std::path::Path;

use crate::error::LegacyFormatError;

/// Read-only decoder for pre-migration snapshots.
pub trait LegacyDecoder<T> {
    /// Decodes a legacy blob held in a string (database column).
    ///
    /// # Errors
    ///
    /// Returns [`LegacyFormatError`] if the input is not a legacy snapshot
    /// either.
    fn decode_str(&self, raw: &str) -> Result<T, LegacyFormatError>;

    /// Decodes a legacy snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`LegacyFormatError`] if the file cannot be read or is not a
    /// legacy snapshot.
    fn decode_file(&self, path: &Path) -> Result<T, LegacyFormatError>;
}

/// Decoder for hosts that never wrote the legacy format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLegacyFormat;

impl<T> LegacyDecoder<T> for NoLegacyFormat {
    fn decode_str(&self, _raw: &str) -> Result<T, LegacyFormatError> {
        Err(LegacyFormatError::new("no legacy decoder configured"))
    }

    fn decode_file(&self, path: &Path) -> Result<T, LegacyFormatError> {
        Err(LegacyFormatError::new(format!(
            "no legacy decoder configured for {}",
            path.display()
        )))
    }
}
