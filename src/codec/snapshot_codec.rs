//! Snapshot blob encoding.
//!
//! A snapshot is written as a single-key JSON document (`{"data": ...}`),
//! gzip-compressed, and for the string form base64-encoded. Decoding
//! reverses the stages in order and classifies each failure so the
//! resolver can decide whether a legacy decoder should be tried.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SnapshotError;

/// Root key under which every payload is stored.
pub const ROOT_TAG: &str = "data";

/// Encoder/decoder for snapshot blobs.
///
/// Stateless apart from the root key; safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCodec {
    root_tag: String,
}

impl SnapshotCodec {
    /// Creates a codec that stores payloads under `root_tag`.
    #[must_use]
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            root_tag: root_tag.into(),
        }
    }

    /// Returns the root key.
    #[must_use]
    pub fn root_tag(&self) -> &str {
        &self.root_tag
    }

    /// Encodes `payload` as a gzip-compressed document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] if the payload cannot be
    /// represented as JSON, or [`SnapshotError::Io`] if compression fails.
    pub fn encode_bytes<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<Vec<u8>, SnapshotError> {
        let document = self.document(payload)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&document)?;
        Ok(encoder.finish()?)
    }

    /// Encodes `payload` as a one-line base64 string of the compressed
    /// document, suitable for a text or binary column.
    ///
    /// # Errors
    ///
    /// Same as [`Self::encode_bytes`].
    pub fn encode_string<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<String, SnapshotError> {
        Ok(STANDARD.encode(self.encode_bytes(payload)?))
    }

    /// Writes `payload` to `path` as a gzip stream.
    ///
    /// The stream goes to a temporary file next to `path`, is synced, and
    /// then renamed over `path`. Readers see either the previous file or
    /// the complete new one. If anything fails before the rename, the
    /// target is left untouched and the temporary file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] if the payload cannot be
    /// represented as JSON, or [`SnapshotError::Io`] on any file failure.
    pub fn save_file<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        path: &Path,
    ) -> Result<(), SnapshotError> {
        let document = self.document(payload)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            )
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(file_name)
            .suffix(".tmp")
            .tempfile_in(dir)?;

        let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
        encoder.write_all(&document)?;
        encoder.finish()?;
        tmp.as_file().sync_all()?;

        tmp.persist(path).map_err(|e| SnapshotError::Io(e.error))?;
        Ok(())
    }

    /// Decodes a gzip-compressed document.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::Io`] if the gzip stream is invalid or truncated.
    /// - [`SnapshotError::MalformedStream`] if the content is not a valid
    ///   document.
    /// - [`SnapshotError::MissingRoot`] if the root key is absent.
    /// - [`SnapshotError::Payload`] if the root value is not a `T`.
    pub fn decode_bytes<T: DeserializeOwned>(&self, blob: &[u8]) -> Result<T, SnapshotError> {
        let raw = gunzip(blob)?;
        self.parse_document(&raw)
    }

    /// Decodes the base64 string form.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Encoding`] for invalid base64, otherwise as
    /// [`Self::decode_bytes`].
    pub fn decode_string<T: DeserializeOwned>(&self, blob: &str) -> Result<T, SnapshotError> {
        let compressed = STANDARD.decode(blob.trim())?;
        self.decode_bytes(&compressed)
    }

    /// Decodes a snapshot file written by [`Self::save_file`].
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Io`] if the file cannot be read, otherwise as
    /// [`Self::decode_bytes`].
    pub fn load_file<T: DeserializeOwned>(&self, path: &Path) -> Result<T, SnapshotError> {
        let file = File::open(path)?;
        let raw = gunzip(file)?;
        self.parse_document(&raw)
    }

    fn document<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Vec<u8>, SnapshotError> {
        let document = BTreeMap::from([(self.root_tag.as_str(), payload)]);
        serde_json::to_vec(&document).map_err(SnapshotError::Serialize)
    }

    fn parse_document<T: DeserializeOwned>(&self, raw: &[u8]) -> Result<T, SnapshotError> {
        let text =
            std::str::from_utf8(raw).map_err(|e| SnapshotError::MalformedStream(e.to_string()))?;
        let mut document: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SnapshotError::MalformedStream(e.to_string()))?;

        let payload = document
            .as_object_mut()
            .and_then(|root| root.remove(&self.root_tag))
            .filter(|value| !value.is_null())
            .ok_or_else(|| SnapshotError::MissingRoot(self.root_tag.clone()))?;

        serde_json::from_value(payload).map_err(SnapshotError::Payload)
    }
}

impl Default for SnapshotCodec {
    fn default() -> Self {
        Self::new(ROOT_TAG)
    }
}

/// Inflates the whole stream before anything is parsed, so truncation is
/// reported as i/o rather than as a malformed document.
fn gunzip(reader: impl Read) -> Result<Vec<u8>, SnapshotError> {
    let mut decoder = GzDecoder::new(reader);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}

/// Compresses raw document text. Used by tests that need hand-made blobs.
#[cfg(test)]
pub(crate) fn gzip(raw: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(raw);
    encoder.finish().unwrap_or_default()
}
