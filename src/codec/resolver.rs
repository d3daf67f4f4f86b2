//! Modern-then-legacy snapshot decoding.
//!
//! Each call first runs the [`SnapshotCodec`]. Only a
//! [`SnapshotError::MalformedStream`] hands the same raw input to the
//! [`LegacyDecoder`]; every other failure is returned unchanged. When the
//! legacy decoder also fails, its error is the one reported.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;

use super::legacy::LegacyDecoder;
use super::snapshot_codec::SnapshotCodec;
use crate::domain::SnapshotId;
use crate::error::{LegacyFormatError, RestoreError, SnapshotError};

/// Decoder with legacy fallback.
///
/// The `*_or_none` variants are for best-effort loading (e.g. at login)
/// where a corrupt save must not stop the caller: the failure is logged
/// and `None` returned.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResolver<L> {
    codec: SnapshotCodec,
    legacy: L,
}

impl<L> SnapshotResolver<L> {
    /// Creates a resolver from a codec and a legacy decoder.
    #[must_use]
    pub const fn new(codec: SnapshotCodec, legacy: L) -> Self {
        Self { codec, legacy }
    }

    /// Returns the modern codec.
    #[must_use]
    pub const fn codec(&self) -> &SnapshotCodec {
        &self.codec
    }

    /// Returns the legacy decoder.
    #[must_use]
    pub const fn legacy(&self) -> &L {
        &self.legacy
    }

    /// Decodes a player's inventory from its string form.
    ///
    /// `owner` only appears in diagnostics.
    ///
    /// # Errors
    ///
    /// Any [`SnapshotError`] from the modern decoder other than
    /// `MalformedStream`, or [`SnapshotError::Legacy`] if the fallback
    /// also failed.
    pub fn resolve_player<T>(&self, owner: &str, blob: &str) -> Result<T, SnapshotError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        resolve(
            "inventory",
            &owner,
            || self.codec.decode_string(blob),
            || self.legacy.decode_str(blob),
        )
    }

    /// Decodes a snapshot file.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve_player`].
    pub fn resolve_file<T>(&self, path: &Path) -> Result<T, SnapshotError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        resolve(
            "file",
            &path.display(),
            || self.codec.load_file(path),
            || self.legacy.decode_file(path),
        )
    }

    /// Decodes a backpack keyed by id, as returned from a table scan.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve_player`].
    pub fn resolve_entry<T>(&self, id: &SnapshotId, blob: &str) -> Result<T, SnapshotError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        resolve(
            "backpack",
            id,
            || self.codec.decode_string(blob),
            || self.legacy.decode_str(blob),
        )
    }

    /// Decodes a player's inventory and hands it to `restore`.
    ///
    /// A restore failure is fatal for this attempt; it never triggers the
    /// legacy decoder.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve_player`], plus [`SnapshotError::Restore`].
    pub fn restore_player<T, R>(
        &self,
        owner: &str,
        blob: &str,
        restore: impl FnOnce(T) -> Result<R, RestoreError>,
    ) -> Result<R, SnapshotError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        let snapshot = self.resolve_player(owner, blob)?;
        Ok(restore(snapshot)?)
    }

    /// Best-effort [`Self::resolve_player`].
    pub fn load_player_or_none<T>(&self, owner: &str, blob: &str) -> Option<T>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        or_none("inventory", &owner, self.resolve_player(owner, blob))
    }

    /// Best-effort [`Self::resolve_file`].
    pub fn load_file_or_none<T>(&self, path: &Path) -> Option<T>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        or_none("file", &path.display(), self.resolve_file(path))
    }

    /// Best-effort [`Self::resolve_entry`].
    pub fn load_entry_or_none<T>(&self, id: &SnapshotId, blob: &str) -> Option<T>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        or_none("backpack", id, self.resolve_entry(id, blob))
    }

    /// Best-effort [`Self::restore_player`].
    pub fn restore_player_or_none<T, R>(
        &self,
        owner: &str,
        blob: &str,
        restore: impl FnOnce(T) -> Result<R, RestoreError>,
    ) -> Option<R>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        or_none("inventory", &owner, self.restore_player(owner, blob, restore))
    }
}

fn resolve<T>(
    kind: &'static str,
    subject: &dyn fmt::Display,
    modern: impl FnOnce() -> Result<T, SnapshotError>,
    legacy: impl FnOnce() -> Result<T, LegacyFormatError>,
) -> Result<T, SnapshotError> {
    match modern() {
        Err(err) if err.is_malformed_stream() => {
            tracing::warn!(
                kind,
                subject = %subject,
                error = %err,
                "can't load snapshot, trying legacy loader"
            );
            Ok(legacy()?)
        }
        outcome => outcome,
    }
}

fn or_none<T>(
    kind: &'static str,
    subject: &dyn fmt::Display,
    outcome: Result<T, SnapshotError>,
) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(kind, subject = %subject, error = %err, "failed to load snapshot");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::codec::legacy::NoLegacyFormat;
    use crate::codec::snapshot_codec::gzip;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::{Value, json};
    use std::cell::Cell;

    /// Legacy decoder that answers with a fixed payload and counts calls.
    #[derive(Default)]
    struct FakeLegacy {
        calls: Cell<usize>,
        fail: bool,
    }

    impl FakeLegacy {
        fn answer(&self) -> Result<Value, LegacyFormatError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(LegacyFormatError::new("not legacy either"))
            } else {
                Ok(json!({"legacy": true}))
            }
        }
    }

    impl LegacyDecoder<Value> for FakeLegacy {
        fn decode_str(&self, _raw: &str) -> Result<Value, LegacyFormatError> {
            self.answer()
        }

        fn decode_file(&self, _path: &Path) -> Result<Value, LegacyFormatError> {
            self.answer()
        }
    }

    fn resolver(fail: bool) -> SnapshotResolver<FakeLegacy> {
        SnapshotResolver::new(
            SnapshotCodec::default(),
            FakeLegacy {
                calls: Cell::new(0),
                fail,
            },
        )
    }

    fn legacy_blob() -> String {
        STANDARD.encode(gzip(b"slots:\n- {type: sword, qty: 1}\n"))
    }

    #[test]
    fn modern_blob_never_touches_legacy() {
        let resolver = resolver(false);
        let payload = json!({"slots": [{"type": "sword", "qty": 1}]});
        let Ok(blob) = resolver.codec().encode_string(&payload) else {
            panic!("encode failed");
        };

        let Ok(decoded) = resolver.resolve_player::<Value>("Steve", &blob) else {
            panic!("resolve failed");
        };
        assert_eq!(decoded, payload);
        assert_eq!(resolver.legacy().calls.get(), 0);
    }

    #[test]
    fn malformed_stream_falls_back_to_legacy() {
        let resolver = resolver(false);
        let Ok(decoded) = resolver.resolve_player::<Value>("Steve", &legacy_blob()) else {
            panic!("fallback should succeed");
        };
        assert_eq!(decoded, json!({"legacy": true}));
        assert_eq!(resolver.legacy().calls.get(), 1);
    }

    #[test]
    fn legacy_failure_reports_legacy_error() {
        let resolver = resolver(true);
        let result = resolver.resolve_player::<Value>("Steve", &legacy_blob());
        let Err(SnapshotError::Legacy(err)) = result else {
            panic!("expected legacy error, got {result:?}");
        };
        assert_eq!(err.message(), "not legacy either");
    }

    #[test]
    fn missing_root_does_not_fall_back() {
        let resolver = resolver(false);
        let blob = STANDARD.encode(gzip(br#"{"payload": {}}"#));
        let result = resolver.resolve_player::<Value>("Steve", &blob);
        assert!(matches!(result, Err(SnapshotError::MissingRoot(_))));
        assert_eq!(resolver.legacy().calls.get(), 0);
    }

    #[test]
    fn io_error_does_not_fall_back() {
        let resolver = resolver(false);
        let blob = STANDARD.encode(b"plain bytes, no gzip header");
        let result = resolver.resolve_player::<Value>("Steve", &blob);
        assert!(matches!(result, Err(SnapshotError::Io(_))));
        assert_eq!(resolver.legacy().calls.get(), 0);
    }

    #[test]
    fn file_flavor_falls_back() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let path = dir.path().join("old.bp");
        let Ok(()) = std::fs::write(&path, gzip(b"\x01\x02legacy\x03")) else {
            panic!("write failed");
        };

        let resolver = resolver(false);
        let Ok(decoded) = resolver.resolve_file::<Value>(&path) else {
            panic!("fallback should succeed");
        };
        assert_eq!(decoded, json!({"legacy": true}));
    }

    #[test]
    fn entry_flavor_falls_back() {
        let resolver = resolver(false);
        let id = SnapshotId::new();
        let decoded = resolver.load_entry_or_none::<Value>(&id, &legacy_blob());
        assert_eq!(decoded, Some(json!({"legacy": true})));
    }

    #[test]
    fn best_effort_load_swallows_errors() {
        let resolver = SnapshotResolver::new(SnapshotCodec::default(), NoLegacyFormat);
        let loaded = resolver.load_player_or_none::<Value>("Steve", &legacy_blob());
        assert!(loaded.is_none());

        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        assert!(
            resolver
                .load_file_or_none::<Value>(&dir.path().join("absent.inv"))
                .is_none()
        );
    }

    #[test]
    fn restore_failure_is_fatal_and_skips_legacy() {
        let resolver = resolver(false);
        let Ok(blob) = resolver.codec().encode_string(&json!({"slots": []})) else {
            panic!("encode failed");
        };

        let result = resolver.restore_player::<Value, ()>("Steve", &blob, |_| {
            Err(RestoreError::new("player offline"))
        });
        assert!(matches!(result, Err(SnapshotError::Restore(_))));
        assert_eq!(resolver.legacy().calls.get(), 0);

        let restored = resolver.restore_player_or_none::<Value, usize>("Steve", &blob, |v| {
            Ok(v["slots"].as_array().map_or(0, Vec::len))
        });
        assert_eq!(restored, Some(0));
    }
}
