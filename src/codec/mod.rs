//! Snapshot codec: JSON document, gzip, base64, plus legacy fallback.

pub mod legacy;
pub mod resolver;
pub mod snapshot_codec;

pub use legacy::{LegacyDecoder, NoLegacyFormat};
pub use resolver::SnapshotResolver;
pub use snapshot_codec::{ROOT_TAG, SnapshotCodec};
