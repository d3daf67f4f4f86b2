//! # rpg-inventory-store
//!
//! Persistence for per-player inventories and backpacks.
//!
//! Snapshots are opaque `serde` payloads. They are stored either as gzip
//! files or as base64 strings in a MySQL table, and read back through a
//! resolver that falls back to a host-supplied legacy decoder when a blob
//! predates the current document format.
//!
//! ## Architecture
//!
//! ```text
//! Host (login, save, backpack load)
//!     │
//!     ├── PlayerStore (service/)
//!     │
//!     ├── SnapshotResolver ── LegacyDecoder (host)
//!     ├── SnapshotCodec (codec/)
//!     │
//!     ├── snapshot files (atomic temp + rename)
//!     └── StoreClient (persistence/) ── one MySQL connection
//!                │
//!                └── EventBus ── StoreEvent::Disabled → host
//! ```

pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
