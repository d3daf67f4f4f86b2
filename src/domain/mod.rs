//! Domain layer: identifiers, tables and store lifecycle events.
//!
//! Inventories and backpacks themselves are opaque payloads owned by the
//! host; this crate only knows how to key them and where they live.

pub mod event_bus;
pub mod snapshot_id;
pub mod store_event;
pub mod table;

pub use event_bus::EventBus;
pub use snapshot_id::SnapshotId;
pub use store_event::StoreEvent;
pub use table::Table;
