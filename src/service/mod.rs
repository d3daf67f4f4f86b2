//! Service layer: inventory and backpack persistence on top of the codec
//! and the storage backends.

pub mod player_store;

pub use player_store::{Backend, PlayerStore};
