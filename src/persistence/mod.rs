//! Persistence layer: the self-healing relational store client.
//!
//! [`StoreClient`] drives any [`Connector`]; [`MySqlConnector`] is the
//! production backend built on a single `sqlx::MySqlConnection`.

pub mod client;
pub mod connection;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod mysql;

pub use client::StoreClient;
pub use connection::{Connector, StoreConnection};
pub use models::{ConnectionState, Response, Statement};
pub use mysql::MySqlConnector;
