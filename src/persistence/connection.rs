//! Backend seam for the store client.
//!
//! [`Connector`] opens connections; [`StoreConnection`] runs
//! [`Statement`]s on one of them. The client owns the retry and reconnect
//! policy, backends only report faults.

use std::future::Future;

use super::models::{Response, Statement};
use crate::error::StoreError;

/// Opens new connections with fixed credentials.
pub trait Connector: Send + Sync {
    /// Connection type produced.
    type Conn: StoreConnection;

    /// Opens a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if the server cannot be reached or
    /// refuses the credentials.
    fn connect(&self) -> impl Future<Output = Result<Self::Conn, StoreError>> + Send;
}

/// A single open connection.
pub trait StoreConnection: Send + 'static {
    /// Returns `true` if the connection is open and writable.
    fn is_usable(&mut self) -> impl Future<Output = bool> + Send;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the server did not acknowledge the
    /// close; the connection is gone either way.
    fn close(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Executes one statement.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on any driver or server fault.
    fn execute(
        &mut self,
        statement: &Statement<'_>,
    ) -> impl Future<Output = Result<Response, StoreError>> + Send;
}
