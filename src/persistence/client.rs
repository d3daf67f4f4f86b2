//! Self-healing relational store client.
//!
//! [`StoreClient`] owns exactly one connection. A single
//! [`tokio::sync::Mutex`] guards both the connection slot and every
//! statement, so reconnects and statements never interleave. Each
//! statement that faults triggers one reconnect check and is then retried
//! once; a second fault is returned to the caller.
//!
//! ```text
//!   Disconnected ──connect ok──▶ Connected ──stop──▶ Disconnected
//!        ▲                            │
//!        └──────connect failed────────┘ (publishes Disabled)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::connection::{Connector, StoreConnection};
use super::models::{ConnectionState, Response, Statement};
use super::mysql::MySqlConnector;
use crate::config::StoreConfig;
use crate::domain::{EventBus, SnapshotId, StoreEvent, Table};
use crate::error::StoreError;

/// Retries allowed after the first failed attempt of a statement.
const MAX_RETRIES: usize = 1;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// CRUD client for the `inventory` and `backpack` tables.
///
/// Errors are typed: a missing row is `Ok(None)` / `Ok(false)`, an
/// unreachable store is [`StoreError::Unavailable`]. Callers that only
/// want the neutral value can use `unwrap_or_default()`.
pub struct StoreClient<C: Connector> {
    connector: C,
    conn: Mutex<Option<C::Conn>>,
    events: EventBus,
    connect_timeout: Duration,
    statement_timeout: Duration,
}

impl<C: Connector> fmt::Debug for StoreClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClient")
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish_non_exhaustive()
    }
}

impl StoreClient<MySqlConnector> {
    /// Creates a MySQL client from configuration. Does not connect.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            MySqlConnector::from_config(config),
            EventBus::new(config.event_capacity),
        )
        .with_timeouts(config.connect_timeout(), config.statement_timeout())
    }
}

impl<C: Connector> StoreClient<C> {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(connector: C, events: EventBus) -> Self {
        Self {
            connector,
            conn: Mutex::new(None),
            events,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Overrides the connect and per-statement time budgets.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, statement: Duration) -> Self {
        self.connect_timeout = connect;
        self.statement_timeout = statement;
        self
    }

    /// Returns the lifecycle event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the connector.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns whether a connection handle is currently held.
    pub async fn state(&self) -> ConnectionState {
        if self.conn.lock().await.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Connects and bootstraps the schema.
    ///
    /// Returns `false` if the store could not be reached; a
    /// [`StoreEvent::Disabled`] has been published in that case.
    pub async fn start(&self) -> bool {
        if self.connect().await {
            tracing::info!("relational store connection succeeded");
            self.bootstrap_schema().await;
            true
        } else {
            tracing::warn!("relational store connection failed");
            false
        }
    }

    /// Replaces the current handle with a fresh connection.
    ///
    /// Any existing handle is closed first. On failure the handle stays
    /// cleared and [`StoreEvent::Disabled`] is published.
    pub async fn connect(&self) -> bool {
        let mut slot = self.conn.lock().await;
        self.connect_locked(&mut slot).await
    }

    /// Keeps a usable connection, reconnecting only if needed.
    ///
    /// Returns `true` without any close/open cycle if the current handle is
    /// open and writable. Concurrent callers wait for an in-flight attempt
    /// and then see its result.
    pub async fn reconnect(&self) -> bool {
        let mut slot = self.conn.lock().await;
        self.reconnect_locked(&mut slot).await
    }

    /// Closes the connection if one is held. Idempotent.
    pub async fn stop(&self) {
        let mut slot = self.conn.lock().await;
        let Some(conn) = slot.take() else {
            return;
        };
        if let Err(err) = self.close_timed(conn).await {
            tracing::warn!(error = %err, "failed to close relational store connection");
        }
        let _ = self.events.publish(StoreEvent::Disconnected {
            timestamp: Utc::now(),
        });
        tracing::info!("relational store connection closed");
    }

    /// Creates any missing table. Failures are logged, never returned.
    pub async fn bootstrap_schema(&self) {
        for table in Table::ALL {
            if let Err(err) = self.ensure_table(table).await {
                tracing::warn!(%table, error = %err, "failed to check table");
            }
        }
    }

    /// Returns `true` if a row exists for `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the store could not be reached, or
    /// the statement's error if it failed twice.
    pub async fn exists(&self, table: Table, id: SnapshotId) -> Result<bool, StoreError> {
        let statement = Statement::RowExists { table, id };
        self.run(&statement).await?.into_exists(statement.name())
    }

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// As [`Self::exists`].
    pub async fn insert(&self, table: Table, id: SnapshotId, data: &str) -> Result<(), StoreError> {
        let statement = Statement::Insert { table, id, data };
        self.run(&statement).await?.into_done(statement.name())
    }

    /// Replaces the blob of the row for `id`.
    ///
    /// # Errors
    ///
    /// As [`Self::exists`].
    pub async fn update(&self, table: Table, id: SnapshotId, data: &str) -> Result<(), StoreError> {
        let statement = Statement::Update { table, id, data };
        self.run(&statement).await?.into_done(statement.name())
    }

    /// Reads the blob for `id`, `None` if there is no such row.
    ///
    /// # Errors
    ///
    /// As [`Self::exists`].
    pub async fn read_one(
        &self,
        table: Table,
        id: SnapshotId,
    ) -> Result<Option<String>, StoreError> {
        let statement = Statement::Fetch { table, id };
        self.run(&statement).await?.into_row(statement.name())
    }

    /// Reads every row of `table`, keyed by id.
    ///
    /// Rows with a malformed key or a non-UTF-8 blob are left out and
    /// counted in a single warning.
    ///
    /// # Errors
    ///
    /// As [`Self::exists`].
    pub async fn read_all(&self, table: Table) -> Result<HashMap<SnapshotId, String>, StoreError> {
        let statement = Statement::FetchAll(table);
        let (rows, skipped) = self.run(&statement).await?.into_rows(statement.name())?;
        if skipped > 0 {
            tracing::warn!(%table, skipped, kept = rows.len(), "skipped unreadable rows");
        }
        Ok(rows)
    }

    /// Deletes the row for `id`. Deleting a missing row succeeds.
    ///
    /// # Errors
    ///
    /// As [`Self::exists`].
    pub async fn delete(&self, table: Table, id: SnapshotId) -> Result<(), StoreError> {
        let statement = Statement::Delete { table, id };
        self.run(&statement).await?.into_done(statement.name())
    }

    async fn ensure_table(&self, table: Table) -> Result<(), StoreError> {
        let probe = Statement::TableExists(table);
        if self.run(&probe).await?.into_exists(probe.name())? {
            return Ok(());
        }
        let create = Statement::CreateTable(table);
        self.run(&create).await?.into_done(create.name())?;
        tracing::info!(%table, "created table");
        Ok(())
    }

    /// Runs one statement with the one-retry policy.
    async fn run(&self, statement: &Statement<'_>) -> Result<Response, StoreError> {
        let mut slot = self.conn.lock().await;
        let mut retries = 0;
        loop {
            let err = match slot.as_mut() {
                Some(conn) => match timeout(self.statement_timeout, conn.execute(statement)).await {
                    Ok(Ok(response)) => return Ok(response),
                    Ok(Err(err)) => err,
                    Err(_) => StoreError::Timeout(self.statement_timeout),
                },
                None => StoreError::Unavailable,
            };
            tracing::warn!(
                statement = statement.name(),
                table = %statement.table(),
                attempt = retries + 1,
                error = %err,
                "store statement failed"
            );
            if retries >= MAX_RETRIES {
                return Err(err);
            }
            retries += 1;
            if !self.reconnect_locked(&mut slot).await {
                return Err(StoreError::Unavailable);
            }
        }
    }

    async fn reconnect_locked(&self, slot: &mut Option<C::Conn>) -> bool {
        if let Some(conn) = slot.as_mut()
            && matches!(
                timeout(self.connect_timeout, conn.is_usable()).await,
                Ok(true)
            )
        {
            return true;
        }
        self.connect_locked(slot).await
    }

    async fn connect_locked(&self, slot: &mut Option<C::Conn>) -> bool {
        if let Some(old) = slot.take()
            && let Err(err) = self.close_timed(old).await
        {
            tracing::warn!(error = %err, "failed to close stale connection");
        }

        tracing::info!("relational store connecting");
        let err = match timeout(self.connect_timeout, self.connector.connect()).await {
            Ok(Ok(conn)) => {
                *slot = Some(conn);
                let _ = self.events.publish(StoreEvent::Connected {
                    timestamp: Utc::now(),
                });
                return true;
            }
            Ok(Err(err)) => err,
            Err(_) => StoreError::Timeout(self.connect_timeout),
        };

        tracing::warn!(error = %err, "relational store connection error");
        let delivered = self.events.publish(StoreEvent::Disabled {
            reason: err.to_string(),
            timestamp: Utc::now(),
        });
        if delivered == 0 {
            tracing::warn!("relational store disabled with no subscriber listening");
        }
        false
    }

    async fn close_timed(&self, conn: C::Conn) -> Result<(), StoreError> {
        match timeout(self.connect_timeout, conn.close()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StoreError::Timeout(self.connect_timeout)),
        }
    }
}
