//! In-memory store backend with fault injection.
//!
//! Behaves like the MySQL backend for the statements the client issues,
//! and lets tests make the server unreachable, read-only, drop live
//! connections, or fail the next few statements.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::connection::{Connector, StoreConnection};
use super::models::{Response, Statement};
use crate::domain::Table;
use crate::error::StoreError;

/// Rows are keyed by the raw `uuid` column text.
type Tables = HashMap<Table, HashMap<String, String>>;

#[derive(Debug, Default)]
struct MemoryState {
    tables: Mutex<Tables>,
    unreachable: AtomicBool,
    read_only: AtomicBool,
    generation: AtomicUsize,
    pending_faults: AtomicUsize,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryState {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connector for the in-memory server. Clones share the same server.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

impl MemoryConnector {
    /// Creates an empty, reachable server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the server accept or refuse connections and statements.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Marks every connection as read-only (not usable for the client).
    pub fn set_read_only(&self, read_only: bool) {
        self.state.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Invalidates every open connection, as after a server restart.
    pub fn drop_connections(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Fails the next `count` statements on any connection.
    pub fn fail_next(&self, count: usize) {
        self.state.pending_faults.store(count, Ordering::SeqCst);
    }

    /// Injected faults not yet consumed.
    #[must_use]
    pub fn pending_faults(&self) -> usize {
        self.state.pending_faults.load(Ordering::SeqCst)
    }

    /// Connection attempts so far, successful or not.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Connections closed so far.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Returns `true` if `table` has been created.
    #[must_use]
    pub fn has_table(&self, table: Table) -> bool {
        self.state.tables().contains_key(&table)
    }

    /// Writes a row directly under a raw key, creating the table if needed.
    pub fn insert_raw(&self, table: Table, uuid: &str, data: &str) {
        self.state
            .tables()
            .entry(table)
            .or_default()
            .insert(uuid.to_string(), data.to_string());
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: Table) -> usize {
        self.state.tables().get(&table).map_or(0, HashMap::len)
    }
}

impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, StoreError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connect("connection refused".to_string()));
        }
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            generation: self.state.generation.load(Ordering::SeqCst),
        })
    }
}

/// Connection to the in-memory server.
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<MemoryState>,
    generation: usize,
}

impl MemoryConnection {
    fn is_live(&self) -> bool {
        !self.state.unreachable.load(Ordering::SeqCst)
            && self.generation == self.state.generation.load(Ordering::SeqCst)
    }

    fn take_fault(&self) -> bool {
        self.state
            .pending_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl StoreConnection for MemoryConnection {
    async fn is_usable(&mut self) -> bool {
        self.is_live() && !self.state.read_only.load(Ordering::SeqCst)
    }

    async fn close(self) -> Result<(), StoreError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement<'_>) -> Result<Response, StoreError> {
        if !self.is_live() {
            return Err(StoreError::Query("communications link failure".to_string()));
        }
        if self.take_fault() {
            return Err(StoreError::Query(format!("injected fault in {}", statement.name())));
        }

        let mut tables = self.state.tables();
        let missing = |table: Table| StoreError::Query(format!("table '{table}' doesn't exist"));

        let response = match *statement {
            Statement::TableExists(table) => Response::Exists(tables.contains_key(&table)),
            Statement::CreateTable(table) => {
                tables.entry(table).or_default();
                Response::Done
            }
            Statement::RowExists { table, id } => {
                let rows = tables.get(&table).ok_or_else(|| missing(table))?;
                Response::Exists(rows.contains_key(&id.to_string()))
            }
            Statement::Insert { table, id, data } => {
                let rows = tables.get_mut(&table).ok_or_else(|| missing(table))?;
                let key = id.to_string();
                if rows.contains_key(&key) {
                    return Err(StoreError::Query(format!("duplicate entry '{id}'")));
                }
                rows.insert(key, data.to_string());
                Response::Done
            }
            Statement::Update { table, id, data } => {
                let rows = tables.get_mut(&table).ok_or_else(|| missing(table))?;
                if let Some(row) = rows.get_mut(&id.to_string()) {
                    *row = data.to_string();
                }
                Response::Done
            }
            Statement::Fetch { table, id } => {
                let rows = tables.get(&table).ok_or_else(|| missing(table))?;
                Response::Row(rows.get(&id.to_string()).cloned())
            }
            Statement::FetchAll(table) => {
                let rows = tables.get(&table).ok_or_else(|| missing(table))?;
                let raw = rows
                    .iter()
                    .map(|(uuid, data)| (uuid.clone(), data.clone().into_bytes()));
                Response::from_raw_rows(table, raw)
            }
            Statement::Delete { table, id } => {
                let rows = tables.get_mut(&table).ok_or_else(|| missing(table))?;
                rows.remove(&id.to_string());
                Response::Done
            }
        };
        Ok(response)
    }
}
