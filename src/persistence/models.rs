//! Statements understood by a store connection and their responses.

use std::collections::HashMap;

use crate::domain::{SnapshotId, Table};
use crate::error::StoreError;

/// One unit of work executed on a connection.
///
/// Blobs are borrowed so a retried statement reuses the caller's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement<'a> {
    /// Does the table exist in the current schema?
    TableExists(Table),
    /// Create the table with the fixed column set.
    CreateTable(Table),
    /// Is there a row for `id`?
    RowExists {
        /// Target table.
        table: Table,
        /// Row key.
        id: SnapshotId,
    },
    /// Insert a new row.
    Insert {
        /// Target table.
        table: Table,
        /// Row key.
        id: SnapshotId,
        /// String-form blob.
        data: &'a str,
    },
    /// Replace the blob of an existing row.
    Update {
        /// Target table.
        table: Table,
        /// Row key.
        id: SnapshotId,
        /// String-form blob.
        data: &'a str,
    },
    /// Read the blob for `id`.
    Fetch {
        /// Target table.
        table: Table,
        /// Row key.
        id: SnapshotId,
    },
    /// Read every row of a table.
    FetchAll(Table),
    /// Delete the row for `id`.
    Delete {
        /// Target table.
        table: Table,
        /// Row key.
        id: SnapshotId,
    },
}

impl Statement<'_> {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TableExists(_) => "table_exists",
            Self::CreateTable(_) => "create_table",
            Self::RowExists { .. } => "row_exists",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Fetch { .. } => "fetch",
            Self::FetchAll(_) => "fetch_all",
            Self::Delete { .. } => "delete",
        }
    }

    /// Table the statement targets.
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::TableExists(table) | Self::CreateTable(table) | Self::FetchAll(table) => *table,
            Self::RowExists { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Fetch { table, .. }
            | Self::Delete { table, .. } => *table,
        }
    }
}

/// Result of executing a [`Statement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Statement completed without a result set.
    Done,
    /// Answer to `TableExists` or `RowExists`.
    Exists(bool),
    /// Answer to `Fetch`.
    Row(Option<String>),
    /// Answer to `FetchAll`.
    Rows {
        /// Readable rows keyed by id.
        rows: HashMap<SnapshotId, String>,
        /// Rows dropped for an unparsable key or a non-UTF-8 blob.
        skipped: usize,
    },
}

impl Response {
    /// Builds a [`Response::Rows`] from raw `(uuid, data)` pairs, skipping
    /// rows that cannot be keyed or read as text.
    #[must_use]
    pub fn from_raw_rows<I>(table: Table, raw: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut rows = HashMap::new();
        let mut skipped = 0;
        for (uuid, data) in raw {
            let Ok(id) = uuid.parse::<SnapshotId>() else {
                tracing::debug!(%table, uuid, "skipping row with malformed uuid");
                skipped += 1;
                continue;
            };
            match String::from_utf8(data) {
                Ok(blob) => {
                    rows.insert(id, blob);
                }
                Err(_) => {
                    tracing::debug!(%table, %id, "skipping row with non-utf8 blob");
                    skipped += 1;
                }
            }
        }
        Self::Rows { rows, skipped }
    }

    /// Unwraps an [`Response::Exists`].
    ///
    /// # Errors
    ///
    /// [`StoreError::UnexpectedResponse`] for any other variant.
    pub fn into_exists(self, statement: &'static str) -> Result<bool, StoreError> {
        match self {
            Self::Exists(found) => Ok(found),
            _ => Err(StoreError::UnexpectedResponse(statement)),
        }
    }

    /// Unwraps a [`Response::Row`].
    ///
    /// # Errors
    ///
    /// [`StoreError::UnexpectedResponse`] for any other variant.
    pub fn into_row(self, statement: &'static str) -> Result<Option<String>, StoreError> {
        match self {
            Self::Row(row) => Ok(row),
            _ => Err(StoreError::UnexpectedResponse(statement)),
        }
    }

    /// Unwraps a [`Response::Rows`] into the rows and the skipped count.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnexpectedResponse`] for any other variant.
    pub fn into_rows(
        self,
        statement: &'static str,
    ) -> Result<(HashMap<SnapshotId, String>, usize), StoreError> {
        match self {
            Self::Rows { rows, skipped } => Ok((rows, skipped)),
            _ => Err(StoreError::UnexpectedResponse(statement)),
        }
    }

    /// Checks for a [`Response::Done`].
    ///
    /// # Errors
    ///
    /// [`StoreError::UnexpectedResponse`] for any other variant.
    pub fn into_done(self, statement: &'static str) -> Result<(), StoreError> {
        match self {
            Self::Done => Ok(()),
            _ => Err(StoreError::UnexpectedResponse(statement)),
        }
    }
}

/// Connection state reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle is held.
    Disconnected,
    /// A handle is held (it may still turn out to be stale).
    Connected,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn statement_reports_table_and_name() {
        let id = SnapshotId::new();
        let stmt = Statement::Insert {
            table: Table::Backpack,
            id,
            data: "blob",
        };
        assert_eq!(stmt.name(), "insert");
        assert_eq!(stmt.table(), Table::Backpack);
        assert_eq!(Statement::FetchAll(Table::Inventory).table(), Table::Inventory);
    }

    #[test]
    fn mismatched_response_is_an_error() {
        assert!(matches!(
            Response::Done.into_row("fetch"),
            Err(StoreError::UnexpectedResponse("fetch"))
        ));
        assert!(matches!(Response::Exists(true).into_exists("x"), Ok(true)));
    }

    #[test]
    fn raw_rows_skip_and_count_bad_entries() {
        let good = SnapshotId::new();
        let raw = vec![
            (good.to_string(), b"H4sI".to_vec()),
            ("not-a-uuid".to_string(), b"H4sI".to_vec()),
            (SnapshotId::new().to_string(), vec![0xff, 0xfe]),
        ];
        let Ok((rows, skipped)) =
            Response::from_raw_rows(Table::Inventory, raw).into_rows("fetch_all")
        else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(&good).map(String::as_str), Some("H4sI"));
        assert_eq!(skipped, 2);
    }
}
