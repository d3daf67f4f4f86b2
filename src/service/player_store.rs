//! Player store: saves and loads inventories and backpacks.
//!
//! Composes the [`SnapshotResolver`] with either snapshot files or the
//! relational store. Files live at `<root>/inventories/<id>.inv` and
//! `<root>/backpacks/<id>.bp`; rows hold the base64 string form.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{LegacyDecoder, NoLegacyFormat, SnapshotResolver};
use crate::domain::{SnapshotId, Table};
use crate::error::{PersistenceError, SnapshotError};
use crate::persistence::{Connector, MySqlConnector, StoreClient};

/// Where snapshots are kept.
#[derive(Debug)]
pub enum Backend<C: Connector = MySqlConnector> {
    /// One gzip file per snapshot under `root`.
    Files {
        /// Snapshot root directory.
        root: PathBuf,
    },
    /// One row per snapshot in the relational store.
    Relational(Arc<StoreClient<C>>),
}

/// Save/load entry point for inventories and backpacks.
#[derive(Debug)]
pub struct PlayerStore<C: Connector = MySqlConnector, L = NoLegacyFormat> {
    backend: Backend<C>,
    resolver: SnapshotResolver<L>,
}

impl<C: Connector, L> PlayerStore<C, L> {
    /// Creates a store over `backend`.
    #[must_use]
    pub const fn new(backend: Backend<C>, resolver: SnapshotResolver<L>) -> Self {
        Self { backend, resolver }
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &Backend<C> {
        &self.backend
    }

    /// Returns the resolver.
    #[must_use]
    pub const fn resolver(&self) -> &SnapshotResolver<L> {
        &self.resolver
    }

    /// Saves a player's inventory, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if encoding, the file write, or the
    /// store fails.
    pub async fn save_inventory<T: Serialize + ?Sized>(
        &self,
        id: SnapshotId,
        snapshot: &T,
    ) -> Result<(), PersistenceError> {
        self.save(Table::Inventory, id, snapshot).await
    }

    /// Saves a backpack, replacing any previous one.
    ///
    /// # Errors
    ///
    /// As [`Self::save_inventory`].
    pub async fn save_backpack<T: Serialize + ?Sized>(
        &self,
        id: SnapshotId,
        snapshot: &T,
    ) -> Result<(), PersistenceError> {
        self.save(Table::Backpack, id, snapshot).await
    }

    /// Loads a player's inventory, `None` if none was saved.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the store is unavailable or the
    /// snapshot cannot be decoded by either decoder.
    pub async fn load_inventory<T>(&self, id: SnapshotId) -> Result<Option<T>, PersistenceError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        self.load(Table::Inventory, id).await
    }

    /// Login-time variant of [`Self::load_inventory`]: any failure is
    /// logged and reported as `None`.
    pub async fn load_inventory_or_none<T>(&self, id: SnapshotId) -> Option<T>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        match self.load(Table::Inventory, id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(%id, error = %err, "failed to load inventory");
                None
            }
        }
    }

    /// Loads a backpack, `None` if none was saved.
    ///
    /// # Errors
    ///
    /// As [`Self::load_inventory`].
    pub async fn load_backpack<T>(&self, id: SnapshotId) -> Result<Option<T>, PersistenceError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        self.load(Table::Backpack, id).await
    }

    /// Loads every saved backpack. Entries that cannot be decoded are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backpack directory cannot be
    /// listed or the store is unavailable.
    pub async fn load_all_backpacks<T>(&self) -> Result<HashMap<SnapshotId, T>, PersistenceError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        match &self.backend {
            Backend::Files { root } => self.load_backpack_files(&root.join(Table::Backpack.dir())),
            Backend::Relational(client) => {
                let rows = client.read_all(Table::Backpack).await?;
                Ok(rows
                    .into_iter()
                    .filter_map(|(id, blob)| {
                        self.resolver
                            .load_entry_or_none(&id, &blob)
                            .map(|backpack| (id, backpack))
                    })
                    .collect())
            }
        }
    }

    /// Deletes a player's inventory. Deleting a missing one succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the file cannot be removed or the
    /// store fails.
    pub async fn delete_inventory(&self, id: SnapshotId) -> Result<(), PersistenceError> {
        self.delete(Table::Inventory, id).await
    }

    /// Deletes a backpack. Deleting a missing one succeeds.
    ///
    /// # Errors
    ///
    /// As [`Self::delete_inventory`].
    pub async fn delete_backpack(&self, id: SnapshotId) -> Result<(), PersistenceError> {
        self.delete(Table::Backpack, id).await
    }

    async fn save<T: Serialize + ?Sized>(
        &self,
        table: Table,
        id: SnapshotId,
        snapshot: &T,
    ) -> Result<(), PersistenceError> {
        match &self.backend {
            Backend::Files { root } => {
                let path = snapshot_path(root, table, id);
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir).map_err(SnapshotError::from)?;
                }
                self.resolver.codec().save_file(snapshot, &path)?;
            }
            Backend::Relational(client) => {
                let blob = self.resolver.codec().encode_string(snapshot)?;
                if client.exists(table, id).await? {
                    client.update(table, id, &blob).await?;
                } else {
                    client.insert(table, id, &blob).await?;
                }
            }
        }
        Ok(())
    }

    async fn load<T>(&self, table: Table, id: SnapshotId) -> Result<Option<T>, PersistenceError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        match &self.backend {
            Backend::Files { root } => {
                match self.resolver.resolve_file(&snapshot_path(root, table, id)) {
                    Ok(snapshot) => Ok(Some(snapshot)),
                    Err(SnapshotError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                        Ok(None)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Backend::Relational(client) => {
                let Some(blob) = client.read_one(table, id).await? else {
                    return Ok(None);
                };
                let snapshot = match table {
                    Table::Inventory => self.resolver.resolve_player(&id.to_string(), &blob)?,
                    Table::Backpack => self.resolver.resolve_entry(&id, &blob)?,
                };
                Ok(Some(snapshot))
            }
        }
    }

    async fn delete(&self, table: Table, id: SnapshotId) -> Result<(), PersistenceError> {
        match &self.backend {
            Backend::Files { root } => match fs::remove_file(snapshot_path(root, table, id)) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(SnapshotError::from(err).into()),
            },
            Backend::Relational(client) => Ok(client.delete(table, id).await?),
        }
    }

    fn load_backpack_files<T>(
        &self,
        dir: &Path,
    ) -> Result<HashMap<SnapshotId, T>, PersistenceError>
    where
        T: DeserializeOwned,
        L: LegacyDecoder<T>,
    {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(SnapshotError::from(err).into()),
        };

        let mut backpacks = HashMap::new();
        for entry in entries {
            let path = entry.map_err(SnapshotError::from)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(Table::Backpack.extension()) {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<SnapshotId>().ok())
            else {
                tracing::warn!(
                    path = %path.display(),
                    "skipping backpack file with unexpected name"
                );
                continue;
            };
            if let Some(backpack) = self.resolver.load_file_or_none(&path) {
                backpacks.insert(id, backpack);
            }
        }
        Ok(backpacks)
    }
}

fn snapshot_path(root: &Path, table: Table, id: SnapshotId) -> PathBuf {
    root.join(table.dir())
        .join(format!("{id}.{}", table.extension()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::codec::SnapshotCodec;
    use crate::domain::EventBus;
    use crate::error::StoreError;
    use crate::persistence::memory::MemoryConnector;
    use serde_json::{Value, json};

    fn file_store(root: &Path) -> PlayerStore<MemoryConnector> {
        PlayerStore::new(
            Backend::Files {
                root: root.to_path_buf(),
            },
            SnapshotResolver::default(),
        )
    }

    async fn relational_store(server: &MemoryConnector) -> PlayerStore<MemoryConnector> {
        let client = StoreClient::new(server.clone(), EventBus::new(8));
        assert!(client.start().await);
        PlayerStore::new(
            Backend::Relational(Arc::new(client)),
            SnapshotResolver::new(SnapshotCodec::default(), NoLegacyFormat),
        )
    }

    fn sword() -> Value {
        json!({"slots": [{"type": "sword", "qty": 1}]})
    }

    #[tokio::test]
    async fn file_inventory_round_trip() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let store = file_store(dir.path());
        let id = SnapshotId::new();

        let Ok(()) = store.save_inventory(id, &sword()).await else {
            panic!("save failed");
        };
        assert!(dir.path().join("inventories").join(format!("{id}.inv")).exists());

        let Ok(Some(loaded)) = store.load_inventory::<Value>(id).await else {
            panic!("load failed");
        };
        assert_eq!(loaded, sword());
    }

    #[tokio::test]
    async fn file_missing_snapshot_is_none() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let store = file_store(dir.path());
        assert!(matches!(
            store.load_backpack::<Value>(SnapshotId::new()).await,
            Ok(None)
        ));
        assert!(store.delete_backpack(SnapshotId::new()).await.is_ok());
    }

    #[tokio::test]
    async fn file_removed_after_save_is_none_and_unreadable_is_error() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let store = file_store(dir.path());
        let gone = SnapshotId::new();
        let Ok(()) = store.save_backpack(gone, &sword()).await else {
            panic!("save failed");
        };
        let Ok(()) = fs::remove_file(snapshot_path(dir.path(), Table::Backpack, gone)) else {
            panic!("remove failed");
        };
        assert!(matches!(store.load_backpack::<Value>(gone).await, Ok(None)));

        let blocked = SnapshotId::new();
        let Ok(()) = fs::create_dir_all(snapshot_path(dir.path(), Table::Backpack, blocked)) else {
            panic!("create_dir_all failed");
        };
        assert!(matches!(
            store.load_backpack::<Value>(blocked).await,
            Err(PersistenceError::Snapshot(SnapshotError::Io(_)))
        ));
    }

    #[tokio::test]
    async fn file_load_all_skips_corrupt_and_foreign_files() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let store = file_store(dir.path());
        let good = SnapshotId::new();
        let Ok(()) = store.save_backpack(good, &sword()).await else {
            panic!("save failed");
        };

        let backpacks = dir.path().join("backpacks");
        let Ok(()) = fs::write(backpacks.join(format!("{}.bp", SnapshotId::new())), b"junk") else {
            panic!("write failed");
        };
        let Ok(()) = fs::write(backpacks.join("readme.txt"), b"hello") else {
            panic!("write failed");
        };
        let Ok(()) = fs::write(backpacks.join("not-a-uuid.bp"), b"junk") else {
            panic!("write failed");
        };

        let Ok(all) = store.load_all_backpacks::<Value>().await else {
            panic!("listing failed");
        };
        assert_eq!(all.len(), 1);
        assert_eq!(all.get(&good), Some(&sword()));
    }

    #[tokio::test]
    async fn file_load_all_without_directory_is_empty() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let store = file_store(dir.path());
        let Ok(all) = store.load_all_backpacks::<Value>().await else {
            panic!("listing failed");
        };
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn relational_save_inserts_then_updates() {
        let server = MemoryConnector::new();
        let store = relational_store(&server).await;
        let id = SnapshotId::new();

        let Ok(()) = store.save_inventory(id, &json!({"slots": []})).await else {
            panic!("first save failed");
        };
        let Ok(()) = store.save_inventory(id, &sword()).await else {
            panic!("second save failed");
        };
        assert_eq!(server.row_count(Table::Inventory), 1);

        let Ok(Some(loaded)) = store.load_inventory::<Value>(id).await else {
            panic!("load failed");
        };
        assert_eq!(loaded, sword());
    }

    #[tokio::test]
    async fn relational_load_all_backpacks() {
        let server = MemoryConnector::new();
        let store = relational_store(&server).await;
        let a = SnapshotId::new();
        let b = SnapshotId::new();
        let Ok(()) = store.save_backpack(a, &sword()).await else {
            panic!("save failed");
        };
        let Ok(()) = store.save_backpack(b, &json!({"slots": []})).await else {
            panic!("save failed");
        };

        let Ok(all) = store.load_all_backpacks::<Value>().await else {
            panic!("listing failed");
        };
        assert_eq!(all.len(), 2);
        assert_eq!(all.get(&a), Some(&sword()));

        let Ok(()) = store.delete_backpack(a).await else {
            panic!("delete failed");
        };
        assert!(matches!(store.load_backpack::<Value>(a).await, Ok(None)));
    }

    #[tokio::test]
    async fn unavailable_store_is_an_error_but_login_load_is_none() {
        let server = MemoryConnector::new();
        let store = relational_store(&server).await;
        let id = SnapshotId::new();
        let Ok(()) = store.save_inventory(id, &sword()).await else {
            panic!("save failed");
        };

        server.set_reachable(false);
        assert!(matches!(
            store.load_inventory::<Value>(id).await,
            Err(PersistenceError::Store(StoreError::Unavailable))
        ));
        assert!(store.load_inventory_or_none::<Value>(id).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_row_is_none_at_login() {
        let server = MemoryConnector::new();
        let store = relational_store(&server).await;
        let id = SnapshotId::new();
        let Backend::Relational(client) = store.backend() else {
            panic!("expected relational backend");
        };
        let Ok(()) = client.insert(Table::Inventory, id, "bm90IGd6aXA=").await else {
            panic!("insert failed");
        };

        assert!(store.load_inventory_or_none::<Value>(id).await.is_none());
    }
}
