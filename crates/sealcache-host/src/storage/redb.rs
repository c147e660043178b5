//! Redb-backed durable key store.
//!
//! Uses redb's ACID transactions, so a key is either fully written or absent
//! after a crash.

use std::{fmt, path::Path, sync::Arc};

use redb::{Database, ReadableTableMetadata, TableDefinition};
use sealcache_core::{EndpointId, SecureKeyStore, StoreError};
use sealcache_crypto::{KEY_SIZE, KeyMaterial};

/// Table: keys
/// Key: endpoint id bytes (1..=12, no padding)
/// Value: raw key bytes [32 bytes]
const KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keys");

fn io(err: impl fmt::Display) -> StoreError {
    StoreError::Io(err.to_string())
}

/// Durable key store backed by redb.
///
/// Thread-safe through redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbKeyStore {
    db: Arc<Database>,
}

impl RedbKeyStore {
    /// Open or create a database at `path`, creating the key table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(KEYS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(KEYS).map_err(io)?;
        table.len().map_err(io)
    }

    /// True if no keys are stored.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl fmt::Debug for RedbKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbKeyStore").finish_non_exhaustive()
    }
}

impl SecureKeyStore for RedbKeyStore {
    fn get(&self, id: &EndpointId) -> Result<Option<KeyMaterial>, StoreError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(KEYS).map_err(io)?;

        match table.get(id.as_bytes()).map_err(io)? {
            Some(value) => {
                let bytes = value.value();
                if bytes.len() != KEY_SIZE {
                    return Err(StoreError::Corrupt {
                        id: *id,
                        reason: format!("value is {} bytes, expected {KEY_SIZE}", bytes.len()),
                    });
                }
                KeyMaterial::from_slice(bytes)
                    .map(Some)
                    .map_err(|err| StoreError::Corrupt { id: *id, reason: err.to_string() })
            },
            None => Ok(None),
        }
    }

    fn put(&self, id: &EndpointId, key: &KeyMaterial) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(KEYS).map_err(io)?;
            table.insert(id.as_bytes(), key.expose().as_slice()).map_err(io)?;
        }
        txn.commit().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_key_is_none() {
        let dir = tempdir().unwrap();
        let store = RedbKeyStore::open(dir.path().join("keys.redb")).unwrap();

        assert!(store.get(&"alice".parse().unwrap()).unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn wrong_length_value_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = RedbKeyStore::open(dir.path().join("keys.redb")).unwrap();
        let id: EndpointId = "alice".parse().unwrap();

        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(KEYS).unwrap();
            table.insert(id.as_bytes(), [1u8; 7].as_slice()).unwrap();
        }
        txn.commit().unwrap();

        let err = store.get(&id).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(!err.is_transient());
    }
}
