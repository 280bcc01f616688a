use crate::store::error::{Result, StoreError};
use crate::store::traits::{KvBackend, Partition};
use async_trait::async_trait;
use redb::{
    Builder, Database, ReadableDatabase, TableDefinition, TableError,
    backends::InMemoryBackend,
};
use std::path::Path;
use std::sync::Arc;

macro_rules! open_table_or_default {
    ($txn:expr, $table:expr, $default:expr) => {
        match $txn.open_table($table) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok($default),
            Err(e) => return Err(StoreError::Database(e.to_string())),
        }
    };
}

const MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("messages");
const CONVERSATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("conversations");
const TAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

fn table_for(partition: Partition) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match partition {
        Partition::Messages => MESSAGES,
        Partition::Conversations => CONVERSATIONS,
        Partition::Tags => TAGS,
        Partition::Sessions => SESSIONS,
    }
}

/// Durable store adapter backed by a single redb database file.
///
/// The database handle is opened once and shared; every partition is a named
/// table created inside the first write transaction. Transactions run on the
/// blocking pool so the async runtime never stalls on file I/O.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub async fn open<P: AsRef<Path> + Send + 'static>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let db = tokio::task::spawn_blocking(move || -> Result<Database> {
            let db = Database::create(&path).map_err(|e| StoreError::Database(e.to_string()))?;
            create_partitions(&db)?;
            Ok(db)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))??;

        Ok(Self { db: Arc::new(db) })
    }

    /// Ephemeral store for tests and sessions that must not touch the disk.
    pub fn in_memory() -> Result<Self> {
        let db = Builder::new()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| StoreError::Database(e.to_string()))?;
        create_partitions(&db)?;

        Ok(Self { db: Arc::new(db) })
    }
}

fn create_partitions(db: &Database) -> Result<()> {
    let write_txn = db
        .begin_write()
        .map_err(|e| StoreError::Database(e.to_string()))?;
    for partition in Partition::ALL {
        write_txn
            .open_table(table_for(partition))
            .map_err(|e| StoreError::Database(e.to_string()))?;
    }
    write_txn
        .commit()
        .map_err(|e| StoreError::Database(e.to_string()))?;
    Ok(())
}

#[async_trait]
impl KvBackend for RedbStore {
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>> {
        let db = self.db.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
            let read_txn = db
                .begin_read()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            let table = open_table_or_default!(read_txn, table_for(partition), None);
            let value = table
                .get(key.as_str())
                .map_err(|e| StoreError::Database(e.to_string()))?
                .map(|guard| guard.value().to_vec());
            Ok(value)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }

    async fn put_many(&self, partition: Partition, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let write_txn = db
                .begin_write()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(table_for(partition))
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                for (key, value) in &entries {
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(|e| StoreError::Database(e.to_string()))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<()> {
        let db = self.db.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let write_txn = db
                .begin_write()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(table_for(partition))
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                table
                    .remove(key.as_str())
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }

    async fn clear(&self, partition: Partition) -> Result<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let write_txn = db
                .begin_write()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            write_txn
                .delete_table(table_for(partition))
                .map_err(|e| StoreError::Database(e.to_string()))?;
            // Recreate so the partition set stays fixed for the session.
            write_txn
                .open_table(table_for(partition))
                .map_err(|e| StoreError::Database(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }
}
