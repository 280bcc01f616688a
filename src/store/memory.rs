use crate::store::error::Result;
use crate::store::traits::{KvBackend, Partition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A simple in-memory backend implementation for testing purposes.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    partitions: Arc<RwLock<HashMap<Partition, HashMap<String, Vec<u8>>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, partition: Partition) -> usize {
        let partitions = self.partitions.read().await;
        partitions.get(&partition).map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&partition)
            .and_then(|p| p.get(key))
            .cloned())
    }

    async fn put_many(&self, partition: Partition, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        let table = partitions.entry(partition).or_default();
        for (key, value) in entries {
            table.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        if let Some(table) = partitions.get_mut(&partition) {
            table.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, partition: Partition) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        partitions.remove(&partition);
        Ok(())
    }
}
