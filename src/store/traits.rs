use crate::store::error::Result;
use async_trait::async_trait;

/// Fixed named partitions of the durable store, one per domain cache.
///
/// Partitions are created when the database is first opened; domain caches
/// never contend on each other's partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Messages,
    Conversations,
    Tags,
    Sessions,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::Messages,
        Partition::Conversations,
        Partition::Tags,
        Partition::Sessions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Partition::Messages => "messages",
            Partition::Conversations => "conversations",
            Partition::Tags => "tags",
            Partition::Sessions => "sessions",
        }
    }
}

/// Durable key-value backend with named partitions.
///
/// `put_many` writes an entire coalesced flush batch in one transaction, so a
/// batch either lands completely or rejects as a whole.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put_many(&self, partition: Partition, entries: Vec<(String, Vec<u8>)>) -> Result<()>;
    async fn delete(&self, partition: Partition, key: &str) -> Result<()>;
    async fn clear(&self, partition: Partition) -> Result<()>;
}
