//! services/api/src/adapters/memory.rs
//!
//! A volatile `StorageService`: slots live only as long as the process.

use async_trait::async_trait;
use resource_board_core::ports::{PortResult, SlotBatch, SlotMap, StorageService};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStorageAdapter {
    slots: Mutex<SlotMap>,
}

impl InMemoryStorageAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageService for InMemoryStorageAdapter {
    async fn read_slots(&self) -> PortResult<SlotMap> {
        Ok(self.slots.lock().await.clone())
    }

    async fn commit(&self, batch: SlotBatch) -> PortResult<()> {
        let mut slots = self.slots.lock().await;
        for key in &batch.removals {
            slots.remove(key);
        }
        slots.extend(batch.writes);
        Ok(())
    }
}
