//! In-memory payload buffer for testing and development.

use crate::buffer::{BufferError, BufferedPayload, PayloadBuffer};
use crate::PayloadId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe in-memory [`PayloadBuffer`]
pub struct InMemoryPayloadBuffer {
    entries: RwLock<HashMap<PayloadId, BufferedPayload>>,
}

impl InMemoryPayloadBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn lock_poisoned() -> BufferError {
        BufferError::OperationFailed {
            message: "Buffer lock poisoned".to_string(),
        }
    }
}

impl Default for InMemoryPayloadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayloadBuffer for InMemoryPayloadBuffer {
    async fn put(&self, payload: &BufferedPayload) -> Result<(), BufferError> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_poisoned())?;
        entries.insert(payload.payload_id, payload.clone());
        Ok(())
    }

    async fn get(&self, id: &PayloadId) -> Result<Option<BufferedPayload>, BufferError> {
        let entries = self.entries.read().map_err(|_| Self::lock_poisoned())?;
        Ok(entries.get(id).cloned())
    }

    async fn delete(&self, id: &PayloadId) -> Result<(), BufferError> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_poisoned())?;
        // Deleting an absent key is fine; another worker may have won.
        entries.remove(id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<PayloadId>, BufferError> {
        let entries = self.entries.read().map_err(|_| Self::lock_poisoned())?;
        Ok(entries.keys().copied().collect())
    }
}

#[cfg(test)]
#[path = "memory_buffer_tests.rs"]
mod tests;
