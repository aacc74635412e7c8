//! Filesystem order store.
//!
//! One JSON file per order under the base directory, written with the
//! tmp-file + rename pattern. A waybill index is rebuilt by scanning the
//! directory at startup and kept in memory afterwards; `apply_tracking`
//! holds the store-wide async mutex for the whole read-modify-write, which
//! is what makes the append + re-sort + field update a single atomic step.

use crate::order::{
    FieldUpdates, Order, OrderStore, OrderStoreError, TrackingEvent, UpsertPolicy,
};
use crate::{OrderId, Waybill};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Filesystem-backed [`OrderStore`]
pub struct FilesystemOrderStore {
    base_path: PathBuf,
    /// Waybill -> order id index, guarded together with all writes
    index: Mutex<HashMap<Waybill, OrderId>>,
}

impl FilesystemOrderStore {
    /// Open (or create) the store and rebuild the waybill index
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::Unavailable`] when the base directory
    /// cannot be created or scanned.
    pub async fn open(base_path: PathBuf) -> Result<Self, OrderStoreError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| OrderStoreError::Unavailable {
                message: format!("Failed to create order directory: {}", e),
            })?;

        let mut index = HashMap::new();

        let mut entries =
            fs::read_dir(&base_path)
                .await
                .map_err(|e| OrderStoreError::Unavailable {
                    message: format!("Failed to scan order directory: {}", e),
                })?;

        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| OrderStoreError::Unavailable {
                    message: format!("Failed to read order directory entry: {}", e),
                })?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match fs::read_to_string(&path).await {
                Ok(json) => match serde_json::from_str::<Order>(&json) {
                    Ok(order) => {
                        if let Some(waybill) = order.waybill {
                            index.insert(waybill, order.id);
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping undecodable order file");
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable order file");
                }
            }
        }

        Ok(Self {
            base_path,
            index: Mutex::new(index),
        })
    }

    fn order_path(&self, id: &OrderId) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    async fn read_order(&self, id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let path = self.order_path(id);

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrderStoreError::Unavailable {
                    message: format!("Failed to read order: {}", e),
                });
            }
        };

        let order = serde_json::from_str(&json).map_err(|e| OrderStoreError::Internal {
            message: format!("Failed to deserialize order {}: {}", id, e),
        })?;

        Ok(Some(order))
    }

    async fn write_order(&self, order: &Order) -> Result<(), OrderStoreError> {
        let path = self.order_path(&order.id);

        let json =
            serde_json::to_string_pretty(order).map_err(|e| OrderStoreError::Internal {
                message: format!("Failed to serialize order: {}", e),
            })?;

        let temp_path = path.with_extension("tmp");
        let mut file =
            fs::File::create(&temp_path)
                .await
                .map_err(|e| OrderStoreError::Unavailable {
                    message: format!("Failed to create temp file: {}", e),
                })?;

        file.write_all(json.as_bytes())
            .await
            .map_err(|e| OrderStoreError::Unavailable {
                message: format!("Failed to write order: {}", e),
            })?;

        file.flush()
            .await
            .map_err(|e| OrderStoreError::Unavailable {
                message: format!("Failed to flush order: {}", e),
            })?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| OrderStoreError::Unavailable {
                message: format!("Failed to rename temp file: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for FilesystemOrderStore {
    async fn apply_tracking(
        &self,
        waybill: &Waybill,
        event: TrackingEvent,
        updates: FieldUpdates,
        policy: UpsertPolicy,
    ) -> Result<Order, OrderStoreError> {
        // The mutex spans index lookup through file write: the whole upsert
        // is one critical section.
        let mut index = self.index.lock().await;

        let mut order = match index.get(waybill) {
            Some(id) => self
                .read_order(id)
                .await?
                .ok_or_else(|| OrderStoreError::Internal {
                    message: format!("Waybill index points at missing order {}", id),
                })?,
            None => match policy {
                UpsertPolicy::RejectMissing => {
                    return Err(OrderStoreError::NotFound {
                        waybill: waybill.clone(),
                    });
                }
                UpsertPolicy::CreateMissing => Order::shell(waybill.clone()),
            },
        };

        order.apply_tracking(event, &updates);
        self.write_order(&order).await?;
        index.insert(waybill.clone(), order.id);

        Ok(order)
    }

    async fn find_by_waybill(&self, waybill: &Waybill) -> Result<Option<Order>, OrderStoreError> {
        let index = self.index.lock().await;

        match index.get(waybill) {
            Some(id) => self.read_order(id).await,
            None => Ok(None),
        }
    }

    async fn list_active_waybills(&self) -> Result<Vec<Waybill>, OrderStoreError> {
        let index = self.index.lock().await;
        let mut active = Vec::new();

        for (waybill, id) in index.iter() {
            if let Some(order) = self.read_order(id).await? {
                if !order.is_terminal() {
                    active.push(waybill.clone());
                }
            }
        }

        Ok(active)
    }

    async fn insert(&self, order: Order) -> Result<(), OrderStoreError> {
        let mut index = self.index.lock().await;

        if let Some(waybill) = &order.waybill {
            if index.contains_key(waybill) {
                return Err(OrderStoreError::DuplicateWaybill {
                    waybill: waybill.clone(),
                });
            }
        }

        self.write_order(&order).await?;
        if let Some(waybill) = &order.waybill {
            index.insert(waybill.clone(), order.id);
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "filesystem_order_store_tests.rs"]
mod tests;
