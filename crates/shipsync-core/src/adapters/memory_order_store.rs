//! In-memory order store for testing and development.
//!
//! The whole ledger sits behind one `RwLock`, so `apply_tracking` is a
//! single critical section: find-or-create, duplicate check, append,
//! re-sort, and field updates cannot interleave between concurrent calls.

use crate::order::{
    FieldUpdates, Order, OrderStore, OrderStoreError, TrackingEvent, UpsertPolicy,
};
use crate::{OrderId, Waybill};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

struct Ledger {
    orders: HashMap<OrderId, Order>,
    /// Uniqueness index over present waybills
    by_waybill: HashMap<Waybill, OrderId>,
}

/// Thread-safe in-memory [`OrderStore`]
pub struct InMemoryOrderStore {
    inner: RwLock<Ledger>,
}

impl InMemoryOrderStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Ledger {
                orders: HashMap::new(),
                by_waybill: HashMap::new(),
            }),
        }
    }

    fn lock_poisoned() -> OrderStoreError {
        OrderStoreError::Internal {
            message: "Order store lock poisoned".to_string(),
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn apply_tracking(
        &self,
        waybill: &Waybill,
        event: TrackingEvent,
        updates: FieldUpdates,
        policy: UpsertPolicy,
    ) -> Result<Order, OrderStoreError> {
        let mut ledger = self.inner.write().map_err(|_| Self::lock_poisoned())?;

        let order_id = match ledger.by_waybill.get(waybill) {
            Some(id) => *id,
            None => match policy {
                UpsertPolicy::RejectMissing => {
                    return Err(OrderStoreError::NotFound {
                        waybill: waybill.clone(),
                    });
                }
                UpsertPolicy::CreateMissing => {
                    let shell = Order::shell(waybill.clone());
                    let id = shell.id;
                    ledger.by_waybill.insert(waybill.clone(), id);
                    ledger.orders.insert(id, shell);
                    id
                }
            },
        };

        let order = ledger
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| OrderStoreError::Internal {
                message: format!("Waybill index points at missing order {}", order_id),
            })?;

        order.apply_tracking(event, &updates);
        Ok(order.clone())
    }

    async fn find_by_waybill(&self, waybill: &Waybill) -> Result<Option<Order>, OrderStoreError> {
        let ledger = self.inner.read().map_err(|_| Self::lock_poisoned())?;

        Ok(ledger
            .by_waybill
            .get(waybill)
            .and_then(|id| ledger.orders.get(id))
            .cloned())
    }

    async fn list_active_waybills(&self) -> Result<Vec<Waybill>, OrderStoreError> {
        let ledger = self.inner.read().map_err(|_| Self::lock_poisoned())?;

        Ok(ledger
            .orders
            .values()
            .filter(|order| !order.is_terminal())
            .filter_map(|order| order.waybill.clone())
            .collect())
    }

    async fn insert(&self, order: Order) -> Result<(), OrderStoreError> {
        let mut ledger = self.inner.write().map_err(|_| Self::lock_poisoned())?;

        if let Some(waybill) = &order.waybill {
            if ledger.by_waybill.contains_key(waybill) {
                return Err(OrderStoreError::DuplicateWaybill {
                    waybill: waybill.clone(),
                });
            }
            ledger.by_waybill.insert(waybill.clone(), order.id);
        }

        ledger.orders.insert(order.id, order);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_order_store_tests.rs"]
mod tests;
