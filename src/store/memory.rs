use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    LedgerAdjustment, LedgerEntry, Order, OrderEvent, OrderId, SubService, SubServiceId, Suggestion,
    SuggestionId, Technician, TechnicianId,
};
use crate::event_sourcing::EventEnvelope;
use super::{
    CatalogLookup, JournalSources, OrderStore, Store, StoreError, StoreTransaction, SuggestionStore, TechnicianLedger,
};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A transaction holds the single state lock for its whole lifetime and works
// on a private copy; commit swaps the copy in. Transactions are therefore
// serializable and all-or-nothing.
//
// ============================================================================

/// Writes that should fail, for exercising persistence error paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultPlan {
    pub fail_order_saves: bool,
    pub fail_suggestion_saves: bool,
    pub fail_ledger_writes: bool,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    order_events: HashMap<OrderId, Vec<EventEnvelope<OrderEvent>>>,
    suggestions: HashMap<SuggestionId, Suggestion>,
    technicians: HashMap<TechnicianId, Technician>,
    ledger: Vec<LedgerEntry>,
    sub_services: HashMap<SubServiceId, SubService>,
    faults: FaultPlan,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    sources: JournalSources,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp journal records with these sources instead of the system clock
    /// and v7 uuids.
    pub fn with_sources(mut self, sources: JournalSources) -> Self {
        self.sources = sources;
        self
    }

    /// Catalog data is owned elsewhere; this seeds it.
    pub async fn insert_sub_service(&self, sub_service: SubService) {
        self.state.lock().await.sub_services.insert(sub_service.id, sub_service);
    }

    pub async fn insert_technician(&self, technician: Technician) {
        self.state.lock().await.technicians.insert(technician.id, technician);
    }

    pub async fn set_faults(&self, faults: FaultPlan) {
        self.state.lock().await.faults = faults;
    }

    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    pub async fn technician(&self, id: TechnicianId) -> Option<Technician> {
        self.state.lock().await.technicians.get(&id).cloned()
    }

    pub async fn suggestion_count(&self) -> usize {
        self.state.lock().await.suggestions.len()
    }

    pub async fn ledger_entries(&self, id: TechnicianId) -> Vec<LedgerEntry> {
        self.state
            .lock()
            .await
            .ledger
            .iter()
            .filter(|entry| entry.technician_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            sources: self.sources.clone(),
            finished: false,
        }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    sources: JournalSources,
    finished: bool,
}

impl MemoryTransaction {
    fn state(&mut self) -> Result<&mut MemoryState, StoreError> {
        if self.finished {
            return Err(StoreError::TransactionClosed);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    fn orders(&mut self) -> &mut dyn OrderStore {
        self
    }

    fn suggestions(&mut self) -> &mut dyn SuggestionStore {
        self
    }

    fn ledger(&mut self) -> &mut dyn TechnicianLedger {
        self
    }

    fn catalog(&mut self) -> &mut dyn CatalogLookup {
        self
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let working = std::mem::take(self.state()?);
        *self.guard = working;
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryTransaction {
    async fn find_by_id(&mut self, id: OrderId) -> Result<Order, StoreError> {
        self.state()?
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    async fn save(&mut self, mut order: Order) -> Result<Order, StoreError> {
        let sources = self.sources.clone();
        let state = self.state()?;
        if state.faults.fail_order_saves {
            return Err(StoreError::Backend(format!("injected failure writing order {}", order.id)));
        }

        let current = state.orders.get(&order.id).map(|stored| stored.version).unwrap_or(0);
        if current != order.version {
            return Err(StoreError::Conflict {
                entity: "Order",
                id: order.id.to_string(),
                expected: order.version,
                actual: current,
            });
        }

        let journal = state.order_events.entry(order.id).or_default();
        let mut sequence = order.version;
        for event in order.take_uncommitted() {
            sequence += 1;
            journal.push(EventEnvelope::new(
                sources.ids.next_id(),
                order.id.as_uuid(),
                sequence,
                event,
                sources.clock.now(),
            ));
        }
        order.version = sequence;

        tracing::debug!(order_id = %order.id, version = order.version, "Stored order");
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn history(&mut self, id: OrderId) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError> {
        let state = self.state()?;
        if !state.orders.contains_key(&id) {
            return Err(StoreError::not_found("Order", id));
        }
        Ok(state.order_events.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SuggestionStore for MemoryTransaction {
    async fn find_by_id(&mut self, id: SuggestionId) -> Result<Suggestion, StoreError> {
        self.state()?
            .suggestions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Suggestion", id))
    }

    async fn save(&mut self, suggestion: Suggestion) -> Result<Suggestion, StoreError> {
        let state = self.state()?;
        if state.faults.fail_suggestion_saves {
            return Err(StoreError::Backend(format!(
                "injected failure writing suggestion {}",
                suggestion.id
            )));
        }
        if state.suggestions.contains_key(&suggestion.id) {
            return Err(StoreError::Duplicate {
                entity: "Suggestion",
                id: suggestion.id.to_string(),
            });
        }
        state.suggestions.insert(suggestion.id, suggestion.clone());
        Ok(suggestion)
    }
}

#[async_trait]
impl TechnicianLedger for MemoryTransaction {
    async fn find_by_id(&mut self, id: TechnicianId) -> Result<Technician, StoreError> {
        self.state()?
            .technicians
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Technician", id))
    }

    async fn save(&mut self, technician: Technician) -> Result<Technician, StoreError> {
        let state = self.state()?;
        if state.faults.fail_ledger_writes {
            return Err(StoreError::Backend(format!(
                "injected failure writing technician {}",
                technician.id
            )));
        }
        state.technicians.insert(technician.id, technician.clone());
        Ok(technician)
    }

    async fn adjust(
        &mut self,
        id: TechnicianId,
        adjustment: LedgerAdjustment,
    ) -> Result<LedgerEntry, StoreError> {
        let entry_id = self.sources.ids.next_id();
        let recorded_at = self.sources.clock.now();
        let state = self.state()?;
        if state.faults.fail_ledger_writes {
            return Err(StoreError::Backend(format!("injected failure adjusting technician {id}")));
        }

        let technician = state
            .technicians
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Technician", id))?;
        technician.apply(&adjustment);

        let entry = LedgerEntry {
            id: entry_id,
            technician_id: id,
            adjustment,
            recorded_at,
        };
        state.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn entries(&mut self, id: TechnicianId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state()?;
        if !state.technicians.contains_key(&id) {
            return Err(StoreError::not_found("Technician", id));
        }
        Ok(state
            .ledger
            .iter()
            .filter(|entry| entry.technician_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogLookup for MemoryTransaction {
    async fn find_sub_service(&mut self, id: SubServiceId) -> Result<SubService, StoreError> {
        self.state()?
            .sub_services
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("SubService", id))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
