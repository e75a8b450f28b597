// ============================================================================
// Persistence Layer - Store Contracts
// ============================================================================
//
// The workflow engine talks to four collaborators: the order store, the
// suggestion store, the technician ledger and the catalog lookup. All of
// them are reached through one `StoreTransaction`, so every workflow call
// reads, checks and writes as a single unit. Dropping a transaction without
// `commit` discards its writes.
//
// Backends:
// - `memory`: one lock over the whole state, serializable, fault injection
// - `postgres`: row locks + optimistic version check + atomic increments
//
// ============================================================================

pub mod memory;
pub mod postgres;

pub use memory::{FaultPlan, InMemoryStore};
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{
    LedgerAdjustment, LedgerEntry, Money, Order, OrderCommand, OrderEvent, OrderId, SubService,
    SubServiceId, Suggestion, SuggestionId, Technician, TechnicianId,
};
use crate::clock::{Clock, IdGenerator, SystemClock, UuidV7Generator};
use crate::error::MarketplaceError;
use crate::event_sourcing::{Aggregate, EventEnvelope};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: String },

    #[error("Concurrency conflict on {entity} {id}: expected version {expected}, but current is {actual}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt {entity} record: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    #[error("Transaction already finished")]
    TransactionClosed,

    #[error("Event encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound { entity, id: id.to_string() }
    }
}

/// Where a store takes the timestamps and ids of the journal records it
/// writes (order events, ledger entries).
#[derive(Clone)]
pub struct JournalSources {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl JournalSources {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }
}

impl Default for JournalSources {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(UuidV7Generator))
    }
}

// ============================================================================
// Collaborator Contracts
// ============================================================================

#[async_trait]
pub trait OrderStore: Send {
    /// Load an order for update; backends with row locks take one here.
    async fn find_by_id(&mut self, id: OrderId) -> Result<Order, StoreError>;

    /// Load an order for reading only, without blocking concurrent writers.
    async fn read_by_id(&mut self, id: OrderId) -> Result<Order, StoreError> {
        self.find_by_id(id).await
    }

    /// Persist the order and journal its uncommitted events. Fails with
    /// `Conflict` when the stored version moved since the order was loaded.
    async fn save(&mut self, order: Order) -> Result<Order, StoreError>;

    /// Journaled events of one order, oldest first
    async fn history(&mut self, id: OrderId) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError>;

    /// Technician arrived: `AWAITING_TECHNICIAN_ARRIVAL` -> `STARTED`
    async fn start_order(&mut self, id: OrderId, at: DateTime<Utc>) -> Result<Order, MarketplaceError> {
        self.apply_command(id, OrderCommand::Start { at }).await
    }

    async fn finish_order(
        &mut self,
        id: OrderId,
        completion_score: f64,
        at: DateTime<Utc>,
    ) -> Result<Order, MarketplaceError> {
        self.apply_command(id, OrderCommand::Finish { completion_score, at }).await
    }

    async fn add_comment(&mut self, id: OrderId, comment: String) -> Result<Order, MarketplaceError> {
        self.apply_command(id, OrderCommand::AddComment { comment }).await
    }

    /// Load, run one command against the aggregate, save.
    async fn apply_command(&mut self, id: OrderId, command: OrderCommand) -> Result<Order, MarketplaceError> {
        let mut order = self.find_by_id(id).await?;
        order.execute(&command)?;
        Ok(self.save(order).await?)
    }
}

#[async_trait]
pub trait SuggestionStore: Send {
    async fn find_by_id(&mut self, id: SuggestionId) -> Result<Suggestion, StoreError>;

    /// Insert a new suggestion. Suggestions are immutable, so an existing id
    /// fails with `Duplicate`.
    async fn save(&mut self, suggestion: Suggestion) -> Result<Suggestion, StoreError>;
}

/// Score and credit are only ever moved by relative adjustments; callers
/// never write back a technician they read earlier.
#[async_trait]
pub trait TechnicianLedger: Send {
    async fn find_by_id(&mut self, id: TechnicianId) -> Result<Technician, StoreError>;

    async fn save(&mut self, technician: Technician) -> Result<Technician, StoreError>;

    /// Apply one adjustment atomically and journal it.
    async fn adjust(
        &mut self,
        id: TechnicianId,
        adjustment: LedgerAdjustment,
    ) -> Result<LedgerEntry, StoreError>;

    /// Journaled adjustments of one technician, oldest first
    async fn entries(&mut self, id: TechnicianId) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn add_points(&mut self, id: TechnicianId, points: f64) -> Result<LedgerEntry, StoreError> {
        self.adjust(id, LedgerAdjustment::ScoreAdded(points)).await
    }

    async fn reduce_points(&mut self, id: TechnicianId, points: f64) -> Result<LedgerEntry, StoreError> {
        self.adjust(id, LedgerAdjustment::ScoreReduced(points)).await
    }

    async fn add_credit(&mut self, id: TechnicianId, amount: Money) -> Result<LedgerEntry, StoreError> {
        self.adjust(id, LedgerAdjustment::CreditAdded(amount)).await
    }
}

/// Read-only access to the service catalog.
#[async_trait]
pub trait CatalogLookup: Send {
    async fn find_sub_service(&mut self, id: SubServiceId) -> Result<SubService, StoreError>;
}

// ============================================================================
// Transactions
// ============================================================================

#[async_trait]
pub trait StoreTransaction: Send {
    fn orders(&mut self) -> &mut dyn OrderStore;
    fn suggestions(&mut self) -> &mut dyn SuggestionStore;
    fn ledger(&mut self) -> &mut dyn TechnicianLedger;
    fn catalog(&mut self) -> &mut dyn CatalogLookup;

    /// Make every write of this transaction visible at once.
    async fn commit(&mut self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}
