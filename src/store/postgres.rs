use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    LedgerAdjustment, LedgerEntry, Money, Order, OrderEvent, OrderId, OrderStatus, SubService,
    SubServiceId, Suggestion, SuggestionId, Technician, TechnicianId, WorkDuration,
};
use crate::event_sourcing::{deserialize_event, serialize_event, EventEnvelope};
use super::{
    CatalogLookup, JournalSources, OrderStore, Store, StoreError, StoreTransaction, SuggestionStore, TechnicianLedger,
};

const SCHEMA: &str = include_str!("schema.sql");

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Isolation per workflow call:
// 1. Orders are read with `FOR UPDATE`, so two calls on one order serialize;
//    read-only paths use `read_by_id` and take no lock
// 2. Order saves are guarded by `WHERE version = $expected`
// 3. Ledger adjustments are single `SET score = score + $n` statements
// 4. Order row, event journal and suggestion rows share one transaction
//
// ============================================================================

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    sources: JournalSources,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            sources: JournalSources::default(),
        }
    }

    /// Stamp journal records with these sources instead of the system clock
    /// and v7 uuids.
    pub fn with_sources(mut self, sources: JournalSources) -> Self {
        self.sources = sources;
        self
    }

    /// Create missing tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    /// Catalog rows are maintained by the catalog admin side; this mirrors one in.
    pub async fn upsert_sub_service(&self, sub_service: &SubService) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sub_services (id, name, base_wage) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, base_wage = EXCLUDED.base_wage",
        )
        .bind(sub_service.id.as_uuid())
        .bind(&sub_service.name)
        .bind(sub_service.base_wage.amount())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sub_service_technicians WHERE sub_service_id = $1")
            .bind(sub_service.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for technician_id in &sub_service.eligible_technicians {
            sqlx::query(
                "INSERT INTO sub_service_technicians (sub_service_id, technician_id) VALUES ($1, $2)",
            )
            .bind(sub_service.id.as_uuid())
            .bind(technician_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction {
            tx: Some(tx),
            sources: self.sources.clone(),
        }))
    }
}

/// Rolled back on drop unless committed.
pub struct PgStoreTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    sources: JournalSources,
}

impl PgStoreTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
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
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<OrderStatus>().map_err(|e| StoreError::Corrupt {
        entity: "Order",
        reason: e.to_string(),
    })?;
    let suggestions: Vec<Uuid> = row.try_get("suggestion_ids")?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        version: row.try_get("version")?,
        customer_id: row.try_get::<Uuid, _>("customer_id")?.into(),
        sub_service_id: row.try_get::<Uuid, _>("sub_service_id")?.into(),
        job_info: row.try_get("job_info")?,
        address: row.try_get("address")?,
        requested_at: row.try_get("requested_at")?,
        placed_at: row.try_get("placed_at")?,
        status,
        suggestions: suggestions.into_iter().map(SuggestionId).collect(),
        selected_suggestion_id: row.try_get::<Option<Uuid>, _>("selected_suggestion_id")?.map(SuggestionId),
        price: row.try_get::<Option<i64>, _>("price")?.map(Money),
        completion_score: row.try_get("completion_score")?,
        comment: row.try_get("comment")?,
        uncommitted: Vec::new(),
    })
}

fn suggestion_from_row(row: &PgRow) -> Result<Suggestion, StoreError> {
    let minutes: i32 = row.try_get("duration_minutes")?;
    let duration = u32::try_from(minutes)
        .ok()
        .and_then(|m| WorkDuration::from_minutes(m).ok())
        .ok_or_else(|| StoreError::Corrupt {
            entity: "Suggestion",
            reason: format!("duration of {minutes} minutes"),
        })?;

    Ok(Suggestion {
        id: SuggestionId(row.try_get("id")?),
        order_id: OrderId(row.try_get("order_id")?),
        technician_id: TechnicianId(row.try_get("technician_id")?),
        suggested_price: Money(row.try_get("suggested_price")?),
        scheduled_at: row.try_get("scheduled_at")?,
        duration,
        submitted_at: row.try_get("submitted_at")?,
    })
}

fn technician_from_row(row: &PgRow) -> Result<Technician, StoreError> {
    Ok(Technician {
        id: TechnicianId(row.try_get("id")?),
        name: row.try_get("name")?,
        score: row.try_get("score")?,
        credit: Money(row.try_get("credit")?),
    })
}

fn ledger_entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let kind: String = row.try_get("kind")?;
    let points: Option<f64> = row.try_get("points")?;
    let credit: Option<i64> = row.try_get("credit")?;

    let adjustment = match (kind.as_str(), points, credit) {
        ("score_added", Some(points), _) => LedgerAdjustment::ScoreAdded(points),
        ("score_reduced", Some(points), _) => LedgerAdjustment::ScoreReduced(points),
        ("credit_added", _, Some(credit)) => LedgerAdjustment::CreditAdded(Money(credit)),
        _ => {
            return Err(StoreError::Corrupt {
                entity: "LedgerEntry",
                reason: format!("unreadable adjustment of kind {kind}"),
            })
        }
    };

    Ok(LedgerEntry {
        id: row.try_get("id")?,
        technician_id: TechnicianId(row.try_get("technician_id")?),
        adjustment,
        recorded_at: row.try_get("recorded_at")?,
    })
}

// ============================================================================
// Collaborator Implementations
// ============================================================================

#[async_trait]
impl OrderStore for PgStoreTransaction {
    async fn find_by_id(&mut self, id: OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order_from_row(&row)
    }

    async fn read_by_id(&mut self, id: OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order_from_row(&row)
    }

    async fn save(&mut self, mut order: Order) -> Result<Order, StoreError> {
        let sources = self.sources.clone();
        let conn = self.conn()?;
        let events = order.take_uncommitted();
        let expected = order.version;
        let new_version = expected + events.len() as i64;
        let suggestion_ids: Vec<Uuid> = order.suggestions.iter().map(|s| s.as_uuid()).collect();

        let written = if expected == 0 {
            sqlx::query(
                "INSERT INTO orders (
                    id, version, customer_id, sub_service_id, job_info, address, requested_at,
                    placed_at, status, suggestion_ids, selected_suggestion_id, price,
                    completion_score, comment
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (id) DO NOTHING",
            )
            .bind(order.id.as_uuid())
            .bind(new_version)
            .bind(order.customer_id.as_uuid())
            .bind(order.sub_service_id.as_uuid())
            .bind(&order.job_info)
            .bind(&order.address)
            .bind(order.requested_at)
            .bind(order.placed_at)
            .bind(order.status.as_str())
            .bind(&suggestion_ids)
            .bind(order.selected_suggestion_id.map(|s| s.as_uuid()))
            .bind(order.price.map(|p| p.amount()))
            .bind(order.completion_score)
            .bind(&order.comment)
            .execute(&mut *conn)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                "UPDATE orders SET
                    version = $2, status = $3, suggestion_ids = $4, selected_suggestion_id = $5,
                    price = $6, completion_score = $7, comment = $8
                WHERE id = $1 AND version = $9",
            )
            .bind(order.id.as_uuid())
            .bind(new_version)
            .bind(order.status.as_str())
            .bind(&suggestion_ids)
            .bind(order.selected_suggestion_id.map(|s| s.as_uuid()))
            .bind(order.price.map(|p| p.amount()))
            .bind(order.completion_score)
            .bind(&order.comment)
            .bind(expected)
            .execute(&mut *conn)
            .await?
            .rows_affected()
        };

        if written == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(order.id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;
            return Err(match actual {
                Some(actual) => StoreError::Conflict {
                    entity: "Order",
                    id: order.id.to_string(),
                    expected,
                    actual,
                },
                None => StoreError::not_found("Order", order.id),
            });
        }

        let mut sequence = expected;
        for event in events {
            sequence += 1;
            let envelope = EventEnvelope::new(
                sources.ids.next_id(),
                order.id.as_uuid(),
                sequence,
                event,
                sources.clock.now(),
            );
            sqlx::query(
                "INSERT INTO order_events (
                    order_id, sequence_number, event_id, event_type, event_version,
                    event_data, correlation_id, recorded_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(envelope.aggregate_id)
            .bind(envelope.sequence_number)
            .bind(envelope.event_id)
            .bind(&envelope.event_type)
            .bind(envelope.event_version)
            .bind(serialize_event(&envelope.event_data)?)
            .bind(envelope.correlation_id)
            .bind(envelope.timestamp)
            .execute(&mut *conn)
            .await?;
        }

        order.version = new_version;
        tracing::debug!(order_id = %order.id, version = new_version, "Stored order");
        Ok(order)
    }

    async fn history(&mut self, id: OrderId) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError> {
        let conn = self.conn()?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("Order", id));
        }

        let rows = sqlx::query(
            "SELECT sequence_number, event_id, event_type, event_version, event_data,
                    correlation_id, recorded_at
             FROM order_events
             WHERE order_id = $1
             ORDER BY sequence_number ASC",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| -> Result<EventEnvelope<OrderEvent>, StoreError> {
                let event_data: String = row.try_get("event_data")?;
                Ok(EventEnvelope {
                    event_id: row.try_get("event_id")?,
                    aggregate_id: id.as_uuid(),
                    sequence_number: row.try_get("sequence_number")?,
                    event_type: row.try_get("event_type")?,
                    event_version: row.try_get("event_version")?,
                    event_data: deserialize_event(&event_data)?,
                    correlation_id: row.try_get("correlation_id")?,
                    timestamp: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
                    metadata: HashMap::new(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl SuggestionStore for PgStoreTransaction {
    async fn find_by_id(&mut self, id: SuggestionId) -> Result<Suggestion, StoreError> {
        let row = sqlx::query("SELECT * FROM suggestions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| StoreError::not_found("Suggestion", id))?;
        suggestion_from_row(&row)
    }

    async fn save(&mut self, suggestion: Suggestion) -> Result<Suggestion, StoreError> {
        let duration_minutes = i32::try_from(suggestion.duration.total_minutes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let inserted = sqlx::query(
            "INSERT INTO suggestions (
                id, order_id, technician_id, suggested_price, scheduled_at,
                duration_minutes, submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING",
        )
        .bind(suggestion.id.as_uuid())
        .bind(suggestion.order_id.as_uuid())
        .bind(suggestion.technician_id.as_uuid())
        .bind(suggestion.suggested_price.amount())
        .bind(suggestion.scheduled_at)
        .bind(duration_minutes)
        .bind(suggestion.submitted_at)
        .execute(self.conn()?)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::Duplicate {
                entity: "Suggestion",
                id: suggestion.id.to_string(),
            });
        }
        Ok(suggestion)
    }
}

#[async_trait]
impl TechnicianLedger for PgStoreTransaction {
    async fn find_by_id(&mut self, id: TechnicianId) -> Result<Technician, StoreError> {
        let row = sqlx::query("SELECT id, name, score, credit FROM technicians WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| StoreError::not_found("Technician", id))?;
        technician_from_row(&row)
    }

    async fn save(&mut self, technician: Technician) -> Result<Technician, StoreError> {
        sqlx::query(
            "INSERT INTO technicians (id, name, score, credit) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(technician.id.as_uuid())
        .bind(&technician.name)
        .bind(technician.score)
        .bind(technician.credit.amount())
        .execute(self.conn()?)
        .await?;

        Ok(technician)
    }

    async fn adjust(
        &mut self,
        id: TechnicianId,
        adjustment: LedgerAdjustment,
    ) -> Result<LedgerEntry, StoreError> {
        let entry_id = self.sources.ids.next_id();
        let recorded_at = self.sources.clock.now();
        let conn = self.conn()?;

        let (score_delta, credit_delta) = match &adjustment {
            LedgerAdjustment::ScoreAdded(points) => (*points, 0),
            LedgerAdjustment::ScoreReduced(points) => (-*points, 0),
            LedgerAdjustment::CreditAdded(amount) => (0.0, amount.amount()),
        };

        // relative update, never read-modify-write
        let updated = sqlx::query(
            "UPDATE technicians SET score = score + $2, credit = credit + $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(score_delta)
        .bind(credit_delta)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::not_found("Technician", id));
        }

        let (points, credit) = match &adjustment {
            LedgerAdjustment::ScoreAdded(points) | LedgerAdjustment::ScoreReduced(points) => {
                (Some(*points), None)
            }
            LedgerAdjustment::CreditAdded(amount) => (None, Some(amount.amount())),
        };

        let entry = LedgerEntry {
            id: entry_id,
            technician_id: id,
            adjustment,
            recorded_at,
        };

        sqlx::query(
            "INSERT INTO ledger_entries (id, technician_id, kind, points, credit, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(id.as_uuid())
        .bind(entry.adjustment.kind())
        .bind(points)
        .bind(credit)
        .bind(entry.recorded_at)
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    async fn entries(&mut self, id: TechnicianId) -> Result<Vec<LedgerEntry>, StoreError> {
        let conn = self.conn()?;
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM technicians WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("Technician", id));
        }

        let rows = sqlx::query(
            "SELECT id, technician_id, kind, points, credit, recorded_at
             FROM ledger_entries
             WHERE technician_id = $1
             ORDER BY seq ASC",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}

#[async_trait]
impl CatalogLookup for PgStoreTransaction {
    async fn find_sub_service(&mut self, id: SubServiceId) -> Result<SubService, StoreError> {
        let conn = self.conn()?;
        let row = sqlx::query("SELECT id, name, base_wage FROM sub_services WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::not_found("SubService", id))?;

        let technicians: Vec<Uuid> = sqlx::query_scalar(
            "SELECT technician_id FROM sub_service_technicians WHERE sub_service_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        Ok(SubService {
            id,
            name: row.try_get("name")?,
            base_wage: Money(row.try_get("base_wage")?),
            eligible_technicians: technicians.into_iter().map(TechnicianId).collect(),
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries need a live PostgreSQL; these cover the pieces that don't.
//
// ============================================================================
