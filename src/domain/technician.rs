use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::TechnicianId;
use super::order::Money;

// ============================================================================
// Technician Reputation & Credit
// ============================================================================
//
// The technician record itself belongs to the user-management side. This
// core only moves `score` and `credit`, always through ledger adjustments.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: TechnicianId,
    pub name: String,
    /// No floor or ceiling is enforced here.
    pub score: f64,
    pub credit: Money,
}

impl Technician {
    pub fn new(id: TechnicianId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0.0,
            credit: Money::default(),
        }
    }

    pub fn apply(&mut self, adjustment: &LedgerAdjustment) {
        match adjustment {
            LedgerAdjustment::ScoreAdded(points) => self.score += points,
            LedgerAdjustment::ScoreReduced(points) => self.score -= points,
            LedgerAdjustment::CreditAdded(amount) => self.credit = Money(self.credit.0 + amount.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum LedgerAdjustment {
    ScoreAdded(f64),
    ScoreReduced(f64),
    CreditAdded(Money),
}

impl LedgerAdjustment {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerAdjustment::ScoreAdded(_) => "score_added",
            LedgerAdjustment::ScoreReduced(_) => "score_reduced",
            LedgerAdjustment::CreditAdded(_) => "credit_added",
        }
    }
}

/// One journaled adjustment. Entries are never merged, so a completion
/// reward and a lateness penalty stay two separate lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub technician_id: TechnicianId,
    pub adjustment: LedgerAdjustment,
    pub recorded_at: DateTime<Utc>,
}
