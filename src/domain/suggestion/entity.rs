use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{OrderId, SuggestionId, TechnicianId};
use crate::domain::order::Money;
use super::errors::SuggestionError;
use super::value_objects::{parse_date, parse_time, WorkDuration};

/// A technician's bid on an order. Immutable once stored; whether it won is
/// recorded on the order (`selected_suggestion_id`), not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub order_id: OrderId,
    pub technician_id: TechnicianId,
    pub suggested_price: Money,
    /// Suggested date and time combined
    pub scheduled_at: DateTime<Utc>,
    pub duration: WorkDuration,
    pub submitted_at: DateTime<Utc>,
}

impl Suggestion {
    /// When the technician promised the job would be done.
    pub fn promised_completion(&self) -> Result<DateTime<Utc>, SuggestionError> {
        completion_after(self.scheduled_at, self.duration)
    }
}

/// Bid as submitted by a technician, before it is checked against the
/// order and the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRequest {
    pub technician_id: TechnicianId,
    pub order_id: OrderId,
    pub suggested_price: Money,
    pub suggested_date: NaiveDate,
    pub suggested_time: NaiveTime,
    pub duration: WorkDuration,
}

impl SuggestionRequest {
    /// Build a request from form text: `yyyy-MM-dd`, `HH:mm` and an `HH:mm` duration.
    pub fn parse(
        technician_id: TechnicianId,
        order_id: OrderId,
        suggested_price: Money,
        suggested_date: &str,
        suggested_time: &str,
        duration: &str,
    ) -> Result<Self, SuggestionError> {
        Ok(Self {
            technician_id,
            order_id,
            suggested_price,
            suggested_date: parse_date(suggested_date)?,
            suggested_time: parse_time(suggested_time)?,
            duration: duration.parse()?,
        })
    }

    /// Suggested date and time are wall-clock UTC; callers in other zones
    /// convert before building the request.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.suggested_date.and_time(self.suggested_time))
    }

    pub fn promised_completion(&self) -> Result<DateTime<Utc>, SuggestionError> {
        completion_after(self.scheduled_at(), self.duration)
    }

    pub fn into_suggestion(self, id: SuggestionId, submitted_at: DateTime<Utc>) -> Suggestion {
        Suggestion {
            id,
            order_id: self.order_id,
            technician_id: self.technician_id,
            suggested_price: self.suggested_price,
            scheduled_at: self.scheduled_at(),
            duration: self.duration,
            submitted_at,
        }
    }
}

fn completion_after(start: DateTime<Utc>, duration: WorkDuration) -> Result<DateTime<Utc>, SuggestionError> {
    start
        .checked_add_signed(duration.as_time_delta())
        .ok_or_else(|| SuggestionError::CompletionOutOfRange(start.to_rfc3339()))
}
