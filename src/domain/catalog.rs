use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ids::{SubServiceId, TechnicianId};
use super::order::Money;

/// Read-only view of a catalog sub-service, as far as bidding needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubService {
    pub id: SubServiceId,
    pub name: String,
    /// Lowest price a technician may bid
    pub base_wage: Money,
    pub eligible_technicians: HashSet<TechnicianId>,
}

impl SubService {
    pub fn new(id: SubServiceId, name: impl Into<String>, base_wage: Money) -> Self {
        Self {
            id,
            name: name.into(),
            base_wage,
            eligible_technicians: HashSet::new(),
        }
    }

    pub fn with_technician(mut self, technician_id: TechnicianId) -> Self {
        self.eligible_technicians.insert(technician_id);
        self
    }

    pub fn is_offered_by(&self, technician_id: TechnicianId) -> bool {
        self.eligible_technicians.contains(&technician_id)
    }
}
