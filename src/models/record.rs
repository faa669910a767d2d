//! Canonical long-format records produced by the transform pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{AgeBand, PriorityStatus, WaitingTime};

/// One `(center, age, waiting time, status) -> count` observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistRecord {
    /// Facility code with any site suffix stripped
    pub center_code: String,
    pub age: AgeBand,
    pub waiting_time: WaitingTime,
    pub status: PriorityStatus,
    /// Always > 0
    pub count: u64,
    /// Copied from the report identity that produced the record
    pub retrieved_dt: NaiveDateTime,
}

/// One `(center, age, status at transplant) -> count` observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransplantRecord {
    pub center_code: String,
    pub age: AgeBand,
    pub status: PriorityStatus,
    pub count: u64,
    pub retrieved_dt: NaiveDateTime,
}
