use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled session as returned by the event search API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEntry {
    pub from_date: DateTime<Utc>,
    /// When registration opens for this session.
    pub oe_from_date: DateTime<Utc>,
    pub url: String,
    pub places_free: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SessionEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentTarget {
    pub facility: String,
    pub requested_slot: Option<NaiveDateTime>,
    pub entry: SessionEntry,
}
