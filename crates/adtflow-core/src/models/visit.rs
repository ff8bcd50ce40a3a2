//! Visit models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The top-level episode-of-care record grouping the encounters of one
/// patient presentation at a facility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    /// Stable UUID
    pub id: String,
    /// Patient this visit belongs to
    pub patient_id: String,
    /// Authoritative location; None leaves the visit unconstrained
    pub location_id: Option<String>,
    /// Configured visit type identifier
    pub visit_type: String,
    /// Start of the visit window; never unset
    pub started_at: DateTime<Utc>,
    /// End of the visit window; None while the visit is open
    pub stopped_at: Option<DateTime<Utc>>,
    /// Soft-delete flag; visits are voided, never hard-deleted
    pub voided: bool,
    /// Audit reason recorded when the visit was voided
    pub void_reason: Option<String>,
}

impl Visit {
    /// Open a new visit with a generated id.
    pub fn new(
        patient_id: String,
        location_id: Option<String>,
        visit_type: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            location_id,
            visit_type,
            started_at,
            stopped_at: None,
            voided: false,
            void_reason: None,
        }
    }

    /// A visit with no stop time is still open.
    pub fn is_open(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Check whether `when` falls within the visit window, treating a missing
    /// stop time as unbounded.
    pub fn contains(&self, when: DateTime<Utc>) -> bool {
        when >= self.started_at && self.stopped_at.map_or(true, |stop| when <= stop)
    }

    /// Close the visit. The stop time is clamped to the start time so the
    /// stored range never inverts.
    pub fn close(&mut self, stopped_at: DateTime<Utc>) {
        self.stopped_at = Some(stopped_at.max(self.started_at));
    }
}
