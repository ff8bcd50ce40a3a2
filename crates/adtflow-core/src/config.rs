//! ADT configuration values.
//!
//! Loading these from an external source is out of scope; callers construct
//! the struct directly. Operations that need an encounter type left as `None`
//! fail with a configuration error rather than guessing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Hours without activity before an open, non-admitted visit is presumed
/// abandoned.
pub const DEFAULT_VISIT_EXPIRE_HOURS: i64 = 12;

/// Identifiers and policy knobs the ADT operations depend on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdtConfig {
    /// Visit type assigned to visits this library opens
    pub visit_type: String,
    /// Encounter type marking a check-in
    pub checkin_encounter_type: Option<String>,
    /// Encounter type marking an inpatient admission
    pub admission_encounter_type: Option<String>,
    /// Encounter type marking a discharge
    pub discharge_encounter_type: Option<String>,
    /// Encounter type marking a transfer
    pub transfer_encounter_type: Option<String>,
    /// Role under which a defaulted check-in provider is attached
    pub checkin_encounter_role: String,
    /// Staleness window for open visits, in hours
    pub visit_expire_hours: i64,
    /// Patient attribute type marking unknown/placeholder identities
    pub unknown_patient_attribute: String,
}

impl Default for AdtConfig {
    fn default() -> Self {
        Self {
            visit_type: "facility-visit".into(),
            checkin_encounter_type: None,
            admission_encounter_type: None,
            discharge_encounter_type: None,
            transfer_encounter_type: None,
            checkin_encounter_role: "checkin-clerk".into(),
            visit_expire_hours: DEFAULT_VISIT_EXPIRE_HOURS,
            unknown_patient_attribute: "unknown-patient".into(),
        }
    }
}

impl AdtConfig {
    /// The instant before which an open visit with no activity is stale.
    pub fn staleness_threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.visit_expire_hours)
    }
}
