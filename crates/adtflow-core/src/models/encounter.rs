//! Encounter models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider attached to an encounter under a named role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderAssignment {
    /// Encounter role (e.g. admitting clinician)
    pub role: String,
    /// Provider filling the role
    pub provider_id: String,
}

/// A single timestamped clinical interaction within a visit.
///
/// An encounter belongs to exactly one visit at a time; moving it to another
/// visit is an explicit ownership transfer done only during visit merges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Encounter {
    /// Stable UUID
    pub id: String,
    /// Patient this encounter belongs to
    pub patient_id: String,
    /// Owning visit
    pub visit_id: String,
    /// Where the interaction took place
    pub location_id: String,
    /// Configured encounter type identifier (check-in, admission, ...)
    pub encounter_type: String,
    /// When the interaction took place
    pub encounter_datetime: DateTime<Utc>,
    /// Providers attached under their encounter roles
    pub providers: Vec<ProviderAssignment>,
    /// Soft-delete flag
    pub voided: bool,
    /// Audit reason recorded when the encounter was voided
    pub void_reason: Option<String>,
}

impl Encounter {
    /// Create a new encounter with a generated id and no providers.
    pub fn new(
        patient_id: String,
        visit_id: String,
        location_id: String,
        encounter_type: String,
        encounter_datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            visit_id,
            location_id,
            encounter_type,
            encounter_datetime,
            providers: Vec::new(),
            voided: false,
            void_reason: None,
        }
    }

    /// Compare this encounter's type against a configured identifier.
    ///
    /// An unconfigured identifier matches nothing.
    pub fn is_type(&self, encounter_type: Option<&str>) -> bool {
        encounter_type.is_some_and(|t| t == self.encounter_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encounter(encounter_type: &str) -> Encounter {
        Encounter::new(
            "patient-1".into(),
            "visit-1".into(),
            "ward-a".into(),
            encounter_type.into(),
            Utc::now(),
        )
    }

    #[test]
    fn test_is_type() {
        let admission = encounter("admission");
        assert!(admission.is_type(Some("admission")));
        assert!(!admission.is_type(Some("discharge")));
        assert!(!admission.is_type(None));
    }
}
