//! Patient models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A patient identity record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Stable UUID
    pub id: String,
    /// Display name
    pub name: String,
    /// Marker attributes keyed by attribute type (e.g. the unknown-patient flag)
    pub attributes: BTreeMap<String, String>,
    /// Soft-delete flag; voided patients are invisible to lookups
    pub voided: bool,
    /// Audit reason recorded when the patient was voided
    pub void_reason: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Create a new patient with a generated id.
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            attributes: BTreeMap::new(),
            voided: false,
            void_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether this patient carries the given marker attribute.
    pub fn has_attribute(&self, attribute_type: &str) -> bool {
        self.attributes.contains_key(attribute_type)
    }

    /// Check whether this patient is flagged as an unknown/placeholder identity.
    pub fn is_unknown(&self, unknown_attribute: &str) -> bool {
        self.has_attribute(unknown_attribute)
    }
}
