//! Care-delivery location models.
//!
//! Locations form a parent/child tree maintained outside this core; here they
//! are read-only reference data. Capability tags mark which nodes may contain
//! visits or admissions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability tag on a location node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationTag {
    /// Visits may be anchored at this location
    SupportsVisits,
    /// Admission encounters may be placed at this location
    SupportsAdmissions,
}

impl fmt::Display for LocationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SupportsVisits => write!(f, "supports_visits"),
            Self::SupportsAdmissions => write!(f, "supports_admissions"),
        }
    }
}

/// A node in the care-delivery location tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// Stable UUID
    pub id: String,
    /// Display name
    pub name: String,
    /// Parent node; None for a facility root
    pub parent_id: Option<String>,
    /// Capability tags
    pub tags: Vec<LocationTag>,
}

impl Location {
    /// Create a root location with a generated id.
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            parent_id: None,
            tags: Vec::new(),
        }
    }

    /// Create a child of `parent` with a generated id.
    pub fn child_of(name: String, parent: &Location) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            parent_id: Some(parent.id.clone()),
            tags: Vec::new(),
        }
    }

    /// Check whether this location carries the given capability tag.
    pub fn supports(&self, tag: LocationTag) -> bool {
        self.tags.contains(&tag)
    }
}
