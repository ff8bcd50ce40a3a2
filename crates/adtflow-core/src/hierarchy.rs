//! Location hierarchy resolution.
//!
//! Visits and admissions may only be anchored at tagged locations; events
//! arriving at an untagged department resolve upward to the nearest capable
//! ancestor.

use std::collections::HashSet;

use crate::db::Database;
use crate::models::{Location, LocationTag};
use crate::{AdtError, AdtResult};

/// Walks location ancestor chains to find visit- and admission-capable nodes.
///
/// The hierarchy is expected to be a tree; a malformed cycle fails fast
/// rather than walking forever.
pub struct LocationResolver<'a> {
    db: &'a Database,
}

impl<'a> LocationResolver<'a> {
    /// Create a new resolver.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Nearest location at or above `location_id` that may contain visits.
    pub fn resolve_visit_location(&self, location_id: &str) -> AdtResult<Location> {
        self.resolve_tagged(location_id, LocationTag::SupportsVisits)
    }

    /// Nearest location at or above `location_id` that may contain admissions.
    pub fn resolve_admission_location(&self, location_id: &str) -> AdtResult<Location> {
        self.resolve_tagged(location_id, LocationTag::SupportsAdmissions)
    }

    fn resolve_tagged(&self, location_id: &str, tag: LocationTag) -> AdtResult<Location> {
        let mut visited = HashSet::new();
        let mut current = self.fetch(location_id)?;
        loop {
            if !visited.insert(current.id.clone()) {
                return Err(AdtError::CyclicHierarchy(current.id));
            }
            if current.supports(tag) {
                return Ok(current);
            }
            match current.parent_id.as_deref() {
                Some(parent_id) => current = self.fetch(parent_id)?,
                None => {
                    return Err(AdtError::NoSuitableLocation {
                        location_id: location_id.to_string(),
                        tag,
                    })
                }
            }
        }
    }

    /// Check whether `ancestor_id` names `location_id` itself or one of its
    /// ancestors.
    pub fn is_same_or_ancestor(&self, ancestor_id: &str, location_id: &str) -> AdtResult<bool> {
        let mut visited = HashSet::new();
        let mut current_id = location_id.to_string();
        loop {
            if current_id == ancestor_id {
                return Ok(true);
            }
            if !visited.insert(current_id.clone()) {
                return Err(AdtError::CyclicHierarchy(current_id));
            }
            match self.fetch(&current_id)?.parent_id {
                Some(parent_id) => current_id = parent_id,
                None => return Ok(false),
            }
        }
    }

    fn fetch(&self, id: &str) -> AdtResult<Location> {
        self.db
            .get_location(id)?
            .ok_or_else(|| AdtError::NotFound(format!("location {id}")))
    }
}
