//! Patient identity merging.
//!
//! Collapsing two patient records must leave one coherent visit history:
//! overlapping visits are combined rather than left contradictorily open at
//! the same place and time.

use std::sync::Arc;

use crate::config::AdtConfig;
use crate::db::Database;
use crate::merge::VisitMerger;
use crate::models::Patient;
use crate::{AdtError, AdtResult};

/// Extension hook invoked around a patient merge.
///
/// Hooks run synchronously in registration order; a failing hook aborts the
/// merge and its error propagates to the caller.
pub trait PatientMergeHook: Send + Sync {
    /// Called after visit reconciliation, before the identity merge.
    fn before_merge(&self, preferred: &Patient, not_preferred: &Patient) -> anyhow::Result<()>;

    /// Called after the identity merge completes.
    fn after_merge(&self, preferred: &Patient, not_preferred: &Patient) -> anyhow::Result<()>;
}

/// Orchestrates visit reconciliation and identity merge for two patients.
pub struct PatientMergeCoordinator<'a> {
    db: &'a Database,
    config: &'a AdtConfig,
    hooks: &'a [Arc<dyn PatientMergeHook>],
}

impl<'a> PatientMergeCoordinator<'a> {
    /// Create a new coordinator.
    pub fn new(
        db: &'a Database,
        config: &'a AdtConfig,
        hooks: &'a [Arc<dyn PatientMergeHook>],
    ) -> Self {
        Self { db, config, hooks }
    }

    /// Merge `not_preferred`'s record into `preferred`'s.
    pub fn merge_patients(&self, preferred_id: &str, not_preferred_id: &str) -> AdtResult<Patient> {
        if preferred_id == not_preferred_id {
            return Err(AdtError::InvalidArgument(
                "cannot merge a patient into itself".into(),
            ));
        }
        let preferred = self.fetch(preferred_id)?;
        let not_preferred = self.fetch(not_preferred_id)?;

        let unknown_attribute = &self.config.unknown_patient_attribute;
        let preferred_was_unknown = preferred.is_unknown(unknown_attribute);
        if preferred_was_unknown && !not_preferred.is_unknown(unknown_attribute) {
            return Err(AdtError::InvalidArgument(
                "cannot merge a real patient into an unknown placeholder".into(),
            ));
        }

        self.reconcile_visits(&preferred, &not_preferred)?;

        for hook in self.hooks {
            hook.before_merge(&preferred, &not_preferred)
                .map_err(AdtError::MergeHook)?;
        }

        self.db
            .merge_patient_identities(preferred_id, not_preferred_id)
            .map_err(|err| AdtError::MergeFailed(err.to_string()))?;

        // Identity merge copies attributes over wholesale; a real patient
        // must not come out of it flagged unknown. Two unknown patients
        // keep the marker.
        let mut merged = self.fetch(preferred_id)?;
        if !preferred_was_unknown && merged.attributes.remove(unknown_attribute).is_some() {
            self.db.update_patient(&merged)?;
        }

        for hook in self.hooks {
            hook.after_merge(&merged, &not_preferred)
                .map_err(AdtError::MergeHook)?;
        }

        log::info!("merged patient {not_preferred_id} into {preferred_id}");
        Ok(merged)
    }

    /// Combine overlapping visits across, then within, the two histories.
    ///
    /// One pass is not enough: absorbing a visit can widen the winner far
    /// enough to overlap visits it previously cleared, so a second,
    /// within-patient pass runs over the combined history.
    fn reconcile_visits(&self, preferred: &Patient, not_preferred: &Patient) -> AdtResult<()> {
        let merger = VisitMerger::new(self.db);

        // Pass 1: each losing visit folds into the first winner it overlaps,
        // in store order, and into at most one winner.
        let mut winners = self.db.find_visits_by_patient(&preferred.id)?;
        for mut loser in self.db.find_visits_by_patient(&not_preferred.id)? {
            for winner in winners.iter_mut() {
                if winner.voided {
                    continue;
                }
                if merger.visits_overlap(winner, &loser)? {
                    merger.merge_visits(winner, &mut loser)?;
                    break;
                }
            }
        }

        // Pass 2: re-read the combined history in start order and fold any
        // newly created overlaps between the preferred patient's own visits.
        let mut visits = self.db.find_visits_by_patient(&preferred.id)?;
        visits.sort_by_key(|visit| visit.started_at);
        for i in 0..visits.len() {
            if visits[i].voided {
                continue;
            }
            for j in (i + 1)..visits.len() {
                if visits[j].voided {
                    continue;
                }
                let (head, tail) = visits.split_at_mut(j);
                let winner = &mut head[i];
                let loser = &mut tail[0];
                if merger.visits_overlap(winner, loser)? {
                    merger.merge_visits(winner, loser)?;
                }
            }
        }
        Ok(())
    }

    fn fetch(&self, patient_id: &str) -> AdtResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| AdtError::NotFound(format!("patient {patient_id}")))
    }
}
