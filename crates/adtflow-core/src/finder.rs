//! Active-visit lookup and lazy lifecycle maintenance.

use chrono::{DateTime, Utc};

use crate::activity::ActivityEvaluator;
use crate::config::AdtConfig;
use crate::db::Database;
use crate::hierarchy::LocationResolver;
use crate::models::Visit;
use crate::AdtResult;

/// Outcome of a close-inactive sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Visits closed by the sweep
    pub closed: usize,
    /// Visits that failed to close and were left open
    pub failed: usize,
}

/// Finds the visit that should contain a patient's next encounter.
pub struct ActiveVisitFinder<'a> {
    db: &'a Database,
    config: &'a AdtConfig,
}

impl<'a> ActiveVisitFinder<'a> {
    /// Create a new finder.
    pub fn new(db: &'a Database, config: &'a AdtConfig) -> Self {
        Self { db, config }
    }

    /// Find the patient's active, location-suitable visit.
    ///
    /// This is deliberately more than a query: any open visit found to be no
    /// longer active is closed here, with a stop time guessed from its latest
    /// encounter.
    pub fn find_active(
        &self,
        patient_id: &str,
        location_id: &str,
        now: DateTime<Utc>,
    ) -> AdtResult<Option<Visit>> {
        let evaluator = ActivityEvaluator::new(self.db, self.config);
        let resolver = LocationResolver::new(self.db);

        let mut selected = None;
        for mut visit in self.db.find_visits_by_patient(patient_id)? {
            if !evaluator.is_active(&visit, now)? {
                if visit.is_open() {
                    self.close_with_guessed_stop(&mut visit)?;
                }
                continue;
            }
            if self.is_suitable(&resolver, &visit, location_id, now)? {
                // Last match in store order wins; the store promises no
                // stronger ordering than "as listed".
                selected = Some(visit);
            }
        }
        Ok(selected)
    }

    /// Find the active visit, opening one at the nearest visit-capable
    /// location when none qualifies.
    pub fn ensure_active(
        &self,
        patient_id: &str,
        location_id: &str,
        now: DateTime<Utc>,
    ) -> AdtResult<Visit> {
        if let Some(visit) = self.find_active(patient_id, location_id, now)? {
            return Ok(visit);
        }

        let visit_location = LocationResolver::new(self.db).resolve_visit_location(location_id)?;
        let visit = Visit::new(
            patient_id.to_string(),
            Some(visit_location.id),
            self.config.visit_type.clone(),
            now,
        );
        self.db.insert_visit(&visit)?;
        log::info!("opened visit {} for patient {}", visit.id, patient_id);
        Ok(visit)
    }

    /// Close every open visit in the store that is no longer active.
    ///
    /// A failure closing one visit must not abort the sweep for the rest;
    /// such failures are logged and counted, and the sweep continues.
    pub fn close_inactive_visits(&self, now: DateTime<Utc>) -> AdtResult<SweepOutcome> {
        let evaluator = ActivityEvaluator::new(self.db, self.config);

        let mut outcome = SweepOutcome::default();
        for mut visit in self.db.find_open_visits()? {
            match self.close_if_inactive(&evaluator, &mut visit, now) {
                Ok(true) => outcome.closed += 1,
                Ok(false) => {}
                Err(err) => {
                    log::error!("failed to close stale visit {}: {err}", visit.id);
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Whether `when` falls inside the visit window and the visit's location
    /// (when set) is the target location or one of its ancestors.
    ///
    /// A visit anchored at a facility root is suitable for any descendant
    /// department; a visit with no location is suitable anywhere.
    pub fn is_suitable(
        &self,
        resolver: &LocationResolver<'a>,
        visit: &Visit,
        location_id: &str,
        when: DateTime<Utc>,
    ) -> AdtResult<bool> {
        if !visit.contains(when) {
            return Ok(false);
        }
        match visit.location_id.as_deref() {
            None => Ok(true),
            Some(visit_location) => resolver.is_same_or_ancestor(visit_location, location_id),
        }
    }

    fn close_if_inactive(
        &self,
        evaluator: &ActivityEvaluator<'a>,
        visit: &mut Visit,
        now: DateTime<Utc>,
    ) -> AdtResult<bool> {
        if evaluator.is_active(visit, now)? {
            return Ok(false);
        }
        self.close_with_guessed_stop(visit)?;
        Ok(true)
    }

    /// Close an abandoned visit at the datetime of its latest encounter, or
    /// at its own start when it has none.
    fn close_with_guessed_stop(&self, visit: &mut Visit) -> AdtResult<()> {
        let encounters = self.db.find_encounters_by_visit(&visit.id)?;
        let guessed_stop = encounters
            .last()
            .map(|encounter| encounter.encounter_datetime)
            .unwrap_or(visit.started_at);
        visit.close(guessed_stop);
        self.db.update_visit(visit)?;
        log::debug!("closed stale visit {} at {guessed_stop}", visit.id);
        Ok(())
    }
}
