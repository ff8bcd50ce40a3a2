//! Visit overlap detection and merging.

use crate::db::Database;
use crate::hierarchy::LocationResolver;
use crate::models::Visit;
use crate::AdtResult;

/// Combines visits whose windows and locations contradict each other.
pub struct VisitMerger<'a> {
    db: &'a Database,
}

impl<'a> VisitMerger<'a> {
    /// Create a new merger.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Two visits overlap when their locations are compatible (both unset,
    /// or one the same-or-ancestor of the other) and their date ranges
    /// intersect, treating a missing stop time as unbounded.
    pub fn visits_overlap(&self, a: &Visit, b: &Visit) -> AdtResult<bool> {
        Ok(self.locations_compatible(a, b)? && ranges_intersect(a, b))
    }

    /// Fold `non_preferred` into `preferred`.
    ///
    /// The winner's window widens to cover the loser's, the loser's
    /// encounters move over (re-patiented to the winner's patient), and the
    /// loser is voided with an audit reason naming the winner. Re-merging an
    /// already-voided loser is a no-op, so an interrupted merge can safely
    /// be re-run.
    pub fn merge_visits(&self, preferred: &mut Visit, non_preferred: &mut Visit) -> AdtResult<()> {
        if non_preferred.voided {
            return Ok(());
        }

        if non_preferred.started_at < preferred.started_at {
            preferred.started_at = non_preferred.started_at;
        }
        // An open winner stays open. A closed winner takes the later stop
        // time with "no stop" sorting latest, so absorbing an open visit
        // reopens the winner.
        if preferred.stopped_at.is_some() {
            preferred.stopped_at = match (preferred.stopped_at, non_preferred.stopped_at) {
                (Some(preferred_stop), Some(other_stop)) => Some(preferred_stop.max(other_stop)),
                _ => None,
            };
        }

        for encounter in self.db.find_encounters_by_visit(&non_preferred.id)? {
            self.db
                .reassign_encounter(&encounter.id, &preferred.id, &preferred.patient_id)?;
        }

        let reason = format!("merged into visit {}", preferred.id);
        non_preferred.voided = true;
        non_preferred.void_reason = Some(reason.clone());

        self.db.update_visit(preferred)?;
        self.db.void_visit(&non_preferred.id, &reason)?;
        log::info!("merged visit {} into {}", non_preferred.id, preferred.id);
        Ok(())
    }

    fn locations_compatible(&self, a: &Visit, b: &Visit) -> AdtResult<bool> {
        match (a.location_id.as_deref(), b.location_id.as_deref()) {
            (None, None) => Ok(true),
            (Some(_), None) | (None, Some(_)) => Ok(false),
            (Some(location_a), Some(location_b)) => {
                let resolver = LocationResolver::new(self.db);
                Ok(resolver.is_same_or_ancestor(location_a, location_b)?
                    || resolver.is_same_or_ancestor(location_b, location_a)?)
            }
        }
    }
}

/// Interval intersection with a missing stop read as "still running".
fn ranges_intersect(a: &Visit, b: &Visit) -> bool {
    let a_starts_in_time = b.stopped_at.map_or(true, |stop| a.started_at <= stop);
    let b_starts_in_time = a.stopped_at.map_or(true, |stop| b.started_at <= stop);
    a_starts_in_time && b_starts_in_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Encounter, Location, LocationTag, Patient};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn setup() -> (Database, Patient, Location) {
        let db = Database::open_in_memory().unwrap();
        let mut hospital = Location::new("General Hospital".into());
        hospital.tags.push(LocationTag::SupportsVisits);
        db.insert_location(&hospital).unwrap();
        let patient = Patient::new("John Smith".into());
        db.insert_patient(&patient).unwrap();
        (db, patient, hospital)
    }

    fn visit(patient: &Patient, location: &Location, start: DateTime<Utc>, stop: Option<DateTime<Utc>>) -> Visit {
        let mut visit = Visit::new(
            patient.id.clone(),
            Some(location.id.clone()),
            "hospital-visit".into(),
            start,
        );
        visit.stopped_at = stop;
        visit
    }

    #[test]
    fn test_disjoint_ranges_do_not_overlap() {
        let (db, patient, hospital) = setup();
        let merger = VisitMerger::new(&db);

        let a = visit(&patient, &hospital, ts(1, 0), Some(ts(2, 0)));
        let b = visit(&patient, &hospital, ts(3, 0), Some(ts(4, 0)));
        assert!(!merger.visits_overlap(&a, &b).unwrap());
        assert!(!merger.visits_overlap(&b, &a).unwrap());
    }

    #[test]
    fn test_open_visit_overlaps_every_later_range() {
        let (db, patient, hospital) = setup();
        let merger = VisitMerger::new(&db);

        let open = visit(&patient, &hospital, ts(1, 0), None);
        let later = visit(&patient, &hospital, ts(20, 0), Some(ts(21, 0)));
        assert!(merger.visits_overlap(&open, &later).unwrap());
        assert!(merger.visits_overlap(&later, &open).unwrap());
    }

    #[test]
    fn test_descendant_location_overlaps() {
        let (db, patient, hospital) = setup();
        let ward = Location::child_of("Ward A".into(), &hospital);
        db.insert_location(&ward).unwrap();
        let merger = VisitMerger::new(&db);

        let at_root = visit(&patient, &hospital, ts(1, 0), Some(ts(3, 0)));
        let at_ward = visit(&patient, &ward, ts(2, 0), Some(ts(4, 0)));
        assert!(merger.visits_overlap(&at_root, &at_ward).unwrap());
        assert!(merger.visits_overlap(&at_ward, &at_root).unwrap());
    }

    #[test]
    fn test_unrelated_locations_do_not_overlap() {
        let (db, patient, hospital) = setup();
        let clinic = Location::new("Satellite Clinic".into());
        db.insert_location(&clinic).unwrap();
        let merger = VisitMerger::new(&db);

        let a = visit(&patient, &hospital, ts(1, 0), Some(ts(3, 0)));
        let b = visit(&patient, &clinic, ts(2, 0), Some(ts(4, 0)));
        assert!(!merger.visits_overlap(&a, &b).unwrap());
    }

    #[test]
    fn test_merge_widens_window_and_moves_encounters() {
        let (db, patient, hospital) = setup();
        let other = Patient::new("J. Smith".into());
        db.insert_patient(&other).unwrap();

        let mut winner = visit(&patient, &hospital, ts(3, 0), Some(ts(5, 0)));
        let mut loser = visit(&other, &hospital, ts(1, 0), Some(ts(8, 0)));
        db.insert_visit(&winner).unwrap();
        db.insert_visit(&loser).unwrap();

        let encounter = Encounter::new(
            other.id.clone(),
            loser.id.clone(),
            hospital.id.clone(),
            "checkin".into(),
            ts(2, 0),
        );
        db.insert_encounter(&encounter).unwrap();

        let merger = VisitMerger::new(&db);
        merger.merge_visits(&mut winner, &mut loser).unwrap();

        let merged = db.get_visit(&winner.id).unwrap().unwrap();
        assert_eq!(merged.started_at, ts(1, 0));
        assert_eq!(merged.stopped_at, Some(ts(8, 0)));

        let moved = db.find_encounters_by_visit(&winner.id).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].patient_id, patient.id);

        let voided = db.get_visit(&loser.id).unwrap().unwrap();
        assert!(voided.voided);
        assert_eq!(
            voided.void_reason.as_deref(),
            Some(format!("merged into visit {}", winner.id).as_str())
        );
    }

    #[test]
    fn test_merge_with_open_loser_reopens_winner() {
        let (db, patient, hospital) = setup();
        let mut winner = visit(&patient, &hospital, ts(3, 0), Some(ts(5, 0)));
        let mut loser = visit(&patient, &hospital, ts(4, 0), None);
        db.insert_visit(&winner).unwrap();
        db.insert_visit(&loser).unwrap();

        let merger = VisitMerger::new(&db);
        merger.merge_visits(&mut winner, &mut loser).unwrap();
        assert!(winner.is_open());
    }

    #[test]
    fn test_open_winner_stays_open() {
        let (db, patient, hospital) = setup();
        let mut winner = visit(&patient, &hospital, ts(3, 0), None);
        let mut loser = visit(&patient, &hospital, ts(1, 0), Some(ts(4, 0)));
        db.insert_visit(&winner).unwrap();
        db.insert_visit(&loser).unwrap();

        let merger = VisitMerger::new(&db);
        merger.merge_visits(&mut winner, &mut loser).unwrap();
        assert!(winner.is_open());
        assert_eq!(winner.started_at, ts(1, 0));
    }

    #[test]
    fn test_merge_voided_loser_is_noop() {
        let (db, patient, hospital) = setup();
        let mut winner = visit(&patient, &hospital, ts(3, 0), Some(ts(5, 0)));
        let mut loser = visit(&patient, &hospital, ts(1, 0), Some(ts(4, 0)));
        loser.voided = true;
        db.insert_visit(&winner).unwrap();
        db.insert_visit(&loser).unwrap();

        let merger = VisitMerger::new(&db);
        merger.merge_visits(&mut winner, &mut loser).unwrap();

        let untouched = db.get_visit(&winner.id).unwrap().unwrap();
        assert_eq!(untouched.started_at, ts(3, 0));
    }
}
