//! Visit activity evaluation.
//!
//! Patients routinely leave without a formal checkout, so a visit with no
//! recent activity and no open admission is presumed abandoned.

use chrono::{DateTime, Utc};

use crate::config::AdtConfig;
use crate::db::Database;
use crate::models::{Encounter, Visit};
use crate::AdtResult;

/// Decides whether a visit is still treated as ongoing.
pub struct ActivityEvaluator<'a> {
    db: &'a Database,
    config: &'a AdtConfig,
}

impl<'a> ActivityEvaluator<'a> {
    /// Create a new evaluator.
    pub fn new(db: &'a Database, config: &'a AdtConfig) -> Self {
        Self { db, config }
    }

    /// Evaluate the activity rules in order; the first match wins:
    ///
    /// 1. a stopped visit is not active;
    /// 2. an admitted visit is active regardless of age;
    /// 3. a visit started within the staleness window is active;
    /// 4. a visit with an encounter within the staleness window is active;
    /// 5. anything else is not.
    pub fn is_active(&self, visit: &Visit, now: DateTime<Utc>) -> AdtResult<bool> {
        if visit.stopped_at.is_some() {
            return Ok(false);
        }

        let encounters = self.db.find_encounters_by_visit(&visit.id)?;
        if self.is_admitted_among(&encounters) {
            return Ok(true);
        }

        let threshold = self.config.staleness_threshold(now);
        if visit.started_at >= threshold {
            return Ok(true);
        }
        Ok(encounters
            .iter()
            .any(|encounter| encounter.encounter_datetime >= threshold))
    }

    /// Whether the visit has an admission with no later discharge.
    pub fn is_admitted(&self, visit: &Visit) -> AdtResult<bool> {
        let encounters = self.db.find_encounters_by_visit(&visit.id)?;
        Ok(self.is_admitted_among(&encounters))
    }

    /// Fold the admitted state over encounters ordered oldest first.
    fn is_admitted_among(&self, encounters: &[Encounter]) -> bool {
        let mut admitted = false;
        for encounter in encounters {
            if encounter.is_type(self.config.admission_encounter_type.as_deref()) {
                admitted = true;
            } else if encounter.is_type(self.config.discharge_encounter_type.as_deref()) {
                admitted = false;
            }
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;
    use chrono::{Duration, TimeZone};

    fn test_config() -> AdtConfig {
        AdtConfig {
            visit_type: "hospital-visit".into(),
            checkin_encounter_type: Some("checkin".into()),
            admission_encounter_type: Some("admission".into()),
            discharge_encounter_type: Some("discharge".into()),
            transfer_encounter_type: Some("transfer".into()),
            visit_expire_hours: 10,
            ..AdtConfig::default()
        }
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn setup() -> (Database, AdtConfig, Visit) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("John Smith".into());
        db.insert_patient(&patient).unwrap();
        let visit = Visit::new(patient.id, None, "hospital-visit".into(), ts(1, 8));
        db.insert_visit(&visit).unwrap();
        (db, test_config(), visit)
    }

    fn add_encounter(db: &Database, visit: &Visit, encounter_type: &str, at: DateTime<Utc>) {
        let encounter = Encounter::new(
            visit.patient_id.clone(),
            visit.id.clone(),
            "ward-a".into(),
            encounter_type.into(),
            at,
        );
        db.insert_encounter(&encounter).unwrap();
    }

    #[test]
    fn test_stopped_visit_is_not_active() {
        let (db, config, mut visit) = setup();
        visit.close(ts(1, 12));
        db.update_visit(&visit).unwrap();

        // Even a freshly stopped visit is inactive.
        let evaluator = ActivityEvaluator::new(&db, &config);
        assert!(!evaluator.is_active(&visit, ts(1, 12)).unwrap());
    }

    #[test]
    fn test_recent_start_is_active() {
        let (db, config, visit) = setup();
        let evaluator = ActivityEvaluator::new(&db, &config);

        assert!(evaluator.is_active(&visit, ts(1, 17)).unwrap());
        // 10-hour window exceeded with no encounters
        assert!(!evaluator.is_active(&visit, ts(2, 8)).unwrap());
    }

    #[test]
    fn test_recent_encounter_keeps_visit_active() {
        let (db, config, visit) = setup();
        add_encounter(&db, &visit, "checkin", ts(3, 8));

        let evaluator = ActivityEvaluator::new(&db, &config);
        assert!(evaluator.is_active(&visit, ts(3, 12)).unwrap());
        assert!(!evaluator.is_active(&visit, ts(4, 8)).unwrap());
    }

    #[test]
    fn test_admitted_visit_never_goes_stale() {
        let (db, config, visit) = setup();
        add_encounter(&db, &visit, "admission", ts(1, 9));

        let evaluator = ActivityEvaluator::new(&db, &config);
        assert!(evaluator.is_admitted(&visit).unwrap());
        assert!(evaluator
            .is_active(&visit, ts(1, 9) + Duration::days(30))
            .unwrap());
    }

    #[test]
    fn test_discharge_closes_admitted_state() {
        let (db, config, visit) = setup();
        add_encounter(&db, &visit, "admission", ts(1, 9));
        add_encounter(&db, &visit, "discharge", ts(2, 9));

        let evaluator = ActivityEvaluator::new(&db, &config);
        assert!(!evaluator.is_admitted(&visit).unwrap());
        assert!(!evaluator.is_active(&visit, ts(4, 8)).unwrap());
    }

    #[test]
    fn test_readmission_after_discharge() {
        let (db, config, visit) = setup();
        add_encounter(&db, &visit, "admission", ts(1, 9));
        add_encounter(&db, &visit, "discharge", ts(2, 9));
        add_encounter(&db, &visit, "admission", ts(2, 18));

        let evaluator = ActivityEvaluator::new(&db, &config);
        assert!(evaluator.is_admitted(&visit).unwrap());
    }
}
