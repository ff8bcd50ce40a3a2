//! End-to-end tests for patient merging and visit reconciliation.

use adtflow_core::{
    AdtConfig, AdtService, Database, Encounter, Location, LocationTag, Patient, Visit, VisitMerger,
};
use chrono::{DateTime, TimeZone, Utc};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config() -> AdtConfig {
    AdtConfig {
        visit_type: "hospital-visit".into(),
        unknown_patient_attribute: "unknown-patient".into(),
        ..AdtConfig::default()
    }
}

fn jan(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

fn setup() -> (Database, Location) {
    init_logging();
    let db = Database::open_in_memory().unwrap();
    let mut ward = Location::new("Ward X".into());
    ward.tags.push(LocationTag::SupportsVisits);
    db.insert_location(&ward).unwrap();
    (db, ward)
}

fn insert_patient(db: &Database, name: &str) -> Patient {
    let patient = Patient::new(name.into());
    db.insert_patient(&patient).unwrap();
    patient
}

fn insert_visit(
    db: &Database,
    patient: &Patient,
    ward: &Location,
    start: DateTime<Utc>,
    stop: Option<DateTime<Utc>>,
) -> Visit {
    let mut visit = Visit::new(
        patient.id.clone(),
        Some(ward.id.clone()),
        "hospital-visit".into(),
        start,
    );
    visit.stopped_at = stop;
    db.insert_visit(&visit).unwrap();
    visit
}

fn insert_encounter(db: &Database, visit: &Visit, at: DateTime<Utc>) -> Encounter {
    let encounter = Encounter::new(
        visit.patient_id.clone(),
        visit.id.clone(),
        visit.location_id.clone().unwrap(),
        "checkin".into(),
        at,
    );
    db.insert_encounter(&encounter).unwrap();
    encounter
}

/// Overlapping visits from the two patients collapse into one window holding
/// the union of their encounters, with the losing visit voided and its audit
/// reason naming the winner.
#[test]
fn overlapping_histories_collapse() {
    let (db, ward) = setup();

    let preferred = insert_patient(&db, "John Smith");
    let kept = insert_visit(&db, &preferred, &ward, jan(1, 0), Some(jan(5, 0)));
    insert_encounter(&db, &kept, jan(2, 0));

    let other = insert_patient(&db, "J. Smith");
    let absorbed = insert_visit(&db, &other, &ward, jan(3, 0), Some(jan(8, 0)));
    insert_encounter(&db, &absorbed, jan(4, 0));
    insert_encounter(&db, &absorbed, jan(7, 0));

    let service = AdtService::new(db, test_config());
    service.merge_patients(&preferred.id, &other.id).unwrap();

    let db = service.database();
    let db = db.lock().unwrap();

    let visits = db.find_visits_by_patient(&preferred.id).unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].id, kept.id);
    assert_eq!(visits[0].started_at, jan(1, 0));
    assert_eq!(visits[0].stopped_at, Some(jan(8, 0)));

    let encounters = db.find_encounters_by_visit(&kept.id).unwrap();
    assert_eq!(encounters.len(), 3);
    assert!(encounters
        .iter()
        .all(|encounter| encounter.patient_id == preferred.id));

    let voided = db.get_visit(&absorbed.id).unwrap().unwrap();
    assert!(voided.voided);
    assert_eq!(
        voided.void_reason.as_deref(),
        Some(format!("merged into visit {}", kept.id).as_str())
    );
}

/// No encounter is lost or duplicated by a merge: the winner ends up holding
/// exactly the two histories' worth.
#[test]
fn merge_preserves_total_encounter_count() {
    let (db, ward) = setup();

    let preferred = insert_patient(&db, "John Smith");
    let winner = insert_visit(&db, &preferred, &ward, jan(1, 0), Some(jan(5, 0)));
    insert_encounter(&db, &winner, jan(1, 6));
    insert_encounter(&db, &winner, jan(2, 6));

    let other = insert_patient(&db, "J. Smith");
    let loser = insert_visit(&db, &other, &ward, jan(2, 0), Some(jan(6, 0)));
    insert_encounter(&db, &loser, jan(3, 6));

    let before = db.find_encounters_by_visit(&winner.id).unwrap().len()
        + db.find_encounters_by_visit(&loser.id).unwrap().len();

    let service = AdtService::new(db, test_config());
    service.merge_patients(&preferred.id, &other.id).unwrap();

    let db = service.database();
    let db = db.lock().unwrap();
    assert_eq!(db.find_encounters_by_visit(&winner.id).unwrap().len(), before);
    assert!(db.find_encounters_by_visit(&loser.id).unwrap().is_empty());
}

/// Re-running a merge against an already-voided loser changes nothing.
#[test]
fn merge_rerun_is_noop() {
    let (db, ward) = setup();

    let patient = insert_patient(&db, "John Smith");
    let mut winner = insert_visit(&db, &patient, &ward, jan(3, 0), Some(jan(5, 0)));
    let mut loser = insert_visit(&db, &patient, &ward, jan(1, 0), Some(jan(4, 0)));
    insert_encounter(&db, &loser, jan(2, 0));

    let merger = VisitMerger::new(&db);
    merger.merge_visits(&mut winner, &mut loser).unwrap();
    let after_first = db.get_visit(&winner.id).unwrap().unwrap();
    let count_after_first = db.find_encounters_by_visit(&winner.id).unwrap().len();

    merger.merge_visits(&mut winner, &mut loser).unwrap();
    assert_eq!(db.get_visit(&winner.id).unwrap().unwrap(), after_first);
    assert_eq!(
        db.find_encounters_by_visit(&winner.id).unwrap().len(),
        count_after_first
    );
}

/// Two visits of the preferred patient that never overlapped each other are
/// pulled together once an absorbed visit bridges them.
#[test]
fn bridging_visit_triggers_second_pass() {
    let (db, ward) = setup();

    let preferred = insert_patient(&db, "John Smith");
    let early = insert_visit(&db, &preferred, &ward, jan(1, 0), Some(jan(2, 0)));
    let late = insert_visit(&db, &preferred, &ward, jan(6, 0), Some(jan(7, 0)));

    let other = insert_patient(&db, "J. Smith");
    insert_visit(&db, &other, &ward, jan(1, 12), Some(jan(6, 12)));

    let service = AdtService::new(db, test_config());
    service.merge_patients(&preferred.id, &other.id).unwrap();

    let db = service.database();
    let db = db.lock().unwrap();
    let visits = db.find_visits_by_patient(&preferred.id).unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].id, early.id);
    assert_eq!(visits[0].started_at, jan(1, 0));
    assert_eq!(visits[0].stopped_at, Some(jan(7, 0)));

    let late = db.get_visit(&late.id).unwrap().unwrap();
    assert!(late.voided);
}

/// Disjoint histories merge identities without touching visit windows; the
/// losing patient's visits simply move over.
#[test]
fn disjoint_histories_move_unchanged() {
    let (db, ward) = setup();

    let preferred = insert_patient(&db, "John Smith");
    let first = insert_visit(&db, &preferred, &ward, jan(1, 0), Some(jan(2, 0)));

    let other = insert_patient(&db, "J. Smith");
    let second = insert_visit(&db, &other, &ward, jan(10, 0), Some(jan(11, 0)));

    let service = AdtService::new(db, test_config());
    service.merge_patients(&preferred.id, &other.id).unwrap();

    let db = service.database();
    let db = db.lock().unwrap();
    let visits = db.find_visits_by_patient(&preferred.id).unwrap();
    assert_eq!(visits.len(), 2);
    assert!(visits.iter().any(|v| v.id == first.id));
    let moved = visits.iter().find(|v| v.id == second.id).unwrap();
    assert_eq!(moved.started_at, jan(10, 0));
    assert_eq!(moved.stopped_at, Some(jan(11, 0)));

    let merged_away = db.get_patient(&other.id).unwrap().unwrap();
    assert!(merged_away.voided);
}
