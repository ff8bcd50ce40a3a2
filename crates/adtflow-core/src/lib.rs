//! Adtflow Core Library
//!
//! Visit lifecycle and Admission/Discharge/Transfer (ADT) management for a
//! hospital facility. A visit is the episode-of-care record grouping every
//! encounter of one patient presentation; this crate decides which visit an
//! event belongs to and keeps visit records consistent over time.
//!
//! # Architecture
//!
//! ```text
//!                    AdtService (per-patient critical sections)
//!                      │                          │
//!                AdtWorkflow              PatientMergeCoordinator
//!               (check-in/admit/            (two-pass history
//!              discharge/transfer)           reconciliation)
//!                      │                          │
//!               ActiveVisitFinder            VisitMerger
//!                      │                          │
//!               ActivityEvaluator                 │
//!                      └───────┬──────────────────┘
//!                      LocationResolver
//!                              │
//!                       Database (SQLite)
//! ```
//!
//! # Core Principle
//!
//! **Visits are never hard-deleted.** Stale visits are closed, superseded
//! visits are voided with an audit reason, and every encounter survives a
//! merge, so interrupted maintenance can always be re-run.
//!
//! # Modules
//!
//! - [`db`]: SQLite store for patients, providers, locations, visits, encounters
//! - [`models`]: Domain types (Visit, Encounter, Location, etc.)
//! - [`config`]: Encounter-type identifiers and policy knobs
//! - [`hierarchy`]: Location-tree capability resolution
//! - [`activity`]: Visit staleness/admission rules
//! - [`finder`]: Active-visit lookup with lazy close
//! - [`merge`]: Visit overlap detection and merging
//! - [`patient_merge`]: Patient identity merge orchestration
//! - [`workflow`]: The four ADT operations

pub mod activity;
pub mod config;
pub mod db;
pub mod finder;
pub mod hierarchy;
pub mod merge;
pub mod models;
pub mod patient_merge;
pub mod workflow;

// Re-export commonly used types
pub use activity::ActivityEvaluator;
pub use config::{AdtConfig, DEFAULT_VISIT_EXPIRE_HOURS};
pub use db::Database;
pub use finder::{ActiveVisitFinder, SweepOutcome};
pub use hierarchy::LocationResolver;
pub use merge::VisitMerger;
pub use models::{
    ActorContext, AdmissionRequest, CheckInRequest, DischargeRequest, Encounter, Location,
    LocationTag, Patient, Provider, TransferRequest, Visit,
};
pub use patient_merge::{PatientMergeCoordinator, PatientMergeHook};
pub use workflow::AdtWorkflow;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

// =========================================================================
// Error Taxonomy
// =========================================================================

/// Errors surfaced by the ADT core.
///
/// All of these are raised synchronously to the immediate caller; nothing is
/// swallowed or retried internally. The one exception is the batch
/// close-inactive sweep, which logs per-visit failures and continues.
#[derive(Debug, thiserror::Error)]
pub enum AdtError {
    /// Missing or malformed caller input; never retried automatically.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Required encounter/visit type not configured; operator-fixable.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    /// The location hierarchy has no tagged ancestor for this lookup.
    #[error("no location tagged '{tag}' at or above location {location_id}")]
    NoSuitableLocation {
        location_id: String,
        tag: LocationTag,
    },

    /// The location hierarchy contains a cycle and is malformed.
    #[error("cycle in location hierarchy at {0}")]
    CyclicHierarchy(String),

    /// The visit already has an open admission.
    #[error("visit {0} already has an open admission")]
    AlreadyAdmitted(String),

    /// The visit has no open admission to act on.
    #[error("visit {0} has no open admission")]
    NotAdmitted(String),

    /// The transfer destination is where the patient already is.
    #[error("patient is already at location {0}")]
    PatientAlreadyAtLocation(String),

    /// The requested timestamp falls outside the visit's bounds.
    #[error("{operation} time {when} is outside the window of visit {visit_id}")]
    OutsideVisitWindow {
        operation: &'static str,
        when: DateTime<Utc>,
        visit_id: String,
    },

    /// The acting user maps to zero or several provider records.
    #[error("expected exactly one provider for user {user_id}, found {count}")]
    AmbiguousOrMissingProvider { user_id: String, count: usize },

    /// The underlying identity merge failed; not auto-retried because visit
    /// reconciliation side effects have already been committed.
    #[error("patient identity merge failed: {0}")]
    MergeFailed(String),

    /// A registered patient-merge hook rejected the merge.
    #[error("patient merge hook failed: {0}")]
    MergeHook(#[source] anyhow::Error),

    /// A referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Database(#[from] db::DbError),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type AdtResult<T> = Result<T, AdtError>;

impl<T> From<std::sync::PoisonError<T>> for AdtError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        AdtError::LockPoisoned(err.to_string())
    }
}

// =========================================================================
// Service Facade
// =========================================================================

/// Thread-safe entry point for the ADT operations.
///
/// Mutating operations are serialized per patient: two concurrent check-ins
/// for the same patient cannot both observe "no active visit" and each open
/// one. Admit, discharge, transfer, and patient merge follow the same
/// discipline since they share the resolve-then-mutate shape.
pub struct AdtService {
    db: Arc<Mutex<Database>>,
    config: AdtConfig,
    merge_hooks: Vec<Arc<dyn PatientMergeHook>>,
    patient_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AdtService {
    /// Create a service over an opened database.
    pub fn new(db: Database, config: AdtConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            merge_hooks: Vec::new(),
            patient_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a patient-merge hook. Hooks run in registration order.
    pub fn with_merge_hook(mut self, hook: Arc<dyn PatientMergeHook>) -> Self {
        self.merge_hooks.push(hook);
        self
    }

    /// Shared handle to the underlying store.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }

    /// Check a patient in at a location.
    pub fn check_in(&self, actor: &ActorContext, request: &CheckInRequest) -> AdtResult<Encounter> {
        let lock = self.patient_lock(&request.patient_id)?;
        let _guard = lock.lock()?;
        let db = self.db.lock()?;
        AdtWorkflow::new(&db, &self.config).check_in(actor, request)
    }

    /// Admit a patient as an inpatient.
    pub fn admit(&self, request: &AdmissionRequest) -> AdtResult<Encounter> {
        let lock = self.patient_lock(&request.patient_id)?;
        let _guard = lock.lock()?;
        let db = self.db.lock()?;
        AdtWorkflow::new(&db, &self.config).admit(request)
    }

    /// Discharge an admitted patient.
    pub fn discharge(&self, request: &DischargeRequest) -> AdtResult<Encounter> {
        let patient_id = self.visit_patient(&request.visit_id)?;
        let lock = self.patient_lock(&patient_id)?;
        let _guard = lock.lock()?;
        let db = self.db.lock()?;
        AdtWorkflow::new(&db, &self.config).discharge(request)
    }

    /// Transfer a patient within a visit.
    pub fn transfer(&self, request: &TransferRequest) -> AdtResult<Encounter> {
        let patient_id = self.visit_patient(&request.visit_id)?;
        let lock = self.patient_lock(&patient_id)?;
        let _guard = lock.lock()?;
        let db = self.db.lock()?;
        AdtWorkflow::new(&db, &self.config).transfer(request)
    }

    /// Find the patient's active visit at a location, if any.
    pub fn find_active_visit(
        &self,
        patient_id: &str,
        location_id: &str,
    ) -> AdtResult<Option<Visit>> {
        let lock = self.patient_lock(patient_id)?;
        let _guard = lock.lock()?;
        let db = self.db.lock()?;
        ActiveVisitFinder::new(&db, &self.config).find_active(patient_id, location_id, Utc::now())
    }

    /// Find or open the patient's active visit at a location.
    pub fn ensure_active_visit(&self, patient_id: &str, location_id: &str) -> AdtResult<Visit> {
        let lock = self.patient_lock(patient_id)?;
        let _guard = lock.lock()?;
        let db = self.db.lock()?;
        ActiveVisitFinder::new(&db, &self.config).ensure_active(patient_id, location_id, Utc::now())
    }

    /// Close every open visit that is no longer active.
    pub fn close_inactive_visits(&self) -> AdtResult<SweepOutcome> {
        let db = self.db.lock()?;
        ActiveVisitFinder::new(&db, &self.config).close_inactive_visits(Utc::now())
    }

    /// Merge `not_preferred`'s identity and visit history into `preferred`.
    pub fn merge_patients(&self, preferred_id: &str, not_preferred_id: &str) -> AdtResult<Patient> {
        if preferred_id == not_preferred_id {
            return Err(AdtError::InvalidArgument(
                "cannot merge a patient into itself".into(),
            ));
        }

        // Lock both patients in id order so concurrent merges cannot deadlock.
        let (first, second) = if preferred_id <= not_preferred_id {
            (preferred_id, not_preferred_id)
        } else {
            (not_preferred_id, preferred_id)
        };
        let first_lock = self.patient_lock(first)?;
        let _first_guard = first_lock.lock()?;
        let second_lock = self.patient_lock(second)?;
        let _second_guard = second_lock.lock()?;

        let db = self.db.lock()?;
        PatientMergeCoordinator::new(&db, &self.config, &self.merge_hooks)
            .merge_patients(preferred_id, not_preferred_id)
    }

    fn patient_lock(&self, patient_id: &str) -> AdtResult<Arc<Mutex<()>>> {
        let mut locks = self.patient_locks.lock()?;
        Ok(locks
            .entry(patient_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn visit_patient(&self, visit_id: &str) -> AdtResult<String> {
        let db = self.db.lock()?;
        let visit = db
            .get_visit(visit_id)?
            .ok_or_else(|| AdtError::NotFound(format!("visit {visit_id}")))?;
        Ok(visit.patient_id)
    }
}
