//! ADT check-in, admission, discharge, and transfer operations.
//!
//! Each operation validates its preconditions against the visit state
//! machine, then produces one encounter of the configured type. Callers are
//! expected to serialize operations per patient (see `AdtService`); a naive
//! check-then-create without that discipline can open duplicate visits.

use chrono::{DateTime, Utc};

use crate::activity::ActivityEvaluator;
use crate::config::AdtConfig;
use crate::db::Database;
use crate::finder::ActiveVisitFinder;
use crate::hierarchy::LocationResolver;
use crate::models::{
    ActorContext, AdmissionRequest, CheckInRequest, DischargeRequest, Encounter,
    ProviderAssignment, ProviderMap, TransferRequest, Visit,
};
use crate::{AdtError, AdtResult};

/// The check-in / admit / discharge / transfer state machine over one visit.
pub struct AdtWorkflow<'a> {
    db: &'a Database,
    config: &'a AdtConfig,
}

impl<'a> AdtWorkflow<'a> {
    /// Create a new workflow.
    pub fn new(db: &'a Database, config: &'a AdtConfig) -> Self {
        Self { db, config }
    }

    /// Check a patient in at a location, reusing or opening the active visit.
    ///
    /// Submitting the same check-in twice returns the first encounter
    /// unchanged instead of creating a duplicate, which makes caller-side
    /// retries safe.
    pub fn check_in(&self, actor: &ActorContext, request: &CheckInRequest) -> AdtResult<Encounter> {
        let encounter_type =
            require_type(&self.config.checkin_encounter_type, "checkin encounter type")?;
        let now = request.at.unwrap_or_else(Utc::now);
        let finder = ActiveVisitFinder::new(self.db, self.config);

        if request.new_visit {
            if let Some(mut active) =
                finder.find_active(&request.patient_id, &request.location_id, now)?
            {
                active.close(now);
                self.db.update_visit(&active)?;
                log::info!("closed visit {} for fresh check-in", active.id);
            }
        }

        let visit = finder.ensure_active(&request.patient_id, &request.location_id, now)?;

        // Duplicate-submission guard.
        let encounters = self.db.find_encounters_by_patient(&request.patient_id)?;
        if let Some(last) = encounters.last() {
            if last.encounter_type == encounter_type
                && last.visit_id == visit.id
                && last.location_id == request.location_id
            {
                return Ok(last.clone());
            }
        }

        let providers = self.resolve_providers(actor, &request.providers)?;
        let mut encounter = Encounter::new(
            request.patient_id.clone(),
            visit.id.clone(),
            request.location_id.clone(),
            encounter_type.to_string(),
            now,
        );
        encounter.providers = providers;
        self.db.insert_encounter(&encounter)?;
        log::info!(
            "checked in patient {} at {} (visit {})",
            request.patient_id,
            request.location_id,
            visit.id
        );
        Ok(encounter)
    }

    /// Admit a patient, resolving or opening the active visit first.
    pub fn admit(&self, request: &AdmissionRequest) -> AdtResult<Encounter> {
        if request.patient_id.is_empty() {
            return Err(AdtError::InvalidArgument("admission requires a patient".into()));
        }
        if request.location_id.is_empty() {
            return Err(AdtError::InvalidArgument("admission requires a location".into()));
        }
        require_providers(&request.providers, "admission")?;

        let now = request.at.unwrap_or_else(Utc::now);
        let finder = ActiveVisitFinder::new(self.db, self.config);
        let visit = finder.ensure_active(&request.patient_id, &request.location_id, now)?;

        let evaluator = ActivityEvaluator::new(self.db, self.config);
        if evaluator.is_admitted(&visit)? {
            return Err(AdtError::AlreadyAdmitted(visit.id));
        }
        if let Some(stop) = visit.stopped_at {
            if now > stop {
                return Err(AdtError::InvalidArgument(format!(
                    "admission time {now} is after visit {} stopped",
                    visit.id
                )));
            }
        }

        let admission_location =
            LocationResolver::new(self.db).resolve_admission_location(&request.location_id)?;
        let encounter_type = require_type(
            &self.config.admission_encounter_type,
            "admission encounter type",
        )?;

        let mut encounter = Encounter::new(
            request.patient_id.clone(),
            visit.id.clone(),
            admission_location.id,
            encounter_type.to_string(),
            now,
        );
        encounter.providers = flatten_providers(&request.providers);
        self.db.insert_encounter(&encounter)?;
        log::info!(
            "admitted patient {} to {} (visit {})",
            request.patient_id,
            encounter.location_id,
            visit.id
        );
        Ok(encounter)
    }

    /// Discharge an admitted patient from a visit.
    pub fn discharge(&self, request: &DischargeRequest) -> AdtResult<Encounter> {
        if request.visit_id.is_empty() {
            return Err(AdtError::InvalidArgument("discharge requires a visit".into()));
        }
        if request.location_id.is_empty() {
            return Err(AdtError::InvalidArgument("discharge requires a location".into()));
        }
        require_providers(&request.providers, "discharge")?;

        let visit = self.fetch_visit(&request.visit_id)?;
        let evaluator = ActivityEvaluator::new(self.db, self.config);
        if !evaluator.is_admitted(&visit)? {
            return Err(AdtError::NotAdmitted(visit.id));
        }

        let now = request.at.unwrap_or_else(Utc::now);
        ensure_within_window(&visit, now, "discharge")?;
        let encounter_type = require_type(
            &self.config.discharge_encounter_type,
            "discharge encounter type",
        )?;

        let mut encounter = Encounter::new(
            visit.patient_id.clone(),
            visit.id.clone(),
            request.location_id.clone(),
            encounter_type.to_string(),
            now,
        );
        encounter.providers = flatten_providers(&request.providers);
        self.db.insert_encounter(&encounter)?;
        log::info!("discharged patient {} (visit {})", visit.patient_id, visit.id);
        Ok(encounter)
    }

    /// Transfer a patient to another location within a visit.
    ///
    /// Transfers do not require a prior admission; they may occur between
    /// non-inpatient locations.
    pub fn transfer(&self, request: &TransferRequest) -> AdtResult<Encounter> {
        if request.visit_id.is_empty() {
            return Err(AdtError::InvalidArgument("transfer requires a visit".into()));
        }
        if request.destination_id.is_empty() {
            return Err(AdtError::InvalidArgument("transfer requires a destination".into()));
        }
        require_providers(&request.providers, "transfer")?;

        let visit = self.fetch_visit(&request.visit_id)?;
        let now = request.at.unwrap_or_else(Utc::now);
        ensure_within_window(&visit, now, "transfer")?;

        if self.current_adt_location(&visit)?.as_deref() == Some(request.destination_id.as_str()) {
            return Err(AdtError::PatientAlreadyAtLocation(
                request.destination_id.clone(),
            ));
        }
        let encounter_type = require_type(
            &self.config.transfer_encounter_type,
            "transfer encounter type",
        )?;

        let mut encounter = Encounter::new(
            visit.patient_id.clone(),
            visit.id.clone(),
            request.destination_id.clone(),
            encounter_type.to_string(),
            now,
        );
        encounter.providers = flatten_providers(&request.providers);
        self.db.insert_encounter(&encounter)?;
        log::info!(
            "transferred patient {} to {} (visit {})",
            visit.patient_id,
            request.destination_id,
            visit.id
        );
        Ok(encounter)
    }

    /// Use the supplied provider map, or default to the acting user's sole
    /// provider record under the configured check-in role.
    fn resolve_providers(
        &self,
        actor: &ActorContext,
        providers: &ProviderMap,
    ) -> AdtResult<Vec<ProviderAssignment>> {
        if providers.values().any(|set| !set.is_empty()) {
            return Ok(flatten_providers(providers));
        }

        let candidates = self.db.find_providers_by_user(&actor.user_id)?;
        if candidates.len() != 1 {
            return Err(AdtError::AmbiguousOrMissingProvider {
                user_id: actor.user_id.clone(),
                count: candidates.len(),
            });
        }
        Ok(vec![ProviderAssignment {
            role: self.config.checkin_encounter_role.clone(),
            provider_id: candidates[0].id.clone(),
        }])
    }

    /// Location of the visit's most recent admission or transfer encounter.
    fn current_adt_location(&self, visit: &Visit) -> AdtResult<Option<String>> {
        let encounters = self.db.find_encounters_by_visit(&visit.id)?;
        Ok(encounters
            .iter()
            .rev()
            .find(|encounter| {
                encounter.is_type(self.config.admission_encounter_type.as_deref())
                    || encounter.is_type(self.config.transfer_encounter_type.as_deref())
            })
            .map(|encounter| encounter.location_id.clone()))
    }

    fn fetch_visit(&self, visit_id: &str) -> AdtResult<Visit> {
        self.db
            .get_visit(visit_id)?
            .ok_or_else(|| AdtError::NotFound(format!("visit {visit_id}")))
    }
}

fn require_type<'c>(value: &'c Option<String>, name: &'static str) -> AdtResult<&'c str> {
    value.as_deref().ok_or(AdtError::ConfigurationMissing(name))
}

fn require_providers(providers: &ProviderMap, operation: &str) -> AdtResult<()> {
    if providers.values().any(|set| !set.is_empty()) {
        Ok(())
    } else {
        Err(AdtError::InvalidArgument(format!(
            "{operation} requires at least one provider"
        )))
    }
}

fn ensure_within_window(visit: &Visit, when: DateTime<Utc>, operation: &'static str) -> AdtResult<()> {
    if visit.contains(when) {
        Ok(())
    } else {
        Err(AdtError::OutsideVisitWindow {
            operation,
            when,
            visit_id: visit.id.clone(),
        })
    }
}

fn flatten_providers(providers: &ProviderMap) -> Vec<ProviderAssignment> {
    providers
        .iter()
        .flat_map(|(role, provider_ids)| {
            provider_ids.iter().map(|provider_id| ProviderAssignment {
                role: role.clone(),
                provider_id: provider_id.clone(),
            })
        })
        .collect()
}
