//! Transient request values for the ADT operations.
//!
//! These are inputs that produce encounters; they are never persisted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Providers keyed by encounter role.
pub type ProviderMap = BTreeMap<String, BTreeSet<String>>;

/// The acting user on whose behalf an operation runs.
///
/// Passed explicitly into the operations that need it; the core never
/// consults ambient authentication state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorContext {
    /// User account of the actor
    pub user_id: String,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Request to check a patient in at a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckInRequest {
    pub patient_id: String,
    pub location_id: String,
    /// Defaults to now
    pub at: Option<DateTime<Utc>>,
    /// Role -> providers; an empty map defaults to the actor's sole provider
    pub providers: ProviderMap,
    /// Close any active visit first and open a fresh one
    pub new_visit: bool,
}

impl CheckInRequest {
    pub fn new(patient_id: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            location_id: location_id.into(),
            at: None,
            providers: ProviderMap::new(),
            new_visit: false,
        }
    }
}

/// Request to admit a patient as an inpatient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmissionRequest {
    pub patient_id: String,
    pub location_id: String,
    /// Defaults to now
    pub at: Option<DateTime<Utc>>,
    pub providers: ProviderMap,
}

/// Request to discharge an admitted patient from a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DischargeRequest {
    pub visit_id: String,
    pub location_id: String,
    /// Defaults to now
    pub at: Option<DateTime<Utc>>,
    pub providers: ProviderMap,
}

/// Request to transfer a patient within a visit.
///
/// Transfers do not require a prior admission; they may occur between
/// non-inpatient locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferRequest {
    pub visit_id: String,
    pub destination_id: String,
    /// Defaults to now
    pub at: Option<DateTime<Utc>>,
    pub providers: ProviderMap,
}

/// Build a provider map with a single role and provider.
pub fn single_provider(role: impl Into<String>, provider_id: impl Into<String>) -> ProviderMap {
    let mut providers = ProviderMap::new();
    providers
        .entry(role.into())
        .or_default()
        .insert(provider_id.into());
    providers
}
