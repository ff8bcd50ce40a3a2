//! SQLite schema definition.

/// Complete database schema for adtflow.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    attributes TEXT NOT NULL DEFAULT '{}',        -- JSON object of marker attributes
    voided INTEGER NOT NULL DEFAULT 0,
    void_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ============================================================================
-- Providers
-- ============================================================================

CREATE TABLE IF NOT EXISTS providers (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_providers_user ON providers(user_id);

-- ============================================================================
-- Locations
-- ============================================================================

CREATE TABLE IF NOT EXISTS locations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    parent_id TEXT REFERENCES locations(id),
    tags TEXT NOT NULL DEFAULT '[]'               -- JSON array of capability tags
);

CREATE INDEX IF NOT EXISTS idx_locations_parent ON locations(parent_id);

-- ============================================================================
-- Visits
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    location_id TEXT REFERENCES locations(id),
    visit_type TEXT NOT NULL,
    started_at TEXT NOT NULL,
    stopped_at TEXT,                              -- NULL while the visit is open
    voided INTEGER NOT NULL DEFAULT 0,
    void_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id);
CREATE INDEX IF NOT EXISTS idx_visits_open ON visits(patient_id) WHERE stopped_at IS NULL;

-- ============================================================================
-- Encounters
-- ============================================================================

CREATE TABLE IF NOT EXISTS encounters (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    visit_id TEXT NOT NULL REFERENCES visits(id),
    location_id TEXT NOT NULL REFERENCES locations(id),
    encounter_type TEXT NOT NULL,
    encounter_datetime TEXT NOT NULL,
    providers TEXT NOT NULL DEFAULT '[]',         -- JSON array of role/provider pairs
    voided INTEGER NOT NULL DEFAULT 0,
    void_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_encounters_patient ON encounters(patient_id);
CREATE INDEX IF NOT EXISTS idx_encounters_visit ON encounters(visit_id);
"#;
