//! Encounter store operations.

use rusqlite::{params, Row};

use super::{ts_from_sql, ts_to_sql, Database, DbError, DbResult};
use crate::models::{Encounter, ProviderAssignment};

const ENCOUNTER_COLUMNS: &str = "id, patient_id, visit_id, location_id, encounter_type, \
     encounter_datetime, providers, voided, void_reason";

struct EncounterRow {
    id: String,
    patient_id: String,
    visit_id: String,
    location_id: String,
    encounter_type: String,
    encounter_datetime: String,
    providers: String,
    voided: bool,
    void_reason: Option<String>,
}

impl EncounterRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            visit_id: row.get(2)?,
            location_id: row.get(3)?,
            encounter_type: row.get(4)?,
            encounter_datetime: row.get(5)?,
            providers: row.get(6)?,
            voided: row.get(7)?,
            void_reason: row.get(8)?,
        })
    }
}

impl TryFrom<EncounterRow> for Encounter {
    type Error = DbError;

    fn try_from(row: EncounterRow) -> DbResult<Self> {
        let providers: Vec<ProviderAssignment> = serde_json::from_str(&row.providers)?;
        Ok(Encounter {
            id: row.id,
            patient_id: row.patient_id,
            visit_id: row.visit_id,
            location_id: row.location_id,
            encounter_type: row.encounter_type,
            encounter_datetime: ts_from_sql("encounter_datetime", row.encounter_datetime)?,
            providers,
            voided: row.voided,
            void_reason: row.void_reason,
        })
    }
}

impl Database {
    /// Insert a new encounter.
    pub fn insert_encounter(&self, encounter: &Encounter) -> DbResult<()> {
        let providers_json = serde_json::to_string(&encounter.providers)?;
        self.conn.execute(
            &format!(
                "INSERT INTO encounters ({ENCOUNTER_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                encounter.id,
                encounter.patient_id,
                encounter.visit_id,
                encounter.location_id,
                encounter.encounter_type,
                ts_to_sql(encounter.encounter_datetime),
                providers_json,
                encounter.voided,
                encounter.void_reason,
            ],
        )?;
        Ok(())
    }

    /// Non-voided encounters for a patient, oldest first.
    ///
    /// "The patient's last encounter" is the last element.
    pub fn find_encounters_by_patient(&self, patient_id: &str) -> DbResult<Vec<Encounter>> {
        self.query_encounters(
            &format!(
                "SELECT {ENCOUNTER_COLUMNS} FROM encounters \
                 WHERE patient_id = ? AND voided = 0 \
                 ORDER BY encounter_datetime, rowid"
            ),
            patient_id,
        )
    }

    /// Non-voided encounters belonging to a visit, oldest first.
    pub fn find_encounters_by_visit(&self, visit_id: &str) -> DbResult<Vec<Encounter>> {
        self.query_encounters(
            &format!(
                "SELECT {ENCOUNTER_COLUMNS} FROM encounters \
                 WHERE visit_id = ? AND voided = 0 \
                 ORDER BY encounter_datetime, rowid"
            ),
            visit_id,
        )
    }

    /// Move an encounter to a different visit and patient.
    ///
    /// An encounter belongs to exactly one visit; this is the ownership
    /// transfer used when visits merge.
    pub fn reassign_encounter(
        &self,
        encounter_id: &str,
        visit_id: &str,
        patient_id: &str,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE encounters SET visit_id = ?2, patient_id = ?3 WHERE id = ?1",
            params![encounter_id, visit_id, patient_id],
        )?;
        Ok(rows_affected > 0)
    }

    fn query_encounters(&self, sql: &str, key: &str) -> DbResult<Vec<Encounter>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([key], EncounterRow::read)?;

        let mut encounters = Vec::new();
        for row in rows {
            encounters.push(row?.try_into()?);
        }
        Ok(encounters)
    }
}
