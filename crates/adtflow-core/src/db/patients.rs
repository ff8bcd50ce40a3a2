//! Patient store operations.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{ts_from_sql, ts_to_sql, Database, DbError, DbResult};
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "id, name, attributes, voided, void_reason, created_at, updated_at";

struct PatientRow {
    id: String,
    name: String,
    attributes: String,
    voided: bool,
    void_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            attributes: row.get(2)?,
            voided: row.get(3)?,
            void_reason: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> DbResult<Self> {
        let attributes: BTreeMap<String, String> = serde_json::from_str(&row.attributes)?;
        Ok(Patient {
            id: row.id,
            name: row.name,
            attributes,
            voided: row.voided,
            void_reason: row.void_reason,
            created_at: ts_from_sql("created_at", row.created_at)?,
            updated_at: ts_from_sql("updated_at", row.updated_at)?,
        })
    }
}

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let attributes_json = serde_json::to_string(&patient.attributes)?;
        self.conn.execute(
            &format!("INSERT INTO patients ({PATIENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                patient.id,
                patient.name,
                attributes_json,
                patient.voided,
                patient.void_reason,
                ts_to_sql(patient.created_at),
                ts_to_sql(patient.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient, stamping its update time.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let attributes_json = serde_json::to_string(&patient.attributes)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                attributes = ?3,
                voided = ?4,
                void_reason = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                attributes_json,
                patient.voided,
                patient.void_reason,
                ts_to_sql(Utc::now()),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
                [id],
                PatientRow::read,
            )
            .optional()?
            .map(Patient::try_from)
            .transpose()
    }

    /// Collapse `not_preferred`'s identity into `preferred`.
    ///
    /// Repoints every remaining visit and encounter, copies over marker
    /// attributes the preferred patient lacks (the unknown-patient marker
    /// included; the merge coordinator decides whether to strip it), and
    /// voids the losing record.
    pub fn merge_patient_identities(
        &self,
        preferred_id: &str,
        not_preferred_id: &str,
    ) -> DbResult<()> {
        let mut preferred = self
            .get_patient(preferred_id)?
            .ok_or_else(|| DbError::NotFound(format!("patient {preferred_id}")))?;
        let not_preferred = self
            .get_patient(not_preferred_id)?
            .ok_or_else(|| DbError::NotFound(format!("patient {not_preferred_id}")))?;

        self.conn.execute(
            "UPDATE visits SET patient_id = ?1 WHERE patient_id = ?2",
            [preferred_id, not_preferred_id],
        )?;
        self.conn.execute(
            "UPDATE encounters SET patient_id = ?1 WHERE patient_id = ?2",
            [preferred_id, not_preferred_id],
        )?;

        for (attribute, value) in &not_preferred.attributes {
            preferred
                .attributes
                .entry(attribute.clone())
                .or_insert_with(|| value.clone());
        }
        self.update_patient(&preferred)?;

        let mut voided = not_preferred;
        voided.voided = true;
        voided.void_reason = Some(format!("merged into patient {preferred_id}"));
        self.update_patient(&voided)?;
        Ok(())
    }
}
