//! Visit store operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{opt_ts_from_sql, ts_from_sql, ts_to_sql, Database, DbError, DbResult};
use crate::models::Visit;

const VISIT_COLUMNS: &str =
    "id, patient_id, location_id, visit_type, started_at, stopped_at, voided, void_reason";

struct VisitRow {
    id: String,
    patient_id: String,
    location_id: Option<String>,
    visit_type: String,
    started_at: String,
    stopped_at: Option<String>,
    voided: bool,
    void_reason: Option<String>,
}

impl VisitRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            location_id: row.get(2)?,
            visit_type: row.get(3)?,
            started_at: row.get(4)?,
            stopped_at: row.get(5)?,
            voided: row.get(6)?,
            void_reason: row.get(7)?,
        })
    }
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> DbResult<Self> {
        Ok(Visit {
            id: row.id,
            patient_id: row.patient_id,
            location_id: row.location_id,
            visit_type: row.visit_type,
            started_at: ts_from_sql("started_at", row.started_at)?,
            stopped_at: opt_ts_from_sql("stopped_at", row.stopped_at)?,
            voided: row.voided,
            void_reason: row.void_reason,
        })
    }
}

impl Database {
    /// Insert a new visit.
    pub fn insert_visit(&self, visit: &Visit) -> DbResult<()> {
        self.conn.execute(
            &format!("INSERT INTO visits ({VISIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                visit.id,
                visit.patient_id,
                visit.location_id,
                visit.visit_type,
                ts_to_sql(visit.started_at),
                visit.stopped_at.map(ts_to_sql),
                visit.voided,
                visit.void_reason,
            ],
        )?;
        Ok(())
    }

    /// Update an existing visit.
    pub fn update_visit(&self, visit: &Visit) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                patient_id = ?2,
                location_id = ?3,
                visit_type = ?4,
                started_at = ?5,
                stopped_at = ?6,
                voided = ?7,
                void_reason = ?8
            WHERE id = ?1
            "#,
            params![
                visit.id,
                visit.patient_id,
                visit.location_id,
                visit.visit_type,
                ts_to_sql(visit.started_at),
                visit.stopped_at.map(ts_to_sql),
                visit.voided,
                visit.void_reason,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {VISIT_COLUMNS} FROM visits WHERE id = ?"),
                [id],
                VisitRow::read,
            )
            .optional()?
            .map(Visit::try_from)
            .transpose()
    }

    /// Non-voided visits for a patient, in store (insertion) order.
    ///
    /// Callers relying on position get "first/last listed", not any promise
    /// about chronology.
    pub fn find_visits_by_patient(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE patient_id = ? AND voided = 0 ORDER BY rowid"
        ))?;

        let rows = stmt.query_map([patient_id], VisitRow::read)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }

    /// All non-voided open visits across patients, in store order.
    pub fn find_open_visits(&self) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE stopped_at IS NULL AND voided = 0 ORDER BY rowid"
        ))?;

        let rows = stmt.query_map([], VisitRow::read)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }

    /// Void a visit with an audit reason.
    pub fn void_visit(&self, id: &str, reason: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE visits SET voided = 1, void_reason = ?2 WHERE id = ?1",
            params![id, reason],
        )?;
        Ok(rows_affected > 0)
    }
}
