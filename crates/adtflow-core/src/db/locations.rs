//! Location store operations.
//!
//! The hierarchy is maintained externally; this core only reads it. Inserts
//! exist so deployments and tests can seed the tree.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Location, LocationTag};

struct LocationRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    tags: String,
}

impl LocationRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            tags: row.get(3)?,
        })
    }
}

impl TryFrom<LocationRow> for Location {
    type Error = DbError;

    fn try_from(row: LocationRow) -> DbResult<Self> {
        let tags: Vec<LocationTag> = serde_json::from_str(&row.tags)?;
        Ok(Location {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            tags,
        })
    }
}

impl Database {
    /// Insert a new location.
    pub fn insert_location(&self, location: &Location) -> DbResult<()> {
        let tags_json = serde_json::to_string(&location.tags)?;
        self.conn.execute(
            "INSERT INTO locations (id, name, parent_id, tags) VALUES (?1, ?2, ?3, ?4)",
            params![location.id, location.name, location.parent_id, tags_json],
        )?;
        Ok(())
    }

    /// Get a location by ID.
    pub fn get_location(&self, id: &str) -> DbResult<Option<Location>> {
        self.conn
            .query_row(
                "SELECT id, name, parent_id, tags FROM locations WHERE id = ?",
                [id],
                LocationRow::read,
            )
            .optional()?
            .map(Location::try_from)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_with_tags() {
        let db = Database::open_in_memory().unwrap();

        let mut hospital = Location::new("General Hospital".into());
        hospital.tags.push(LocationTag::SupportsVisits);
        let ward = Location::child_of("Ward A".into(), &hospital);

        db.insert_location(&hospital).unwrap();
        db.insert_location(&ward).unwrap();

        let retrieved = db.get_location(&hospital.id).unwrap().unwrap();
        assert!(retrieved.supports(LocationTag::SupportsVisits));
        assert!(retrieved.parent_id.is_none());

        let retrieved = db.get_location(&ward.id).unwrap().unwrap();
        assert_eq!(retrieved.parent_id, Some(hospital.id));
        assert!(retrieved.tags.is_empty());
    }
}
