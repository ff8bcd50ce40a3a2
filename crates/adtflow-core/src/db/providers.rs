//! Provider store operations.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::Provider;

impl Database {
    /// Insert a new provider.
    pub fn insert_provider(&self, provider: &Provider) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO providers (id, user_id, name) VALUES (?1, ?2, ?3)",
            params![provider.id, provider.user_id, provider.name],
        )?;
        Ok(())
    }

    /// Find the providers associated with a user account.
    pub fn find_providers_by_user(&self, user_id: &str) -> DbResult<Vec<Provider>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name FROM providers WHERE user_id = ? ORDER BY name")?;

        let rows = stmt.query_map([user_id], |row| {
            Ok(Provider {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
