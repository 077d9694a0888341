//! Group row storage operations.

use rusqlite::params;

use super::{GroupRow, Registry, RegistryError};

impl Registry {
    // === Group Row Operations ===

    /// Adds a group row.
    pub fn add_group(&self, row: &GroupRow) -> Result<(), RegistryError> {
        self.conn().execute(
            "INSERT INTO group_names (name, latitude, longitude) VALUES (?1, ?2, ?3)",
            params![row.name, row.latitude, row.longitude],
        )?;
        Ok(())
    }

    /// Removes the group row matching all three fields.
    ///
    /// Returns false if no matching row existed.
    pub fn remove_group(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, RegistryError> {
        let rows_affected = self.conn().execute(
            "DELETE FROM group_names WHERE name = ?1 AND latitude = ?2 AND longitude = ?3",
            params![name, latitude, longitude],
        )?;
        Ok(rows_affected > 0)
    }

    /// Returns all group rows.
    pub fn groups(&self) -> Result<Vec<GroupRow>, RegistryError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT name, latitude, longitude FROM group_names")?;

        let rows = stmt.query_map([], |row| {
            Ok(GroupRow {
                name: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RegistryError::Database)
    }
}
