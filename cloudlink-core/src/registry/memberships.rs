//! Membership row storage operations.

use rusqlite::params;

use super::{MembershipRow, Registry, RegistryError};

impl Registry {
    // === Membership Row Operations ===

    /// Adds a membership row.
    pub fn add_membership(&self, row: &MembershipRow) -> Result<(), RegistryError> {
        self.conn().execute(
            "INSERT INTO memberships (userid, membership, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.userid, row.membership, row.latitude, row.longitude],
        )?;
        Ok(())
    }

    /// Removes all membership rows for a user.
    ///
    /// Returns false if the user had no rows.
    pub fn remove_membership(&self, userid: &str) -> Result<bool, RegistryError> {
        let rows_affected = self.conn().execute(
            "DELETE FROM memberships WHERE userid = ?1",
            params![userid],
        )?;
        Ok(rows_affected > 0)
    }

    /// Updates a user's membership row to a new group and location.
    ///
    /// Returns false if the user had no row to update.
    pub fn update_membership(&self, row: &MembershipRow) -> Result<bool, RegistryError> {
        let rows_affected = self.conn().execute(
            "UPDATE memberships SET membership = ?1, latitude = ?2, longitude = ?3
             WHERE userid = ?4",
            params![row.membership, row.latitude, row.longitude, row.userid],
        )?;
        Ok(rows_affected > 0)
    }

    /// Returns all membership rows.
    pub fn memberships(&self) -> Result<Vec<MembershipRow>, RegistryError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT userid, membership, latitude, longitude FROM memberships")?;

        let rows = stmt.query_map([], |row| {
            Ok(MembershipRow {
                userid: row.get(0)?,
                membership: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RegistryError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MembershipRow {
        MembershipRow {
            userid: "user-1".to_string(),
            membership: "hikers".to_string(),
            latitude: 47.37,
            longitude: 8.54,
        }
    }

    #[test]
    fn test_add_and_list_memberships() {
        let registry = Registry::open_in_memory().unwrap();
        registry.add_membership(&sample()).unwrap();

        let rows = registry.memberships().unwrap();
        assert_eq!(rows, vec![sample()]);
    }

    #[test]
    fn test_update_membership() {
        let registry = Registry::open_in_memory().unwrap();
        registry.add_membership(&sample()).unwrap();

        let updated = MembershipRow {
            membership: "runners".to_string(),
            latitude: 46.95,
            longitude: 7.45,
            ..sample()
        };
        assert!(registry.update_membership(&updated).unwrap());
        assert_eq!(registry.memberships().unwrap(), vec![updated]);
    }

    #[test]
    fn test_update_missing_membership_returns_false() {
        let registry = Registry::open_in_memory().unwrap();
        assert!(!registry.update_membership(&sample()).unwrap());
    }

    #[test]
    fn test_remove_membership() {
        let registry = Registry::open_in_memory().unwrap();
        registry.add_membership(&sample()).unwrap();

        assert!(registry.remove_membership("user-1").unwrap());
        assert!(registry.memberships().unwrap().is_empty());
        assert!(!registry.remove_membership("user-1").unwrap());
    }
}
