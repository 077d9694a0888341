// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registry Storage Module
//!
//! Flat keyed-row persistence for the two record shapes the relay
//! application keeps: group-location rows and user-membership rows.
//! Uses SQLite; this is deliberately a plain row store, not a schema'd
//! application database.

mod error;
mod groups;
mod memberships;

pub use error::RegistryError;

use rusqlite::Connection;
use std::path::Path;

use tracing::debug;

/// A named group and the location it is anchored to.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A user's membership in a group, with the group's location.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipRow {
    pub userid: String,
    pub membership: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// SQLite-based registry implementation.
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Opens or creates a registry database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        let registry = Registry { conn };
        registry.create_tables()?;
        Ok(registry)
    }

    /// Opens an in-memory registry (for tests).
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        let registry = Registry { conn };
        registry.create_tables()?;
        Ok(registry)
    }

    /// Creates the group and membership tables if they don't exist yet.
    fn create_tables(&self) -> Result<(), RegistryError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS group_names (
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS memberships (
                userid TEXT NOT NULL,
                membership TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            )",
            [],
        )?;
        debug!("registry tables ready");
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_tables() {
        let registry = Registry::open_in_memory().unwrap();
        assert!(registry.groups().unwrap().is_empty());
        assert!(registry.memberships().unwrap().is_empty());
    }

    #[test]
    fn test_create_tables_idempotent() {
        let registry = Registry::open_in_memory().unwrap();
        registry.create_tables().unwrap();
        registry.create_tables().unwrap();
    }
}
