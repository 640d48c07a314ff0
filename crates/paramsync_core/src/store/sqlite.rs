//! SQLite-backed store registry.
//!
//! # Responsibility
//! - Persist named stores so their content survives a host reload.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - The connection must have been opened with `db::open_db*` (schema at
//!   `latest_version`); `try_new` rejects anything else.
//! - Each entry value is stored as JSON text and must decode to a scalar.
//! - Entry order is tracked by an explicit `position` column.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::params::{ParamValue, ParameterSet};
use crate::store::{StoreError, StoreRegistry, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Store registry persisted in the `store_entries` table.
pub struct SqliteStoreRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStoreRegistry<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `SchemaNotReady` when the schema version is not the latest.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let db_version = schema_version(conn)?;
        let expected = latest_version();
        if db_version != expected {
            return Err(DbError::SchemaNotReady {
                db_version,
                expected,
            }
            .into());
        }
        Ok(Self { conn })
    }

    /// Names of stores holding at least one entry.
    pub fn store_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT store_name FROM store_entries ORDER BY store_name ASC;")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn load(&self, name: &str) -> StoreResult<ParameterSet> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value_json
             FROM store_entries
             WHERE store_name = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([name])?;
        let mut set = ParameterSet::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            set.insert(key.clone(), decode_value(name, &key, &raw)?);
        }
        Ok(set)
    }
}

impl StoreRegistry for SqliteStoreRegistry<'_> {
    fn clear(&mut self, name: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM store_entries WHERE store_name = ?1;", [name])?;
        Ok(())
    }

    fn parse(&mut self, name: &str, text: &str) -> StoreResult<()> {
        let parsed = ParameterSet::from_json_text(text).map_err(|err| StoreError::Malformed {
            store: name.to_string(),
            message: err.to_string(),
        })?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM store_entries WHERE store_name = ?1;", [name])?;
        for (position, (key, value)) in parsed.iter().enumerate() {
            tx.execute(
                "INSERT INTO store_entries (store_name, key, position, value_json)
                 VALUES (?1, ?2, ?3, ?4);",
                params![name, key, position as i64, value.to_json().to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn stringify(&self, name: &str) -> StoreResult<String> {
        Ok(self.load(name)?.to_json_text())
    }

    fn get_entry(&self, name: &str, key: &str) -> StoreResult<Option<ParamValue>> {
        let raw = self
            .conn
            .query_row(
                "SELECT value_json FROM store_entries WHERE store_name = ?1 AND key = ?2;",
                [name, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        raw.map(|raw| decode_value(name, key, &raw)).transpose()
    }

    fn set_entry(&mut self, name: &str, key: &str, value: ParamValue) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO store_entries (store_name, key, position, value_json)
             VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(position), -1) + 1 FROM store_entries WHERE store_name = ?1),
                ?3
             )
             ON CONFLICT (store_name, key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![name, key, value.to_json().to_string()],
        )?;
        Ok(())
    }
}

fn decode_value(store: &str, key: &str, raw: &str) -> StoreResult<ParamValue> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .as_ref()
        .and_then(ParamValue::from_json)
        .ok_or_else(|| {
            StoreError::InvalidData(format!(
                "entry `{key}` of store `{store}` holds non-scalar value `{raw}`"
            ))
        })
}
