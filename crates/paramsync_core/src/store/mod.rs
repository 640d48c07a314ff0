//! Named key-value stores backing the recall and params sides.
//!
//! # Responsibility
//! - Define the store primitive contract (`clear`, `parse`, `stringify`) plus
//!   per-entry access used by store nodes during message propagation.
//! - Provide in-memory and SQLite-backed registries.
//!
//! # Invariants
//! - Stores are addressed by name; store names never collide with node names.
//! - Reading a store that was never written yields an empty object.
//! - `parse` replaces the whole store content.
//! - Entry order is insertion order.

use crate::db::DbError;
use crate::model::params::ParamValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStores;
pub use sqlite::SqliteStoreRegistry;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// Text handed to `parse` is not a flat JSON object of scalars.
    Malformed { store: String, message: String },
    /// Persisted entry cannot be decoded.
    InvalidData(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { store, message } => {
                write!(f, "malformed content for store `{store}`: {message}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted store data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Malformed { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store primitive contract consumed by the store bridge and store nodes.
pub trait StoreRegistry {
    /// Removes every entry of `name`.
    fn clear(&mut self, name: &str) -> StoreResult<()>;
    /// Replaces the content of `name` with the JSON object in `text`.
    fn parse(&mut self, name: &str, text: &str) -> StoreResult<()>;
    /// Serializes `name` as a JSON object.
    fn stringify(&self, name: &str) -> StoreResult<String>;
    fn get_entry(&self, name: &str, key: &str) -> StoreResult<Option<ParamValue>>;
    /// Inserts or replaces one entry, keeping its position on replace.
    fn set_entry(&mut self, name: &str, key: &str, value: ParamValue) -> StoreResult<()>;
}
