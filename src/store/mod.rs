//! Storage collaborator for staged relations
//!
//! The cluster layer never issues SQL itself. Everything it needs from the
//! database goes through [`RelationStore`]: fetching the live rows of a relation,
//! writing child records, and (for many-to-many relations) maintaining rows of
//! the association table.
//!
//! Two implementations ship with the crate:
//! - [`SqlStore`]: PostgreSQL through any [`LifeExecutor`](crate::LifeExecutor),
//!   so the same commit code runs on a plain connection or inside a `Transaction`
//! - [`MemoryStore`]: an in-process table set with an operation log, for tests

pub mod memory;
pub mod sql;

pub use memory::{MemoryStore, StoreOp, StoreOpKind};
pub use sql::SqlStore;

use crate::executor::LifeError;
use crate::model::ModelMeta;
use crate::value::{is_null, ValueMap};
use sea_query::Value;

/// Association table of a many-to-many relation
///
/// ```rust
/// use lifeguard_cluster::store::ThroughTable;
///
/// const ALBUM_TAGS: ThroughTable = ThroughTable::new("album_tags", "album_id", "tag_id");
/// assert_eq!(ALBUM_TAGS.source_column, "album_id");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThroughTable {
    /// Table holding one row per association
    pub table: &'static str,
    /// Column referencing the parent record
    pub source_column: &'static str,
    /// Column referencing the child record
    pub target_column: &'static str,
}

impl ThroughTable {
    pub const fn new(
        table: &'static str,
        source_column: &'static str,
        target_column: &'static str,
    ) -> Self {
        Self {
            table,
            source_column,
            target_column,
        }
    }
}

/// Blocking storage operations used by relation reads and commits
///
/// Live fetches return rows ordered by the child type's default ordering,
/// then by primary key.
pub trait RelationStore {
    /// Rows of `meta.table` whose `foreign_key` column equals `parent_key`
    fn fetch_children(
        &self,
        meta: &ModelMeta,
        foreign_key: &str,
        parent_key: &Value,
    ) -> Result<Vec<ValueMap>, LifeError>;

    /// Rows of `meta.table` associated with `parent_key` through `through`
    fn fetch_associated(
        &self,
        meta: &ModelMeta,
        through: &ThroughTable,
        parent_key: &Value,
    ) -> Result<Vec<ValueMap>, LifeError>;

    /// Insert a record and return its primary key
    ///
    /// A non-null primary key in `values` is written as given; otherwise the
    /// store generates one.
    fn insert(&self, meta: &ModelMeta, values: &ValueMap) -> Result<Value, LifeError>;

    /// Update the record identified by `key`; returns the number of rows affected
    fn update(&self, meta: &ModelMeta, key: &Value, values: &ValueMap) -> Result<u64, LifeError>;

    /// Delete the record identified by `key`; returns the number of rows affected
    fn delete(&self, meta: &ModelMeta, key: &Value) -> Result<u64, LifeError>;

    /// Link `child_key` to `parent_key`; returns `false` if the link already existed
    fn associate(
        &self,
        through: &ThroughTable,
        parent_key: &Value,
        child_key: &Value,
    ) -> Result<bool, LifeError>;

    /// Remove the link between `parent_key` and `child_key`; returns rows removed
    fn disassociate(
        &self,
        through: &ThroughTable,
        parent_key: &Value,
        child_key: &Value,
    ) -> Result<u64, LifeError>;
}

/// Save a record: insert when it has no primary key, otherwise update it and
/// fall back to an insert when no row matched the key.
///
/// Returns the record's primary key.
///
/// # Errors
///
/// Returns the store's `LifeError` unchanged.
pub fn persist<S: RelationStore + ?Sized>(
    store: &S,
    meta: &ModelMeta,
    values: &ValueMap,
) -> Result<Value, LifeError> {
    let key = values
        .get(meta.primary_key)
        .filter(|value| !is_null(value));

    match key {
        None => store.insert(meta, values),
        Some(key) => {
            if store.update(meta, key, values)? == 0 {
                log::debug!(
                    "no {} row with key {:?}, inserting instead",
                    meta.table,
                    key
                );
                store.insert(meta, values)
            } else {
                Ok(key.clone())
            }
        }
    }
}
