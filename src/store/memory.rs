//! In-process relation store
//!
//! `MemoryStore` keeps tables as vectors of [`ValueMap`] rows and association
//! tables as key pairs. Every successful call is appended to an operation log so
//! tests can assert exactly which storage operations a commit issued, and a
//! one-shot fault can be armed to make the next operation of a given kind fail.

use super::{RelationStore, ThroughTable};
use crate::cluster::ordering::compare_by_fields;
use crate::executor::LifeError;
use crate::model::{ModelMeta, OrderBy};
use crate::value::{as_i64, is_null, values_equal, ValueMap};
use sea_query::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// One storage operation recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    FetchChildren {
        table: &'static str,
        foreign_key: String,
    },
    FetchAssociated {
        table: &'static str,
        through: &'static str,
    },
    Insert {
        table: &'static str,
        key: Value,
    },
    Update {
        table: &'static str,
        key: Value,
        rows: u64,
    },
    Delete {
        table: &'static str,
        key: Value,
        rows: u64,
    },
    Associate {
        through: &'static str,
        parent: Value,
        child: Value,
        created: bool,
    },
    Disassociate {
        through: &'static str,
        parent: Value,
        child: Value,
        rows: u64,
    },
}

impl StoreOp {
    pub fn kind(&self) -> StoreOpKind {
        match self {
            StoreOp::FetchChildren { .. } | StoreOp::FetchAssociated { .. } => StoreOpKind::Fetch,
            StoreOp::Insert { .. } => StoreOpKind::Insert,
            StoreOp::Update { .. } => StoreOpKind::Update,
            StoreOp::Delete { .. } => StoreOpKind::Delete,
            StoreOp::Associate { .. } => StoreOpKind::Associate,
            StoreOp::Disassociate { .. } => StoreOpKind::Disassociate,
        }
    }

    /// Whether the operation writes to a table
    pub fn is_write(&self) -> bool {
        self.kind() != StoreOpKind::Fetch
    }
}

/// Operation category, used to arm faults and filter the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOpKind {
    Fetch,
    Insert,
    Update,
    Delete,
    Associate,
    Disassociate,
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<&'static str, Vec<ValueMap>>,
    associations: BTreeMap<&'static str, Vec<(Value, Value)>>,
    log: Vec<StoreOp>,
    fail_on: Option<StoreOpKind>,
}

/// Relation store backed by in-memory tables
///
/// # Example
///
/// ```rust
/// use lifeguard_cluster::model::ModelMeta;
/// use lifeguard_cluster::store::{MemoryStore, RelationStore, StoreOpKind};
/// use lifeguard_cluster::value::ValueMap;
/// use sea_query::Value;
///
/// static TAG: ModelMeta = ModelMeta {
///     table: "tags",
///     primary_key: "id",
///     columns: &["id", "name"],
///     ordering: &[],
/// };
///
/// let store = MemoryStore::new();
/// let mut values = ValueMap::new();
/// values.insert("name".to_string(), Value::String(Some("rock".to_string())));
///
/// let key = store.insert(&TAG, &values).unwrap();
/// assert_eq!(key, Value::BigInt(Some(1)));
///
/// store.fail_on(StoreOpKind::Insert);
/// assert!(store.insert(&TAG, &values).is_err());
/// assert!(store.insert(&TAG, &values).is_ok());
/// ```
#[derive(Default)]
pub struct MemoryStore {
    state: RefCell<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a row in place without logging it; the row must carry its key
    pub fn seed(&self, meta: &ModelMeta, row: ValueMap) {
        self.state
            .borrow_mut()
            .tables
            .entry(meta.table)
            .or_default()
            .push(row);
    }

    /// Put an association in place without logging it
    pub fn seed_association(&self, through: &ThroughTable, parent_key: Value, child_key: Value) {
        self.state
            .borrow_mut()
            .associations
            .entry(through.table)
            .or_default()
            .push((parent_key, child_key));
    }

    /// Snapshot of every row of `meta.table`, in storage order
    pub fn rows(&self, meta: &ModelMeta) -> Vec<ValueMap> {
        self.state
            .borrow()
            .tables
            .get(meta.table)
            .cloned()
            .unwrap_or_default()
    }

    /// The row of `meta.table` with primary key `key`
    pub fn row(&self, meta: &ModelMeta, key: &Value) -> Option<ValueMap> {
        self.state.borrow().tables.get(meta.table).and_then(|rows| {
            rows.iter()
                .find(|row| key_matches(row, meta.primary_key, key))
                .cloned()
        })
    }

    /// Snapshot of the `(parent, child)` pairs in an association table
    pub fn associations(&self, through: &ThroughTable) -> Vec<(Value, Value)> {
        self.state
            .borrow()
            .associations
            .get(through.table)
            .cloned()
            .unwrap_or_default()
    }

    /// Operations performed so far
    pub fn operations(&self) -> Vec<StoreOp> {
        self.state.borrow().log.clone()
    }

    /// Operations performed so far, clearing the log
    pub fn take_operations(&self) -> Vec<StoreOp> {
        std::mem::take(&mut self.state.borrow_mut().log)
    }

    /// Make the next operation of `kind` fail with a `LifeError::QueryError`
    pub fn fail_on(&self, kind: StoreOpKind) {
        self.state.borrow_mut().fail_on = Some(kind);
    }

    fn check_fault(&self, kind: StoreOpKind) -> Result<(), LifeError> {
        let mut state = self.state.borrow_mut();
        if state.fail_on == Some(kind) {
            state.fail_on = None;
            return Err(LifeError::QueryError(format!("injected {:?} failure", kind)));
        }
        Ok(())
    }

    fn record(&self, op: StoreOp) {
        self.state.borrow_mut().log.push(op);
    }
}

fn key_matches(row: &ValueMap, column: &str, key: &Value) -> bool {
    row.get(column)
        .map(|value| !is_null(value) && values_equal(value, key))
        .unwrap_or(false)
}

fn sort_rows(meta: &ModelMeta, rows: &mut [ValueMap]) {
    rows.sort_by(|a, b| {
        compare_by_fields(meta.ordering, |c| a.get(c).cloned(), |c| b.get(c).cloned()).then_with(
            || {
                compare_by_fields(
                    &[OrderBy::Asc(meta.primary_key)],
                    |c| a.get(c).cloned(),
                    |c| b.get(c).cloned(),
                )
            },
        )
    });
}

fn stored_row(meta: &ModelMeta, values: &ValueMap, key: Value) -> ValueMap {
    let mut row: ValueMap = meta
        .writable_columns()
        .filter_map(|column| values.get(column).map(|v| (column.to_string(), v.clone())))
        .collect();
    row.insert(meta.primary_key.to_string(), key);
    row
}

impl RelationStore for MemoryStore {
    fn fetch_children(
        &self,
        meta: &ModelMeta,
        foreign_key: &str,
        parent_key: &Value,
    ) -> Result<Vec<ValueMap>, LifeError> {
        self.check_fault(StoreOpKind::Fetch)?;
        let mut rows: Vec<ValueMap> = self
            .rows(meta)
            .into_iter()
            .filter(|row| key_matches(row, foreign_key, parent_key))
            .collect();
        sort_rows(meta, &mut rows);
        self.record(StoreOp::FetchChildren {
            table: meta.table,
            foreign_key: foreign_key.to_string(),
        });
        Ok(rows)
    }

    fn fetch_associated(
        &self,
        meta: &ModelMeta,
        through: &ThroughTable,
        parent_key: &Value,
    ) -> Result<Vec<ValueMap>, LifeError> {
        self.check_fault(StoreOpKind::Fetch)?;
        let child_keys: Vec<Value> = self
            .associations(through)
            .into_iter()
            .filter(|(parent, _)| values_equal(parent, parent_key))
            .map(|(_, child)| child)
            .collect();
        let mut rows: Vec<ValueMap> = self
            .rows(meta)
            .into_iter()
            .filter(|row| {
                child_keys
                    .iter()
                    .any(|key| key_matches(row, meta.primary_key, key))
            })
            .collect();
        sort_rows(meta, &mut rows);
        self.record(StoreOp::FetchAssociated {
            table: meta.table,
            through: through.table,
        });
        Ok(rows)
    }

    fn insert(&self, meta: &ModelMeta, values: &ValueMap) -> Result<Value, LifeError> {
        self.check_fault(StoreOpKind::Insert)?;
        let explicit = values
            .get(meta.primary_key)
            .filter(|value| !is_null(value))
            .cloned();

        let key = {
            let mut state = self.state.borrow_mut();
            let rows = state.tables.entry(meta.table).or_default();
            let key = match explicit {
                Some(key) => {
                    if rows.iter().any(|row| key_matches(row, meta.primary_key, &key)) {
                        return Err(LifeError::QueryError(format!(
                            "duplicate key value {:?} violates primary key of {}",
                            key, meta.table
                        )));
                    }
                    key
                }
                None => {
                    let next = rows
                        .iter()
                        .filter_map(|row| row.get(meta.primary_key).and_then(as_i64))
                        .max()
                        .unwrap_or(0)
                        + 1;
                    Value::BigInt(Some(next))
                }
            };
            rows.push(stored_row(meta, values, key.clone()));
            key
        };

        self.record(StoreOp::Insert {
            table: meta.table,
            key: key.clone(),
        });
        Ok(key)
    }

    fn update(&self, meta: &ModelMeta, key: &Value, values: &ValueMap) -> Result<u64, LifeError> {
        self.check_fault(StoreOpKind::Update)?;
        let rows = {
            let mut state = self.state.borrow_mut();
            let mut affected = 0;
            if let Some(rows) = state.tables.get_mut(meta.table) {
                for row in rows
                    .iter_mut()
                    .filter(|row| key_matches(row, meta.primary_key, key))
                {
                    *row = stored_row(meta, values, key.clone());
                    affected += 1;
                }
            }
            affected
        };
        self.record(StoreOp::Update {
            table: meta.table,
            key: key.clone(),
            rows,
        });
        Ok(rows)
    }

    fn delete(&self, meta: &ModelMeta, key: &Value) -> Result<u64, LifeError> {
        self.check_fault(StoreOpKind::Delete)?;
        let rows = {
            let mut state = self.state.borrow_mut();
            match state.tables.get_mut(meta.table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|row| !key_matches(row, meta.primary_key, key));
                    (before - rows.len()) as u64
                }
                None => 0,
            }
        };
        self.record(StoreOp::Delete {
            table: meta.table,
            key: key.clone(),
            rows,
        });
        Ok(rows)
    }

    fn associate(
        &self,
        through: &ThroughTable,
        parent_key: &Value,
        child_key: &Value,
    ) -> Result<bool, LifeError> {
        self.check_fault(StoreOpKind::Associate)?;
        let created = {
            let mut state = self.state.borrow_mut();
            let pairs = state.associations.entry(through.table).or_default();
            let exists = pairs
                .iter()
                .any(|(p, c)| values_equal(p, parent_key) && values_equal(c, child_key));
            if !exists {
                pairs.push((parent_key.clone(), child_key.clone()));
            }
            !exists
        };
        self.record(StoreOp::Associate {
            through: through.table,
            parent: parent_key.clone(),
            child: child_key.clone(),
            created,
        });
        Ok(created)
    }

    fn disassociate(
        &self,
        through: &ThroughTable,
        parent_key: &Value,
        child_key: &Value,
    ) -> Result<u64, LifeError> {
        self.check_fault(StoreOpKind::Disassociate)?;
        let rows = {
            let mut state = self.state.borrow_mut();
            match state.associations.get_mut(through.table) {
                Some(pairs) => {
                    let before = pairs.len();
                    pairs.retain(|(p, c)| {
                        !(values_equal(p, parent_key) && values_equal(c, child_key))
                    });
                    (before - pairs.len()) as u64
                }
                None => 0,
            }
        };
        self.record(StoreOp::Disassociate {
            through: through.table,
            parent: parent_key.clone(),
            child: child_key.clone(),
            rows,
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static MEMBER: ModelMeta = ModelMeta {
        table: "band_members",
        primary_key: "id",
        columns: &["id", "band_id", "name"],
        ordering: &[OrderBy::Asc("name")],
    };

    static TAG: ModelMeta = ModelMeta {
        table: "tags",
        primary_key: "id",
        columns: &["id", "name"],
        ordering: &[],
    };

    const ALBUM_TAGS: ThroughTable = ThroughTable::new("album_tags", "album_id", "tag_id");

    fn member(id: i64, band_id: i64, name: &str) -> ValueMap {
        let mut row = ValueMap::new();
        row.insert("id".to_string(), Value::BigInt(Some(id)));
        row.insert("band_id".to_string(), Value::BigInt(Some(band_id)));
        row.insert("name".to_string(), Value::String(Some(name.to_string())));
        row
    }

    fn tag(id: i64, name: &str) -> ValueMap {
        let mut row = ValueMap::new();
        row.insert("id".to_string(), Value::BigInt(Some(id)));
        row.insert("name".to_string(), Value::String(Some(name.to_string())));
        row
    }

    #[test]
    fn test_fetch_children_filters_and_orders() {
        let store = MemoryStore::new();
        store.seed(&MEMBER, member(1, 1, "Paul"));
        store.seed(&MEMBER, member(2, 2, "Mick"));
        store.seed(&MEMBER, member(3, 1, "George"));

        let rows = store
            .fetch_children(&MEMBER, "band_id", &Value::Int(Some(1)))
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned()).collect();
        assert_eq!(
            names,
            vec![
                Some(Value::String(Some("George".to_string()))),
                Some(Value::String(Some("Paul".to_string()))),
            ]
        );
    }

    #[test]
    fn test_insert_generates_next_key() {
        let store = MemoryStore::new();
        store.seed(&MEMBER, member(7, 1, "Ringo"));

        let mut values = member(0, 1, "John");
        values.insert("id".to_string(), Value::BigInt(None));
        let key = store.insert(&MEMBER, &values).unwrap();

        assert_eq!(key, Value::BigInt(Some(8)));
        assert!(store.row(&MEMBER, &Value::Int(Some(8))).is_some());
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let store = MemoryStore::new();
        store.seed(&MEMBER, member(1, 1, "John"));

        let result = store.insert(&MEMBER, &member(1, 1, "John"));
        assert!(matches!(result, Err(LifeError::QueryError(_))));
        assert!(store.operations().is_empty());
    }

    #[test]
    fn test_update_and_delete_report_rows() {
        let store = MemoryStore::new();
        store.seed(&MEMBER, member(1, 1, "John"));

        assert_eq!(store.update(&MEMBER, &Value::BigInt(Some(1)), &member(1, 1, "Lennon")).unwrap(), 1);
        assert_eq!(store.update(&MEMBER, &Value::BigInt(Some(2)), &member(2, 1, "Nobody")).unwrap(), 0);
        assert_eq!(store.delete(&MEMBER, &Value::BigInt(Some(1))).unwrap(), 1);
        assert_eq!(store.delete(&MEMBER, &Value::BigInt(Some(1))).unwrap(), 0);
        assert!(store.rows(&MEMBER).is_empty());
    }

    #[test]
    fn test_associate_is_idempotent() {
        let store = MemoryStore::new();
        store.seed(&TAG, tag(1, "rock"));

        let parent = Value::BigInt(Some(10));
        let child = Value::BigInt(Some(1));
        assert!(store.associate(&ALBUM_TAGS, &parent, &child).unwrap());
        assert!(!store.associate(&ALBUM_TAGS, &parent, &child).unwrap());
        assert_eq!(store.associations(&ALBUM_TAGS).len(), 1);

        let rows = store.fetch_associated(&TAG, &ALBUM_TAGS, &parent).unwrap();
        assert_eq!(rows.len(), 1);

        assert_eq!(store.disassociate(&ALBUM_TAGS, &parent, &child).unwrap(), 1);
        assert!(store.fetch_associated(&TAG, &ALBUM_TAGS, &parent).unwrap().is_empty());
        assert_eq!(store.rows(&TAG).len(), 1);
    }

    #[test]
    fn test_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_on(StoreOpKind::Delete);

        assert!(store.delete(&TAG, &Value::BigInt(Some(1))).is_err());
        assert!(store.delete(&TAG, &Value::BigInt(Some(1))).is_ok());
        assert_eq!(store.take_operations().len(), 1);
        assert!(store.operations().is_empty());
    }
}
