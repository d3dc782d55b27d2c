//! Live-versus-staged diff applied by both relation flavors on commit
//!
//! Live rows come straight from the store, so they always carry a primary key
//! and never share an allocation with a staged entry. Identity therefore reduces
//! to key equality here.

use super::error::ClusterError;
use super::identity::ChildRef;
use crate::model::ModelTrait;
use crate::value::values_equal;
use sea_query::Value;

/// Counts reported by a finished reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub removed: usize,
    pub saved: usize,
}

/// Live keys with no staged entry carrying the same key
pub(crate) fn removed_keys<C: ModelTrait>(live_keys: &[Value], staged: &[ChildRef<C>]) -> Vec<Value> {
    let staged_keys: Vec<Value> = staged.iter().filter_map(ChildRef::primary_key).collect();
    live_keys
        .iter()
        .filter(|live| !staged_keys.iter().any(|key| values_equal(key, live)))
        .cloned()
        .collect()
}

/// Retire every live record missing from `staged`, then save every staged entry.
///
/// All removals are issued before the first save. The first error stops the
/// run and is returned as is.
pub(crate) fn reconcile<C, R, A>(
    relation: &str,
    live_keys: Vec<Value>,
    staged: &[ChildRef<C>],
    mut retire: R,
    mut save: A,
) -> Result<Outcome, ClusterError>
where
    C: ModelTrait,
    R: FnMut(&Value) -> Result<(), ClusterError>,
    A: FnMut(&ChildRef<C>) -> Result<(), ClusterError>,
{
    let removals = removed_keys(&live_keys, staged);
    log::debug!(
        "reconciling {}: {} live, {} staged, {} to remove",
        relation,
        live_keys.len(),
        staged.len(),
        removals.len()
    );

    for key in &removals {
        retire(key)?;
    }
    for item in staged {
        save(item)?;
    }

    Ok(Outcome {
        removed: removals.len(),
        saved: staged.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{set_field, ModelError, ModelMeta};

    static ITEM: ModelMeta = ModelMeta {
        table: "items",
        primary_key: "id",
        columns: &["id"],
        ordering: &[],
    };

    #[derive(Debug, Clone, Default)]
    struct Item {
        id: Option<i32>,
    }

    impl ModelTrait for Item {
        fn meta() -> &'static ModelMeta {
            &ITEM
        }

        fn get(&self, column: &str) -> Option<Value> {
            (column == "id").then(|| Value::Int(self.id))
        }

        fn set(&mut self, column: &str, value: Value) -> Result<(), ModelError> {
            match column {
                "id" => set_field(&mut self.id, column, value),
                _ => Err(ModelError::ColumnNotFound(column.to_string())),
            }
        }
    }

    fn item(id: Option<i32>) -> ChildRef<Item> {
        ChildRef::new(Item { id })
    }

    #[test]
    fn test_removed_keys_compares_across_widths() {
        let live = vec![Value::BigInt(Some(5)), Value::BigInt(Some(6))];
        let staged = vec![item(Some(6)), item(None)];
        assert_eq!(removed_keys(&live, &staged), vec![Value::BigInt(Some(5))]);
    }

    #[test]
    fn test_removals_run_before_saves() {
        let live = vec![Value::Int(Some(1)), Value::Int(Some(2))];
        let staged = vec![item(Some(2)), item(None)];
        let events = std::cell::RefCell::new(Vec::new());

        let outcome = reconcile(
            "items",
            live,
            &staged,
            |key| {
                events.borrow_mut().push(format!("retire {:?}", key));
                Ok(())
            },
            |child| {
                events.borrow_mut().push(format!("save {:?}", child.primary_key()));
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(outcome, Outcome { removed: 1, saved: 2 });
        assert_eq!(
            events.into_inner(),
            vec![
                "retire Int(Some(1))".to_string(),
                "save Some(Int(Some(2)))".to_string(),
                "save None".to_string(),
            ]
        );
    }

    #[test]
    fn test_first_error_stops_the_run() {
        let staged = vec![item(None), item(None)];
        let mut saves = 0;

        let result = reconcile(
            "items",
            Vec::new(),
            &staged,
            |_| Ok(()),
            |_| {
                saves += 1;
                Err(ClusterError::Storage(crate::executor::LifeError::Other(
                    "down".to_string(),
                )))
            },
        );

        assert!(matches!(result, Err(ClusterError::Storage(_))));
        assert_eq!(saves, 1);
    }
}
