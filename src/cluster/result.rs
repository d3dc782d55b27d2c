//! Read results of a relation: live rows or a view over the staged list.

use super::holding::StagedList;
use super::identity::ChildRef;
use crate::model::ModelTrait;
use crate::value::values_equal;
use sea_query::Value;
use std::fmt;

/// Query-result-shaped view over a staged list
///
/// Not a snapshot: every call observes the list as it is at that moment, and
/// iteration can be restarted any number of times.
pub struct FakeResultSet<C> {
    list: StagedList<C>,
}

impl<C: ModelTrait> FakeResultSet<C> {
    pub(crate) fn new(list: StagedList<C>) -> Self {
        Self { list }
    }

    /// Iterate over the current entries in order
    pub fn iter(&self) -> std::vec::IntoIter<ChildRef<C>> {
        self.list.items().into_iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn count(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ChildRef<C>> {
        self.list.entries().get(index).cloned()
    }

    pub fn first(&self) -> Option<ChildRef<C>> {
        self.get(0)
    }

    pub fn last(&self) -> Option<ChildRef<C>> {
        self.list.entries().last().cloned()
    }

    pub fn to_vec(&self) -> Vec<ChildRef<C>> {
        self.list.items()
    }

    /// Entries for which `predicate` holds
    pub fn filter<F>(&self, predicate: F) -> Vec<ChildRef<C>>
    where
        F: Fn(&C) -> bool,
    {
        self.iter().filter(|item| predicate(&item.borrow())).collect()
    }

    /// Entries whose `column` equals `value`
    pub fn filter_by(&self, column: &str, value: &Value) -> Vec<ChildRef<C>> {
        self.iter()
            .filter(|item| {
                item.get(column)
                    .map(|v| values_equal(&v, value))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Primary keys of the entries that have one
    pub fn primary_keys(&self) -> Vec<Value> {
        self.iter().filter_map(|item| item.primary_key()).collect()
    }
}

impl<C> Clone for FakeResultSet<C> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for FakeResultSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FakeResultSet").field(&self.list).finish()
    }
}

impl<C: ModelTrait> IntoIterator for &FakeResultSet<C> {
    type Item = ChildRef<C>;
    type IntoIter = std::vec::IntoIter<ChildRef<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of reading a relation
///
/// `Live` holds freshly fetched records (nothing is staged for the relation);
/// `Staged` is a live view of the holding area.
#[derive(Debug, Clone)]
pub enum RelationResult<C> {
    Live(Vec<ChildRef<C>>),
    Staged(FakeResultSet<C>),
}

impl<C: ModelTrait> RelationResult<C> {
    pub fn is_staged(&self) -> bool {
        matches!(self, RelationResult::Staged(_))
    }

    /// Handles to every record, in order
    pub fn items(&self) -> Vec<ChildRef<C>> {
        match self {
            RelationResult::Live(items) => items.clone(),
            RelationResult::Staged(set) => set.to_vec(),
        }
    }

    /// Copies of every record, in order
    pub fn records(&self) -> Vec<C> {
        self.items().iter().map(ChildRef::snapshot).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<ChildRef<C>> {
        self.items().into_iter()
    }

    pub fn len(&self) -> usize {
        match self {
            RelationResult::Live(items) => items.len(),
            RelationResult::Staged(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn primary_keys(&self) -> Vec<Value> {
        self.iter().filter_map(|item| item.primary_key()).collect()
    }
}

impl<C: ModelTrait> IntoIterator for &RelationResult<C> {
    type Item = ChildRef<C>;
    type IntoIter = std::vec::IntoIter<ChildRef<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
