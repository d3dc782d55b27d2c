//! Per-parent holding area for staged relation lists
//!
//! A parent record embeds one [`HoldingArea`]. Each relation name maps to at
//! most one [`StagedList`]; the list is created on first mutation (or first
//! `object_list()`) and removed again once the relation is committed.

use super::identity::ChildRef;
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Ordered staged children of one relation
///
/// The list is shared: a [`FakeResultSet`](super::FakeResultSet) obtained from
/// `read()` observes later mutations of the same list.
pub struct StagedList<C>(Rc<RefCell<Vec<ChildRef<C>>>>);

impl<C> StagedList<C> {
    fn new(items: Vec<ChildRef<C>>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Handles to the current entries, in order
    pub fn items(&self) -> Vec<ChildRef<C>> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub(crate) fn entries(&self) -> Ref<'_, Vec<ChildRef<C>>> {
        self.0.borrow()
    }

    pub(crate) fn entries_mut(&self) -> RefMut<'_, Vec<ChildRef<C>>> {
        self.0.borrow_mut()
    }
}

impl<C> Clone for StagedList<C> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<C: fmt::Debug> fmt::Debug for StagedList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}

/// Relation name to staged list, owned by a parent record
///
/// Cloning a parent must not share its pending changes, so `clone()` returns an
/// empty holding area.
#[derive(Default)]
pub struct HoldingArea {
    lists: HashMap<&'static str, Box<dyn Any>>,
}

impl HoldingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_staged(&self, relation: &str) -> bool {
        self.lists.contains_key(relation)
    }

    /// The staged list for `relation`, if one exists with child type `C`
    pub fn staged<C: 'static>(&self, relation: &str) -> Option<StagedList<C>> {
        self.lists
            .get(relation)
            .and_then(|list| list.downcast_ref::<StagedList<C>>())
            .cloned()
    }

    /// The staged list for `relation`, created from `load()` when absent
    ///
    /// # Errors
    ///
    /// Returns whatever `load` returns; nothing is stored in that case.
    pub fn get_or_create_list<C, E, F>(
        &mut self,
        relation: &'static str,
        load: F,
    ) -> Result<StagedList<C>, E>
    where
        C: 'static,
        F: FnOnce() -> Result<Vec<ChildRef<C>>, E>,
    {
        if let Some(list) = self.staged::<C>(relation) {
            return Ok(list);
        }
        let list = StagedList::new(load()?);
        log::debug!("staged relation {} with {} live entries", relation, list.len());
        self.lists.insert(relation, Box::new(list.clone()));
        Ok(list)
    }

    /// Replace the contents of `relation`'s staged list, creating it if needed
    ///
    /// An existing list is overwritten in place so result sets already handed
    /// out see the new contents.
    pub fn set_list<C: 'static>(
        &mut self,
        relation: &'static str,
        items: Vec<ChildRef<C>>,
    ) -> StagedList<C> {
        if let Some(list) = self.staged::<C>(relation) {
            *list.entries_mut() = items;
            return list;
        }
        let list = StagedList::new(items);
        self.lists.insert(relation, Box::new(list.clone()));
        list
    }

    /// Drop the staged list for `relation`; returns whether one existed
    pub fn remove_staged(&mut self, relation: &str) -> bool {
        self.lists.remove(relation).is_some()
    }

    /// Names of the relations with staged state, sorted
    pub fn relation_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.lists.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

impl Clone for HoldingArea {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for HoldingArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoldingArea")
            .field("staged", &self.relation_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(items: &[&'static str]) -> Result<Vec<ChildRef<&'static str>>, ()> {
        Ok(items.iter().copied().map(ChildRef::new).collect())
    }

    #[test]
    fn test_get_or_create_loads_once() {
        let mut area = HoldingArea::new();
        assert!(!area.has_staged("members"));

        let list = area.get_or_create_list("members", || load(&["john"])).unwrap();
        assert_eq!(list.len(), 1);
        assert!(area.has_staged("members"));

        let again = area
            .get_or_create_list::<&'static str, (), _>("members", || panic!("loaded twice"))
            .unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_failed_load_stores_nothing() {
        let mut area = HoldingArea::new();
        let result = area.get_or_create_list::<&'static str, &str, _>("members", || Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(!area.has_staged("members"));
    }

    #[test]
    fn test_set_list_updates_outstanding_handles() {
        let mut area = HoldingArea::new();
        let list = area.get_or_create_list("members", || load(&["john", "paul"])).unwrap();

        area.set_list::<&'static str>("members", Vec::new());
        assert!(list.is_empty());
        assert!(area.has_staged("members"));
    }

    #[test]
    fn test_remove_staged() {
        let mut area = HoldingArea::new();
        area.set_list::<&'static str>("members", Vec::new());

        assert!(area.remove_staged("members"));
        assert!(!area.remove_staged("members"));
        assert!(area.is_empty());
    }

    #[test]
    fn test_clone_starts_empty() {
        let mut area = HoldingArea::new();
        area.set_list::<&'static str>("members", Vec::new());
        area.set_list::<&'static str>("albums", Vec::new());
        assert_eq!(area.relation_names(), vec!["albums", "members"]);

        let cloned = area.clone();
        assert!(cloned.is_empty());
        assert_eq!(format!("{:?}", cloned), "HoldingArea { staged: [] }");
    }
}
